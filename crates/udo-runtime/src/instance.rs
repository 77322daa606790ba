//! Process-wide library instances.
//!
//! The host ABI has no instance handle, so each library keeps one instance
//! per process behind a mutex. Pointers handed to the host (version,
//! descriptor, implementation info) point into these boxed instances and stay
//! valid until teardown.

use parking_lot::{const_mutex, Mutex};
use tracing::{info, warn};
use udo_core::{CoreType, Result, UdoError};

use crate::implementation::ImplementationLibrary;
use crate::registration::RegistrationLibrary;

static IMPLEMENTATION: Mutex<Option<Box<ImplementationLibrary>>> = const_mutex(None);
static REGISTRATION: Mutex<Option<Box<RegistrationLibrary>>> = const_mutex(None);

/// Creates the implementation library instance. Fails if one already exists.
pub fn set_implementation(core_type: CoreType, package_name: &str) -> Result<()> {
    let mut slot = IMPLEMENTATION.lock();
    if slot.is_some() {
        return Err(UdoError::InvalidArgument(format!(
            "implementation library already initialized (requested {package_name})"
        )));
    }
    *slot = Some(Box::new(ImplementationLibrary::new(core_type, package_name)?));
    info!(package = package_name, core = ?core_type, "implementation library initialized");
    Ok(())
}

/// Runs `f` on the implementation library instance while holding its lock.
pub fn with_implementation<R>(
    f: impl FnOnce(&mut ImplementationLibrary) -> Result<R>,
) -> Result<R> {
    let mut slot = IMPLEMENTATION.lock();
    let lib = slot.as_deref_mut().ok_or_else(|| {
        UdoError::Unknown("implementation library used before initialization".to_string())
    })?;
    f(lib)
}

pub fn has_implementation() -> bool {
    IMPLEMENTATION.lock().is_some()
}

/// Tears the implementation library instance down. Returns whether one existed.
pub fn delete_implementation_instance() -> bool {
    let existed = IMPLEMENTATION.lock().take().is_some();
    if existed {
        info!("implementation library terminated");
    } else {
        warn!("no implementation library to terminate");
    }
    existed
}

/// Installs a finished registration. Fails if one is already installed.
pub fn set_registration(library: RegistrationLibrary) -> Result<()> {
    let mut slot = REGISTRATION.lock();
    if slot.is_some() {
        return Err(UdoError::InvalidArgument(format!(
            "registration library already initialized (requested {})",
            library.package_name()
        )));
    }
    info!(package = library.package_name(), "registration library initialized");
    *slot = Some(Box::new(library));
    Ok(())
}

pub fn with_registration<R>(f: impl FnOnce(&mut RegistrationLibrary) -> Result<R>) -> Result<R> {
    let mut slot = REGISTRATION.lock();
    let lib = slot.as_deref_mut().ok_or_else(|| {
        UdoError::Unknown("registration library used before initialization".to_string())
    })?;
    f(lib)
}

pub fn has_registration() -> bool {
    REGISTRATION.lock().is_some()
}

pub fn delete_registration_instance() -> bool {
    let existed = REGISTRATION.lock().take().is_some();
    if existed {
        info!("registration library terminated");
    } else {
        warn!("no registration library to terminate");
    }
    existed
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn implementation_lifecycle() {
        delete_implementation_instance();

        let err = with_implementation(|_| Ok(())).unwrap_err();
        assert!(matches!(err, UdoError::Unknown(_)));

        set_implementation(CoreType::CPU, "Test").unwrap();
        let err = set_implementation(CoreType::CPU, "Other").unwrap_err();
        assert!(matches!(err, UdoError::InvalidArgument(_)));

        let name = with_implementation(|lib| Ok(lib.package_name().to_string())).unwrap();
        assert_eq!(name, "Test");

        assert!(delete_implementation_instance());
        assert!(!delete_implementation_instance());
        assert!(with_implementation(|_| Ok(())).is_err());
    }

    #[test]
    #[serial]
    fn registration_before_init_is_unknown_error() {
        delete_registration_instance();
        let err = with_registration(|_| Ok(())).unwrap_err();
        assert!(matches!(err, UdoError::Unknown(_)));
    }
}
