//! Bodies of the exported entry points.
//!
//! Each function converts its `Result` into the status code the host sees,
//! logs failures and never lets a panic cross the boundary. The exported
//! symbols themselves are generated by [`export_impl_library!`] and
//! [`export_reg_library!`].
//!
//! [`export_impl_library!`]: crate::export_impl_library
//! [`export_reg_library!`]: crate::export_reg_library

use std::ffi::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};

use parking_lot::{const_mutex, Mutex};
use tracing::error;
use udo_core::{
    c_str, logging, CoreType, ErrorType, Result, UdoError, UdoExternalNotify, UdoImpInfo,
    UdoLibVersion, UdoOpDefinition, UdoOpFactory, UdoOperation, UdoParam, UdoRegInfo,
    UdoTensorParam,
};

use crate::implementation::{OpFactory, OperationHandle};
use crate::instance;
use crate::registration::RegistrationLibrary;

// Held from the already-initialized check until init has finished or been
// rolled back, so a losing init never sees the winner's instance.
static INIT: Mutex<()> = const_mutex(());

/// Runs `f`, mapping its outcome to a status code.
pub fn guard(entry: &str, f: impl FnOnce() -> Result<()>) -> ErrorType {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => ErrorType::NO_ERROR,
        Ok(Err(err)) => {
            let status = err.status();
            error!(entry, ?status, "{err}");
            status
        }
        Err(_) => {
            error!(entry, "panicked");
            ErrorType::UNKNOWN_ERROR
        }
    }
}

fn check_out<T>(ptr: *mut T, what: &str) -> Result<()> {
    if ptr.is_null() {
        return Err(UdoError::InvalidArgument(format!("{what} is null")));
    }
    Ok(())
}

unsafe fn tensors<'a>(
    ptr: *const UdoTensorParam,
    count: u32,
    missing: fn(String) -> UdoError,
) -> Result<&'a [UdoTensorParam]> {
    if count == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(missing(format!("{count} tensors given as null")));
    }
    Ok(std::slice::from_raw_parts(ptr, count as usize))
}

// Implementation library.

/// Sets up logging and runs the package's `init`, which creates the
/// implementation instance and registers its definitions. A failed init
/// leaves no instance behind.
pub fn init_impl_library(
    _global_infrastructure: *mut c_void,
    init: fn() -> Result<()>,
) -> ErrorType {
    logging::init_from_env();
    guard("initImplLibrary", || {
        let _init = INIT.lock();
        if instance::has_implementation() {
            return Err(UdoError::InvalidArgument(
                "implementation library already initialized".to_string(),
            ));
        }
        if let Err(err) = init() {
            instance::delete_implementation_instance();
            return Err(err);
        }
        Ok(())
    })
}

pub fn terminate_impl_library() -> ErrorType {
    guard("terminateImplLibrary", || {
        instance::delete_implementation_instance();
        Ok(())
    })
}

/// # Safety
///
/// `info` must be null or writable.
pub unsafe fn get_imp_info(info: *mut *mut UdoImpInfo) -> ErrorType {
    guard("getImpInfo", || {
        check_out(info, "info slot")?;
        instance::with_implementation(|lib| {
            *info = lib.implementation_info()? as *mut UdoImpInfo;
            Ok(())
        })
    })
}

/// # Safety
///
/// `version` must be null or writable.
pub unsafe fn get_impl_version(version: *mut *mut UdoLibVersion) -> ErrorType {
    guard("getVersion", || {
        check_out(version, "version slot")?;
        instance::with_implementation(|lib| {
            *version = lib.version_mut() as *mut UdoLibVersion;
            Ok(())
        })
    })
}

/// # Safety
///
/// Pointer arguments must be null or valid as described on
/// [`ImplementationLibrary::create_op_factory`](crate::ImplementationLibrary::create_op_factory).
pub unsafe fn create_op_factory(
    core_type: CoreType,
    infrastructure: *mut c_void,
    operation_type: *const c_char,
    num_of_static_params: u32,
    static_params: *mut UdoParam,
    op_factory: *mut UdoOpFactory,
) -> ErrorType {
    guard("createOpFactory", || {
        check_out(op_factory, "factory slot")?;
        let operation_type = c_str(operation_type, "operation type")?;
        let factory = instance::with_implementation(|lib| {
            lib.create_op_factory(
                core_type,
                infrastructure,
                operation_type,
                num_of_static_params,
                static_params,
            )
        })?;
        *op_factory = Box::into_raw(Box::new(factory)).cast();
        Ok(())
    })
}

/// # Safety
///
/// `op_factory` must be null or a live handle from [`create_op_factory`];
/// tensor arrays must hold the advertised counts.
pub unsafe fn create_operation(
    op_factory: UdoOpFactory,
    _per_op_infrastructure: *mut c_void,
    num_of_inputs: u32,
    inputs: *mut UdoTensorParam,
    num_of_outputs: u32,
    outputs: *mut UdoTensorParam,
    operation: *mut UdoOperation,
) -> ErrorType {
    guard("createOperation", || {
        check_out(operation, "operation slot")?;
        let factory = op_factory
            .cast::<OpFactory>()
            .as_ref()
            .ok_or_else(|| UdoError::InvalidArgument("op factory is null".to_string()))?;
        let inputs = tensors(inputs, num_of_inputs, UdoError::WrongNumOfInputs)?;
        let outputs = tensors(outputs, num_of_outputs, UdoError::WrongNumOfOutputs)?;

        let handle = factory.create_operation(inputs, outputs)?;
        *operation = Box::into_raw(Box::new(handle)).cast();
        Ok(())
    })
}

unsafe fn handle<'a>(operation: UdoOperation) -> Result<&'a mut OperationHandle> {
    operation
        .cast::<OperationHandle>()
        .as_mut()
        .ok_or_else(|| UdoError::InvalidArgument("operation is null".to_string()))
}

/// # Safety
///
/// `operation` must be null or a live handle from [`create_operation`].
pub unsafe fn execute_op(
    operation: UdoOperation,
    blocking: bool,
    id: u32,
    notify: UdoExternalNotify,
) -> ErrorType {
    guard("executeOp", || {
        handle(operation)?
            .operation_mut()
            .execute(blocking, id, notify)
    })
}

/// # Safety
///
/// `operation` must be null or a live handle; non-null arrays must hold as
/// many tensors as the operation was created with.
pub unsafe fn set_op_io(
    operation: UdoOperation,
    inputs: *mut UdoTensorParam,
    outputs: *mut UdoTensorParam,
) -> ErrorType {
    guard("setOpIO", || {
        handle(operation)?
            .operation_mut()
            .set_io(inputs, outputs)
    })
}

/// # Safety
///
/// `operation` must be null or a live handle; `execution_time` null or
/// writable.
pub unsafe fn profile_op(operation: UdoOperation, execution_time: *mut u32) -> ErrorType {
    guard("profileOp", || {
        let op = handle(operation)?;
        check_out(execution_time, "execution time slot")?;
        *execution_time = op.operation().profile();
        Ok(())
    })
}

/// # Safety
///
/// `operation` must be null or a live handle, not used afterwards.
pub unsafe fn release_op(operation: UdoOperation) -> ErrorType {
    guard("releaseOp", || {
        if operation.is_null() {
            return Err(UdoError::InvalidArgument("operation is null".to_string()));
        }
        drop(Box::from_raw(operation.cast::<OperationHandle>()));
        Ok(())
    })
}

/// # Safety
///
/// `op_factory` must be null or a live handle, not used afterwards.
/// Operations created from it stay valid.
pub unsafe fn release_op_factory(op_factory: UdoOpFactory) -> ErrorType {
    guard("releaseOpFactory", || {
        if op_factory.is_null() {
            return Err(UdoError::InvalidArgument("op factory is null".to_string()));
        }
        drop(Box::from_raw(op_factory.cast::<OpFactory>()));
        Ok(())
    })
}

// Registration library.

pub fn init_reg_library(build: fn() -> Result<RegistrationLibrary>) -> ErrorType {
    logging::init_from_env();
    guard("initRegLibrary", || {
        let _init = INIT.lock();
        if instance::has_registration() {
            return Err(UdoError::InvalidArgument(
                "registration library already initialized".to_string(),
            ));
        }
        instance::set_registration(build()?)
    })
}

pub fn terminate_reg_library() -> ErrorType {
    guard("terminateRegLibrary", || {
        instance::delete_registration_instance();
        Ok(())
    })
}

/// # Safety
///
/// `version` must be null or writable.
pub unsafe fn get_reg_version(version: *mut *mut UdoLibVersion) -> ErrorType {
    guard("getVersion", || {
        check_out(version, "version slot")?;
        instance::with_registration(|lib| {
            *version = lib.version_mut() as *mut UdoLibVersion;
            Ok(())
        })
    })
}

/// # Safety
///
/// `reg_info` must be null or writable.
pub unsafe fn get_reg_info(reg_info: *mut *mut UdoRegInfo) -> ErrorType {
    guard("getRegInfo", || {
        check_out(reg_info, "reg info slot")?;
        instance::with_registration(|lib| {
            *reg_info = lib.reg_info() as *mut UdoRegInfo;
            Ok(())
        })
    })
}

/// # Safety
///
/// See [`RegistrationLibrary::validate_operation`].
pub unsafe fn validate_operation(definition: *mut UdoOpDefinition) -> ErrorType {
    guard("validateOperation", || {
        instance::with_registration(|lib| lib.validate_operation(definition))
    })
}
