use std::ffi::c_void;
use std::ptr::NonNull;

use crate::abi::{UdoCpuGetData, UdoCpuInfrastructure};
use crate::error::{Result, UdoError};

/// Host capability that turns a tensor payload handle into an address.
pub trait Infrastructure: Send + Sync {
    fn resolve(&self, handle: *mut c_void) -> Option<NonNull<u8>>;
}

/// CPU infrastructure handed over by the host at factory creation.
///
/// Only the `get_data` callback is kept; the host struct itself is not
/// referenced after construction.
#[derive(Clone, Copy, Debug)]
pub struct CpuInfrastructure {
    get_data: Option<UdoCpuGetData>,
}

// SAFETY: the host guarantees its `get_data` callback is callable from any
// thread that drives an operation.
unsafe impl Send for CpuInfrastructure {}
unsafe impl Sync for CpuInfrastructure {}

impl CpuInfrastructure {
    /// Reads the host's CPU infrastructure struct.
    ///
    /// # Safety
    ///
    /// `raw` must be null or point at a valid [`UdoCpuInfrastructure`].
    pub unsafe fn from_raw(raw: *mut c_void) -> Result<Self> {
        let raw = raw.cast::<UdoCpuInfrastructure>();
        if raw.is_null() {
            return Err(UdoError::InvalidArgument(
                "cpu infrastructure is null".to_string(),
            ));
        }
        Ok(Self {
            get_data: (*raw).get_data,
        })
    }

    pub fn new(get_data: Option<UdoCpuGetData>) -> Self {
        Self { get_data }
    }
}

impl Infrastructure for CpuInfrastructure {
    fn resolve(&self, handle: *mut c_void) -> Option<NonNull<u8>> {
        let address = match self.get_data {
            // SAFETY: host-provided callback, contract above.
            Some(get_data) => unsafe { get_data(handle) },
            // without a callback, CPU handles are plain addresses
            None => handle,
        };
        NonNull::new(address.cast())
    }
}

/// Treats every handle as a raw address.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectMemory;

impl Infrastructure for DirectMemory {
    fn resolve(&self, handle: *mut c_void) -> Option<NonNull<u8>> {
        NonNull::new(handle.cast())
    }
}
