//! Selu implementation library for the CPU core.
//!
//! Built as a cdylib exporting the `SnpeUdo_*` implementation entry points.

pub mod selu;

use tracing::debug;
use udo_core::{CoreType, Result};
use udo_runtime::{export_impl_library, set_implementation, with_implementation};

pub use selu::{SeluKernel, SELU_ALPHA, SELU_SCALE};

pub const PACKAGE_NAME: &str = "SeluUdoPackage";
pub const OPERATION_TYPE: &str = "Selu";
pub const LIB_VERSION: (u32, u32, u32) = (1, 0, 0);

fn init() -> Result<()> {
    set_implementation(CoreType::CPU, PACKAGE_NAME)?;
    with_implementation(|lib| {
        let (major, minor, teeny) = LIB_VERSION;
        lib.set_version(major, minor, teeny);
        lib.register_op_definition(selu::definition())
    })?;
    debug!(package = PACKAGE_NAME, "selu cpu library ready");
    Ok(())
}

export_impl_library!(init);
