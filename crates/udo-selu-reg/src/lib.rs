//! Registration library of the Selu package.
//!
//! Advertises one operation ("Selu") on the CPU core, names the CPU
//! implementation library the host should load next and validates
//! definitions before the host instantiates them.

use tracing::debug;
use udo_core::{CoreType, DataType, Result, TensorLayout, UdoError};
use udo_runtime::{
    export_reg_library, OperationDescriptor, RegistrationBuilder, RegistrationLibrary,
};

pub const PACKAGE_NAME: &str = "SeluUdoPackage";
pub const OPERATION_TYPE: &str = "Selu";
pub const LIB_VERSION: (u32, u32, u32) = (1, 0, 0);

/// File name of the CPU implementation library, resolved by the host's
/// loader. Override with `UDO_LIB_NAME_CPU` at build time.
pub const IMPL_LIB_CPU: &str = match option_env!("UDO_LIB_NAME_CPU") {
    Some(name) => name,
    None => "libUdoSeluUdoPackageImplCpu.so",
};

/// Selu on CPU: no static params, one input, one output.
pub fn validate_selu_cpu(op: &OperationDescriptor) -> Result<()> {
    if op.operation_type() != OPERATION_TYPE {
        return Err(UdoError::WrongOperation(format!(
            "expected {OPERATION_TYPE}, got {}",
            op.operation_type()
        )));
    }
    if op.num_of_static_params() != 0 {
        return Err(UdoError::WrongNumOfParams(format!(
            "{OPERATION_TYPE} takes no static params, got {}",
            op.num_of_static_params()
        )));
    }
    if op.num_of_inputs() != 1 {
        return Err(UdoError::WrongNumOfInputs(format!(
            "{OPERATION_TYPE} takes 1 input, got {}",
            op.num_of_inputs()
        )));
    }
    if op.num_of_outputs() != 1 {
        return Err(UdoError::WrongNumOfOutputs(format!(
            "{OPERATION_TYPE} produces 1 output, got {}",
            op.num_of_outputs()
        )));
    }
    Ok(())
}

pub fn build() -> Result<RegistrationLibrary> {
    let mut builder = RegistrationBuilder::new(PACKAGE_NAME, CoreType::CPU.0);
    let (major, minor, teeny) = LIB_VERSION;
    builder
        .set_version(major, minor, teeny)
        .add_impl_lib(IMPL_LIB_CPU, CoreType::CPU);

    let f32_on_cpu = [(CoreType::CPU, DataType::FLOAT_32)];
    builder
        .add_operation(OPERATION_TYPE, CoreType::CPU.0, 1, 1)
        .add_core_info(CoreType::CPU, DataType::FLOAT_16.0 | DataType::FLOAT_32.0)
        .add_input_tensor_info("Placeholder", &f32_on_cpu, TensorLayout::NHWC, false, false)
        .add_output_tensor_info("Output", &f32_on_cpu, TensorLayout::NHWC, false);

    builder.register_validation_function(OPERATION_TYPE, CoreType::CPU, validate_selu_cpu)?;

    let library = builder.finish()?;
    debug!(
        package = PACKAGE_NAME,
        impl_lib = IMPL_LIB_CPU,
        "selu registration ready"
    );
    Ok(library)
}

export_reg_library!(build);

#[cfg(test)]
mod tests {
    use std::ffi::CString;
    use std::ptr;

    use udo_core::UdoOpDefinition;

    use super::*;

    fn descriptor(op: &CString, params: u32, inputs: u32, outputs: u32) -> OperationDescriptor {
        let raw = UdoOpDefinition {
            udo_core_type: CoreType::CPU,
            operation_type: op.as_ptr().cast_mut(),
            num_of_static_params: params,
            static_params: ptr::null_mut(),
            num_of_inputs: inputs,
            inputs: ptr::null_mut(),
            num_of_outputs: outputs,
            outputs: ptr::null_mut(),
        };
        unsafe { OperationDescriptor::from_raw(&raw) }.unwrap()
    }

    #[test]
    fn accepts_one_in_one_out() {
        let op = CString::new("Selu").unwrap();
        validate_selu_cpu(&descriptor(&op, 0, 1, 1)).unwrap();
    }

    #[test]
    fn reports_the_offending_count() {
        let op = CString::new("Selu").unwrap();
        let status = |p, i, o| {
            validate_selu_cpu(&descriptor(&op, p, i, o))
                .unwrap_err()
                .status()
        };
        assert_eq!(status(1, 1, 1), udo_core::ErrorType::WRONG_NUM_OF_PARAMS);
        assert_eq!(status(0, 2, 1), udo_core::ErrorType::WRONG_NUM_OF_INPUTS);
        assert_eq!(status(0, 1, 0), udo_core::ErrorType::WRONG_NUM_OF_OUTPUTS);
    }

    #[test]
    fn other_operation_types_are_refused() {
        let op = CString::new("Relu").unwrap();
        let err = validate_selu_cpu(&descriptor(&op, 0, 1, 1)).unwrap_err();
        assert!(matches!(err, UdoError::WrongOperation(_)));
    }

    #[test]
    fn build_compiles_descriptor() {
        let mut lib = build().unwrap();
        assert_eq!(lib.package_name(), PACKAGE_NAME);
        assert_eq!(lib.descriptor().operations_string(), "Selu");
        assert!(lib.has_validator("Selu", CoreType::CPU));
        assert!(!lib.has_validator("Selu", CoreType::DSP));
        assert_eq!(lib.reg_info().num_of_operations, 1);
    }
}
