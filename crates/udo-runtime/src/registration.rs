use std::collections::HashMap;

use tracing::debug;
use udo_core::{
    Bitmask, CoreType, DataType, Result, TensorLayout, UdoError, UdoLibVersion, UdoOpCoreInfo,
    UdoOpDefinition, UdoPerCoreDatatype, UdoRegInfo,
};

use crate::descriptor::RegistrationDescriptor;
use crate::validation::{OperationDescriptor, ValidationFunction};

pub(crate) struct ImplLibInfo {
    pub(crate) name: String,
    pub(crate) core_type: CoreType,
}

/// Schema of a static parameter advertised in the descriptor.
#[derive(Clone, Debug)]
pub enum ParamSchema {
    Scalar {
        name: String,
        data_type: DataType,
    },
    Tensor {
        name: String,
        data_type: DataType,
        layout: TensorLayout,
    },
}

#[derive(Clone, Debug)]
pub struct TensorInfoSchema {
    pub name: String,
    pub per_core: Vec<UdoPerCoreDatatype>,
    pub layout: TensorLayout,
    pub repeated: bool,
    pub is_static: bool,
}

/// Schemas of one operation, filled in through chained `add_*` calls.
#[derive(Debug)]
pub struct OperationInfoBuilder {
    pub(crate) operation_type: String,
    pub(crate) supported_cores: Bitmask,
    pub(crate) num_of_inputs: u32,
    pub(crate) num_of_outputs: u32,
    pub(crate) params: Vec<ParamSchema>,
    pub(crate) inputs: Vec<TensorInfoSchema>,
    pub(crate) outputs: Vec<TensorInfoSchema>,
    pub(crate) core_infos: Vec<UdoOpCoreInfo>,
}

impl OperationInfoBuilder {
    fn new(operation_type: &str, supported_cores: Bitmask, inputs: u32, outputs: u32) -> Self {
        Self {
            operation_type: operation_type.to_string(),
            supported_cores,
            num_of_inputs: inputs,
            num_of_outputs: outputs,
            params: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            core_infos: Vec::new(),
        }
    }

    pub fn add_scalar_param(&mut self, name: &str, data_type: DataType) -> &mut Self {
        self.params.push(ParamSchema::Scalar {
            name: name.to_string(),
            data_type,
        });
        self
    }

    pub fn add_tensor_param(
        &mut self,
        name: &str,
        data_type: DataType,
        layout: TensorLayout,
    ) -> &mut Self {
        self.params.push(ParamSchema::Tensor {
            name: name.to_string(),
            data_type,
            layout,
        });
        self
    }

    /// `per_core` holds one datatype per supported core.
    pub fn add_input_tensor_info(
        &mut self,
        name: &str,
        per_core: &[(CoreType, DataType)],
        layout: TensorLayout,
        repeated: bool,
        is_static: bool,
    ) -> &mut Self {
        self.inputs
            .push(tensor_info(name, per_core, layout, repeated, is_static));
        self
    }

    pub fn add_output_tensor_info(
        &mut self,
        name: &str,
        per_core: &[(CoreType, DataType)],
        layout: TensorLayout,
        repeated: bool,
    ) -> &mut Self {
        self.outputs
            .push(tensor_info(name, per_core, layout, repeated, false));
        self
    }

    pub fn add_core_info(&mut self, core_type: CoreType, calculation_types: Bitmask) -> &mut Self {
        self.core_infos.push(UdoOpCoreInfo {
            core_type,
            operation_calculation_types: calculation_types,
        });
        self
    }

    pub fn operation_type(&self) -> &str {
        &self.operation_type
    }
}

fn tensor_info(
    name: &str,
    per_core: &[(CoreType, DataType)],
    layout: TensorLayout,
    repeated: bool,
    is_static: bool,
) -> TensorInfoSchema {
    TensorInfoSchema {
        name: name.to_string(),
        per_core: per_core
            .iter()
            .map(|&(core_type, data_type)| UdoPerCoreDatatype {
                core_type,
                data_type,
            })
            .collect(),
        layout,
        repeated,
        is_static,
    }
}

type ValidatorKey = (String, CoreType);

/// Collects a package's registration. Consumed by [`finish`](Self::finish),
/// which flattens it into the descriptor exactly once.
pub struct RegistrationBuilder {
    package_name: String,
    supported_cores: Bitmask,
    version: UdoLibVersion,
    impl_libs: Vec<ImplLibInfo>,
    operations: Vec<OperationInfoBuilder>,
    validators: HashMap<ValidatorKey, Box<dyn ValidationFunction>>,
}

impl RegistrationBuilder {
    pub fn new(package_name: &str, supported_cores: Bitmask) -> Self {
        Self {
            package_name: package_name.to_string(),
            supported_cores,
            version: UdoLibVersion::default(),
            impl_libs: Vec::new(),
            operations: Vec::new(),
            validators: HashMap::new(),
        }
    }

    pub fn set_version(&mut self, major: u32, minor: u32, teeny: u32) -> &mut Self {
        self.version = UdoLibVersion::new(major, minor, teeny);
        self
    }

    pub fn add_impl_lib(&mut self, name: &str, core_type: CoreType) -> &mut Self {
        self.impl_libs.push(ImplLibInfo {
            name: name.to_string(),
            core_type,
        });
        self
    }

    pub fn add_operation(
        &mut self,
        operation_type: &str,
        supported_cores: Bitmask,
        num_of_inputs: u32,
        num_of_outputs: u32,
    ) -> &mut OperationInfoBuilder {
        self.operations.push(OperationInfoBuilder::new(
            operation_type,
            supported_cores,
            num_of_inputs,
            num_of_outputs,
        ));
        let last = self.operations.len() - 1;
        &mut self.operations[last]
    }

    pub fn register_validation_function(
        &mut self,
        operation_type: &str,
        core_type: CoreType,
        function: impl ValidationFunction + 'static,
    ) -> Result<()> {
        let key = (operation_type.to_string(), core_type);
        if self.validators.contains_key(&key) {
            return Err(UdoError::InvalidArgument(format!(
                "validation function for ({operation_type}, {core_type:?}) already registered"
            )));
        }
        self.validators.insert(key, Box::new(function));
        Ok(())
    }

    pub fn finish(self) -> Result<RegistrationLibrary> {
        let descriptor = RegistrationDescriptor::compile(
            &self.package_name,
            self.supported_cores,
            &self.impl_libs,
            &self.operations,
        )?;
        Ok(RegistrationLibrary {
            package_name: self.package_name,
            version: self.version,
            descriptor,
            validators: self.validators,
        })
    }
}

/// A finished registration: the flat descriptor plus validator dispatch.
pub struct RegistrationLibrary {
    package_name: String,
    version: UdoLibVersion,
    descriptor: RegistrationDescriptor,
    validators: HashMap<ValidatorKey, Box<dyn ValidationFunction>>,
}

impl RegistrationLibrary {
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn version(&self) -> &UdoLibVersion {
        &self.version
    }

    pub fn version_mut(&mut self) -> &mut UdoLibVersion {
        &mut self.version
    }

    pub fn reg_info(&mut self) -> &mut UdoRegInfo {
        self.descriptor.reg_info()
    }

    pub fn descriptor(&self) -> &RegistrationDescriptor {
        &self.descriptor
    }

    pub fn has_validator(&self, operation_type: &str, core_type: CoreType) -> bool {
        self.validators
            .contains_key(&(operation_type.to_string(), core_type))
    }

    /// Dispatches to the validator bound to the definition's exact
    /// (operation type, core type) pair.
    ///
    /// # Safety
    ///
    /// See [`OperationDescriptor::from_raw`].
    pub unsafe fn validate_operation(&self, definition: *const UdoOpDefinition) -> Result<()> {
        let op = OperationDescriptor::from_raw(definition)?;
        let key = (op.operation_type().to_string(), op.core_type());
        let validator = self.validators.get(&key).ok_or_else(|| {
            UdoError::WrongOperation(format!(
                "no validation function for ({}, {:?})",
                key.0, key.1
            ))
        })?;
        debug!(op = %key.0, core = ?key.1, "validating operation");
        validator.validate(&op)
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};

    use super::*;

    fn selu_like(builder: &mut RegistrationBuilder, name: &str) {
        builder
            .add_operation(name, CoreType::CPU.0, 1, 1)
            .add_core_info(CoreType::CPU, DataType::FLOAT_16.0 | DataType::FLOAT_32.0)
            .add_input_tensor_info(
                "in",
                &[(CoreType::CPU, DataType::FLOAT_32)],
                TensorLayout::NHWC,
                false,
                false,
            )
            .add_output_tensor_info(
                "out",
                &[(CoreType::CPU, DataType::FLOAT_32)],
                TensorLayout::NHWC,
                false,
            );
    }

    const CPU_F32: &[(CoreType, DataType)] = &[(CoreType::CPU, DataType::FLOAT_32)];

    fn accept(_: &OperationDescriptor) -> Result<()> {
        Ok(())
    }

    fn builder() -> RegistrationBuilder {
        let mut b = RegistrationBuilder::new("Pkg", CoreType::CPU.0);
        b.add_impl_lib("libpkg.so", CoreType::CPU);
        b
    }

    fn op_definition(name: &CString, core: CoreType) -> UdoOpDefinition {
        UdoOpDefinition {
            udo_core_type: core,
            operation_type: name.as_ptr().cast_mut(),
            num_of_static_params: 0,
            static_params: std::ptr::null_mut(),
            num_of_inputs: 1,
            inputs: std::ptr::null_mut(),
            num_of_outputs: 1,
            outputs: std::ptr::null_mut(),
        }
    }

    #[test]
    fn compiles_descriptor() {
        let mut b = builder();
        selu_like(&mut b, "A");
        selu_like(&mut b, "B");
        b.add_operation("C", CoreType::CPU.0, 1, 1)
            .add_scalar_param("alpha", DataType::FLOAT_32)
            .add_core_info(CoreType::CPU, DataType::FLOAT_32.0)
            .add_input_tensor_info("x", CPU_F32, TensorLayout::NCHW, false, false)
            .add_output_tensor_info("y", CPU_F32, TensorLayout::NCHW, false);

        let mut lib = b.finish().unwrap();
        assert_eq!(lib.descriptor().operations_string(), "A B C");
        assert_eq!(lib.descriptor().num_of_operations(), 3);
        let info = lib.reg_info();

        assert_eq!(info.num_of_implementation_lib, 1);
        assert_eq!(info.num_of_operations, 3);
        unsafe {
            assert_eq!(CStr::from_ptr(info.package_name).to_str().unwrap(), "Pkg");
            assert_eq!(CStr::from_ptr(info.operations_string).to_str().unwrap(), "A B C");
            let lib0 = &*info.implementation_lib;
            assert_eq!(CStr::from_ptr(lib0.library_name).to_str().unwrap(), "libpkg.so");

            let ops = std::slice::from_raw_parts(info.operations_info, 3);
            assert_eq!(CStr::from_ptr(ops[1].operation_type).to_str().unwrap(), "B");
            assert_eq!(ops[0].num_of_static_params, 0);
            assert!(ops[0].static_params.is_null());

            let c = &ops[2];
            assert_eq!(c.num_of_static_params, 1);
            let alpha = &*c.static_params;
            assert_eq!(CStr::from_ptr(alpha.param_name).to_str().unwrap(), "alpha");
            assert_eq!(alpha.value.scalar_param.data_type, DataType::FLOAT_32);

            let input = &*c.input_infos;
            assert_eq!(CStr::from_ptr(input.tensor_name).to_str().unwrap(), "x");
            assert_eq!(input.layout, TensorLayout::NCHW);
            assert_eq!((*input.per_core_datatype).data_type, DataType::FLOAT_32);
            assert_eq!((*c.op_per_core_info).core_type, CoreType::CPU);
        }
    }

    #[test]
    fn empty_lists_are_unknown_errors() {
        let mut b = RegistrationBuilder::new("Pkg", CoreType::CPU.0);
        selu_like(&mut b, "A");
        let err = b.finish().err().unwrap();
        assert!(matches!(err, UdoError::Unknown(_)));

        let err = builder().finish().err().unwrap();
        assert!(matches!(err, UdoError::Unknown(_)));
    }

    #[test]
    fn schema_errors_surface_per_operation() {
        let mut b = builder();
        b.add_operation("NoOutputs", CoreType::CPU.0, 1, 1)
            .add_core_info(CoreType::CPU, DataType::FLOAT_32.0)
            .add_input_tensor_info("x", CPU_F32, TensorLayout::NHWC, false, false);
        assert!(matches!(b.finish().err().unwrap(), UdoError::WrongNumOfOutputs(_)));

        let mut b = builder();
        b.add_operation("NoInputs", CoreType::CPU.0, 1, 1)
            .add_core_info(CoreType::CPU, DataType::FLOAT_32.0);
        assert!(matches!(b.finish().err().unwrap(), UdoError::WrongNumOfInputs(_)));

        let mut b = builder();
        b.add_operation("NoCores", CoreType::CPU.0, 1, 1)
            .add_input_tensor_info("x", CPU_F32, TensorLayout::NHWC, false, false)
            .add_output_tensor_info("y", CPU_F32, TensorLayout::NHWC, false);
        assert!(matches!(b.finish().err().unwrap(), UdoError::WrongCoreType(_)));

        let mut b = builder();
        b.add_operation("NoDatatypes", CoreType::CPU.0, 1, 1)
            .add_core_info(CoreType::CPU, DataType::FLOAT_32.0)
            .add_input_tensor_info("x", &[], TensorLayout::NHWC, false, false)
            .add_output_tensor_info("y", CPU_F32, TensorLayout::NHWC, false);
        assert!(matches!(b.finish().err().unwrap(), UdoError::InvalidArgument(_)));
    }

    #[test]
    fn validator_lookup_is_exact() {
        let mut b = builder();
        selu_like(&mut b, "Selu");
        b.register_validation_function("Selu", CoreType::CPU, accept).unwrap();
        let lib = b.finish().unwrap();

        let name = CString::new("Selu").unwrap();
        let cpu = op_definition(&name, CoreType::CPU);
        let dsp = op_definition(&name, CoreType::DSP);
        assert!(unsafe { lib.validate_operation(&cpu) }.is_ok());
        let err = unsafe { lib.validate_operation(&dsp) }.unwrap_err();
        assert!(matches!(err, UdoError::WrongOperation(_)));
        assert!(!lib.has_validator("Selu", CoreType::DSP));
    }

    #[test]
    fn validator_errors_pass_through() {
        let mut b = builder();
        selu_like(&mut b, "Selu");
        b.register_validation_function("Selu", CoreType::CPU, |op: &OperationDescriptor| {
            if op.num_of_static_params() == 0 {
                Ok(())
            } else {
                Err(UdoError::WrongNumOfParams("no params expected".to_string()))
            }
        })
        .unwrap();
        let lib = b.finish().unwrap();

        let name = CString::new("Selu").unwrap();
        let mut def = op_definition(&name, CoreType::CPU);
        def.num_of_static_params = 2;
        let err = unsafe { lib.validate_operation(&def) }.unwrap_err();
        assert!(matches!(err, UdoError::WrongNumOfParams(_)));

        let err = unsafe { lib.validate_operation(std::ptr::null()) }.unwrap_err();
        assert!(matches!(err, UdoError::InvalidArgument(_)));
    }

    #[test]
    fn duplicate_validator_is_rejected() {
        let mut b = builder();
        b.register_validation_function("Selu", CoreType::CPU, accept).unwrap();
        let err = b.register_validation_function("Selu", CoreType::CPU, accept).unwrap_err();
        assert!(matches!(err, UdoError::InvalidArgument(_)));
        b.register_validation_function("Selu", CoreType::GPU, accept).unwrap();
    }
}
