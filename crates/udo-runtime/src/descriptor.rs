//! Flattening of a registration into the host-readable [`UdoRegInfo`].
//!
//! Every array and string the descriptor points at is owned by
//! [`RegistrationDescriptor`]. Vec and CString contents live on the heap, so
//! the pointers stay valid when the descriptor itself moves.

use std::ffi::{c_char, CString};

use tracing::debug;
use udo_core::{
    Bitmask, ParamType, Result, UdoError, UdoLibraryInfo, UdoOpCoreInfo, UdoOperationInfo,
    UdoParam, UdoParamValue, UdoPerCoreDatatype, UdoRegInfo, UdoScalarParam, UdoScalarValue,
    UdoTensorInfo, UdoTensorParam,
};

use crate::implementation::to_c_string;
use crate::registration::{ImplLibInfo, OperationInfoBuilder, ParamSchema, TensorInfoSchema};

pub struct RegistrationDescriptor {
    strings: Vec<CString>,
    impl_libs: Vec<UdoLibraryInfo>,
    operations: Vec<UdoOperationInfo>,
    params: Vec<Vec<UdoParam>>,
    tensor_infos: Vec<Vec<UdoTensorInfo>>,
    per_core: Vec<Vec<UdoPerCoreDatatype>>,
    core_infos: Vec<Vec<UdoOpCoreInfo>>,
    operations_string: String,
    reg_info: Box<UdoRegInfo>,
}

// SAFETY: all raw pointers reachable from the descriptor point into its own
// heap allocations.
unsafe impl Send for RegistrationDescriptor {}

impl RegistrationDescriptor {
    pub(crate) fn compile(
        package_name: &str,
        supported_cores: Bitmask,
        impl_libs: &[ImplLibInfo],
        operations: &[OperationInfoBuilder],
    ) -> Result<Self> {
        let mut d = Self {
            strings: Vec::new(),
            impl_libs: Vec::with_capacity(impl_libs.len()),
            operations: Vec::with_capacity(operations.len()),
            params: Vec::new(),
            tensor_infos: Vec::new(),
            per_core: Vec::new(),
            core_infos: Vec::new(),
            operations_string: String::new(),
            reg_info: Box::new(UdoRegInfo {
                package_name: std::ptr::null_mut(),
                supported_core_types: supported_cores,
                num_of_implementation_lib: 0,
                implementation_lib: std::ptr::null_mut(),
                operations_string: std::ptr::null_mut(),
                num_of_operations: 0,
                operations_info: std::ptr::null_mut(),
            }),
        };

        if impl_libs.is_empty() {
            return Err(UdoError::Unknown(
                "no implementation libraries registered".to_string(),
            ));
        }
        for lib in impl_libs {
            let library_name = d.intern(&lib.name, "library name")?;
            d.impl_libs.push(UdoLibraryInfo {
                library_name,
                udo_core_type: lib.core_type,
            });
        }

        if operations.is_empty() {
            return Err(UdoError::Unknown("no operations registered".to_string()));
        }
        let mut names = Vec::with_capacity(operations.len());
        for op in operations {
            let info = d.operation_info(op)?;
            d.operations.push(info);
            names.push(op.operation_type.as_str());
        }
        d.operations_string = names.join(" ");

        let package_name_ptr = d.intern(package_name, "package name")?;
        let operations_string = to_c_string(&d.operations_string, "operations string")?;
        let operations_string_ptr = operations_string.as_ptr().cast_mut();
        d.strings.push(operations_string);

        *d.reg_info = UdoRegInfo {
            package_name: package_name_ptr,
            supported_core_types: supported_cores,
            num_of_implementation_lib: d.impl_libs.len() as u32,
            implementation_lib: d.impl_libs.as_mut_ptr(),
            operations_string: operations_string_ptr,
            num_of_operations: d.operations.len() as u32,
            operations_info: d.operations.as_mut_ptr(),
        };
        debug!(
            package = package_name,
            operations = %d.operations_string,
            "compiled registration descriptor"
        );
        Ok(d)
    }

    pub fn reg_info(&mut self) -> &mut UdoRegInfo {
        &mut self.reg_info
    }

    pub fn operations_string(&self) -> &str {
        &self.operations_string
    }

    pub fn num_of_operations(&self) -> usize {
        self.operations.len()
    }

    fn operation_info(&mut self, op: &OperationInfoBuilder) -> Result<UdoOperationInfo> {
        let name = &op.operation_type;
        if op.inputs.is_empty() || op.inputs.len() != op.num_of_inputs as usize {
            return Err(UdoError::WrongNumOfInputs(format!(
                "{name} declares {} inputs but describes {}",
                op.num_of_inputs,
                op.inputs.len()
            )));
        }
        if op.outputs.is_empty() || op.outputs.len() != op.num_of_outputs as usize {
            return Err(UdoError::WrongNumOfOutputs(format!(
                "{name} declares {} outputs but describes {}",
                op.num_of_outputs,
                op.outputs.len()
            )));
        }
        let num_cores = op.supported_cores.count_ones() as usize;
        if op.core_infos.is_empty() || op.core_infos.len() != num_cores {
            return Err(UdoError::WrongCoreType(format!(
                "{name} supports {num_cores} cores but has {} core infos",
                op.core_infos.len()
            )));
        }

        let operation_type = self.intern(name, "operation type")?;
        let (num_of_static_params, static_params) = self.static_params(&op.params)?;
        let input_infos = self.tensor_infos(name, &op.inputs, num_cores)?;
        let output_infos = self.tensor_infos(name, &op.outputs, num_cores)?;
        let mut core_infos = op.core_infos.clone();
        let op_per_core_info = core_infos.as_mut_ptr();
        self.core_infos.push(core_infos);

        Ok(UdoOperationInfo {
            operation_type,
            supported_by_cores: op.supported_cores,
            num_of_static_params,
            static_params,
            num_of_inputs: op.num_of_inputs,
            input_infos,
            num_of_outputs: op.num_of_outputs,
            output_infos,
            op_per_core_info,
        })
    }

    fn static_params(&mut self, schemas: &[ParamSchema]) -> Result<(u32, *mut UdoParam)> {
        if schemas.is_empty() {
            return Ok((0, std::ptr::null_mut()));
        }
        let mut params = Vec::with_capacity(schemas.len());
        for schema in schemas {
            let param = match schema {
                ParamSchema::Scalar { name, data_type } => UdoParam {
                    param_type: ParamType::SCALAR,
                    param_name: self.intern(name, "param name")?,
                    value: UdoParamValue {
                        scalar_param: UdoScalarParam {
                            data_type: *data_type,
                            data_value: UdoScalarValue { uint32_value: 0 },
                        },
                    },
                },
                ParamSchema::Tensor {
                    name,
                    data_type,
                    layout,
                } => UdoParam {
                    param_type: ParamType::TENSOR,
                    param_name: self.intern(name, "param name")?,
                    value: UdoParamValue {
                        tensor_param: UdoTensorParam {
                            data_type: *data_type,
                            layout: *layout,
                            ..Default::default()
                        },
                    },
                },
            };
            params.push(param);
        }
        let ptr = params.as_mut_ptr();
        let len = params.len() as u32;
        self.params.push(params);
        Ok((len, ptr))
    }

    fn tensor_infos(
        &mut self,
        op: &str,
        schemas: &[TensorInfoSchema],
        num_cores: usize,
    ) -> Result<*mut UdoTensorInfo> {
        let mut infos = Vec::with_capacity(schemas.len());
        for schema in schemas {
            if schema.per_core.is_empty() || schema.per_core.len() != num_cores {
                return Err(UdoError::InvalidArgument(format!(
                    "tensor {} of {op} lists {} per-core datatypes for {num_cores} cores",
                    schema.name,
                    schema.per_core.len()
                )));
            }
            let mut per_core = schema.per_core.clone();
            let per_core_datatype = per_core.as_mut_ptr();
            self.per_core.push(per_core);

            infos.push(UdoTensorInfo {
                tensor_name: self.intern(&schema.name, "tensor name")?,
                per_core_datatype,
                layout: schema.layout,
                repeated: schema.repeated,
                is_static: schema.is_static,
            });
        }
        let ptr = infos.as_mut_ptr();
        self.tensor_infos.push(infos);
        Ok(ptr)
    }

    fn intern(&mut self, value: &str, what: &str) -> Result<*mut c_char> {
        let s = to_c_string(value, what)?;
        let ptr = s.as_ptr().cast_mut();
        self.strings.push(s);
        Ok(ptr)
    }
}
