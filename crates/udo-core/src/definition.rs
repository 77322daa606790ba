use std::marker::PhantomData;
use std::sync::Arc;

use crate::abi::{UdoParam, UdoTensorParam};
use crate::error::{Result, UdoError};
use crate::infra::Infrastructure;
use crate::operation::{Kernel, KernelOperation, Operation};
use crate::param::StaticParams;

/// Factory for one operation type. Registered once per implementation
/// library under [`operation_type`](OpDefinition::operation_type).
pub trait OpDefinition: Send + Sync {
    fn operation_type(&self) -> &str;

    /// # Safety
    ///
    /// Tensor descriptions must satisfy
    /// [`TensorParam::from_raw`](crate::TensorParam::from_raw) and static
    /// parameters [`StaticParams::from_raw`].
    unsafe fn create_operation(
        &self,
        infra: Option<Arc<dyn Infrastructure>>,
        inputs: &[UdoTensorParam],
        outputs: &[UdoTensorParam],
        static_params: &[UdoParam],
    ) -> Result<Box<dyn Operation>>;
}

/// Definition of a fixed-arity operation backed by a [`Kernel`].
///
/// `build` turns the decoded static parameters into a kernel instance, so
/// parameter checks belong there.
pub struct KernelOpDefinition<K, F> {
    operation_type: String,
    num_inputs: usize,
    num_outputs: usize,
    build: F,
    _kernel: PhantomData<fn() -> K>,
}

impl<K, F> KernelOpDefinition<K, F>
where
    K: Kernel + 'static,
    F: Fn(&StaticParams) -> Result<K> + Send + Sync,
{
    pub fn new(operation_type: &str, num_inputs: usize, num_outputs: usize, build: F) -> Self {
        Self {
            operation_type: operation_type.to_string(),
            num_inputs,
            num_outputs,
            build,
            _kernel: PhantomData,
        }
    }
}

impl<K, F> OpDefinition for KernelOpDefinition<K, F>
where
    K: Kernel + 'static,
    F: Fn(&StaticParams) -> Result<K> + Send + Sync,
{
    fn operation_type(&self) -> &str {
        &self.operation_type
    }

    unsafe fn create_operation(
        &self,
        infra: Option<Arc<dyn Infrastructure>>,
        inputs: &[UdoTensorParam],
        outputs: &[UdoTensorParam],
        static_params: &[UdoParam],
    ) -> Result<Box<dyn Operation>> {
        if inputs.len() != self.num_inputs {
            return Err(UdoError::WrongNumOfInputs(format!(
                "{} takes {} inputs, got {}",
                self.operation_type,
                self.num_inputs,
                inputs.len()
            )));
        }
        if outputs.len() != self.num_outputs {
            return Err(UdoError::WrongNumOfOutputs(format!(
                "{} takes {} outputs, got {}",
                self.operation_type,
                self.num_outputs,
                outputs.len()
            )));
        }
        let infra = infra.ok_or_else(|| {
            UdoError::InvalidArgument(format!("{} needs an infrastructure", self.operation_type))
        })?;

        let params = StaticParams::from_raw(static_params)?;
        let kernel = (self.build)(&params)?;
        let op_type = &self.operation_type;
        let op = KernelOperation::new(op_type, kernel, infra, inputs, outputs, params)?;
        Ok(Box::new(op))
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use super::*;
    use crate::abi::{
        DataType, ParamType, TensorLayout, UdoParamValue, UdoScalarParam, UdoScalarValue,
    };
    use crate::infra::DirectMemory;
    use crate::operation::KernelContext;
    use crate::param::ParamValue;
    use crate::tensor::TensorParam;

    struct AddBias(f32);

    impl Kernel for AddBias {
        fn compute(&mut self, ctx: &mut KernelContext<'_>) -> Result<()> {
            let bias = self.0;
            ctx.unary_f32(0, 0, |x| x + bias)
        }
    }

    fn add_bias() -> impl OpDefinition {
        KernelOpDefinition::new("AddBias", 1, 1, |params: &StaticParams| {
            let bias = params
                .scalar("bias")
                .ok_or_else(|| UdoError::WrongNumOfParams("bias is required".to_string()))?;
            Ok(AddBias(bias.as_f32()))
        })
    }

    /// Adds a static tensor elementwise, cycling it over the input.
    struct AddShift;

    impl Kernel for AddShift {
        fn compute(&mut self, ctx: &mut KernelContext<'_>) -> Result<()> {
            let Some(ParamValue::Tensor(shift)) = ctx.params().get("shift") else {
                return Err(UdoError::WrongNumOfParams("shift is required".to_string()));
            };
            let bytes = shift
                .owned_bytes()
                .ok_or_else(|| UdoError::InvalidArgument("shift was not copied".to_string()))?;
            let shift: Vec<f32> = bytes
                .chunks_exact(4)
                .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            let mut at = 0;
            ctx.unary_f32(0, 0, |x| {
                let y = x + shift[at % shift.len()];
                at += 1;
                y
            })
        }
    }

    fn tensor(dims: &mut [u32], data: &mut [f32]) -> UdoTensorParam {
        UdoTensorParam {
            tensor_rank: dims.len() as u32,
            max_dimensions: dims.as_mut_ptr(),
            curr_dimensions: dims.as_mut_ptr(),
            tensor_data: data.as_mut_ptr().cast(),
            ..Default::default()
        }
    }

    #[test]
    fn builds_kernel_from_static_params() {
        let name = CString::new("bias").unwrap();
        let params = [UdoParam {
            param_type: ParamType::SCALAR,
            param_name: name.as_ptr().cast_mut(),
            value: UdoParamValue {
                scalar_param: UdoScalarParam {
                    data_type: DataType::FLOAT_32,
                    data_value: UdoScalarValue { float_value: 0.5 },
                },
            },
        }];
        let mut dims = [2u32];
        let mut input = [1.0f32, 2.0];
        let mut output = [0.0f32; 2];
        let def = add_bias();

        let mut op = unsafe {
            def.create_operation(
                Some(Arc::new(DirectMemory)),
                &[tensor(&mut dims, &mut input)],
                &[tensor(&mut dims.clone(), &mut output)],
                &params,
            )
        }
        .unwrap();
        assert_eq!(op.operation_type(), "AddBias");
        op.execute(true, 0, None).unwrap();
        assert_eq!(output, [1.5, 2.5]);
    }

    #[test]
    fn kernel_reads_static_tensor_param() {
        let shift: Vec<u8> = [10.0f32, 20.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let mut weights = TensorParam::owned(DataType::FLOAT_32, TensorLayout::NHWC, &[2], &shift);
        let name = CString::new("shift").unwrap();
        let params = [UdoParam {
            param_type: ParamType::TENSOR,
            param_name: name.as_ptr().cast_mut(),
            value: UdoParamValue {
                tensor_param: weights.as_raw(),
            },
        }];

        let copied = unsafe { StaticParams::from_raw(&params) }.unwrap();
        assert_eq!(copied.names().collect::<Vec<_>>(), ["shift"]);
        assert_eq!(copied.tensor("shift").unwrap().max_dims(), &[2]);
        assert!(copied.scalar("shift").is_none());

        let def = KernelOpDefinition::new("AddShift", 1, 1, |_: &StaticParams| Ok(AddShift));
        let mut dims = [4u32];
        let mut input = [1.0f32, 2.0, 3.0, 4.0];
        let mut output = [0.0f32; 4];
        let mut op = unsafe {
            def.create_operation(
                Some(Arc::new(DirectMemory)),
                &[tensor(&mut dims, &mut input)],
                &[tensor(&mut dims.clone(), &mut output)],
                &params,
            )
        }
        .unwrap();
        drop(weights);
        op.execute(true, 0, None).unwrap();
        assert_eq!(output, [11.0, 22.0, 13.0, 24.0]);

        let mut bare = unsafe {
            def.create_operation(
                Some(Arc::new(DirectMemory)),
                &[tensor(&mut dims, &mut input)],
                &[tensor(&mut dims.clone(), &mut output)],
                &[],
            )
        }
        .unwrap();
        let err = bare.execute(true, 1, None).unwrap_err();
        assert!(matches!(err, UdoError::WrongNumOfParams(_)));
    }

    #[test]
    fn kernel_constructor_errors_propagate() {
        let mut dims = [1u32];
        let mut data = [0.0f32];
        let io = tensor(&mut dims, &mut data);

        let err = unsafe {
            add_bias().create_operation(Some(Arc::new(DirectMemory)), &[io], &[io], &[])
        }
        .err()
        .unwrap();
        assert!(matches!(err, UdoError::WrongNumOfParams(_)));
    }

    #[test]
    fn declared_counts_are_enforced() {
        let mut dims = [1u32];
        let mut data = [0.0f32];
        let io = tensor(&mut dims, &mut data);
        let def = add_bias();

        let infra: Option<Arc<dyn Infrastructure>> = Some(Arc::new(DirectMemory));
        let err = unsafe { def.create_operation(infra.clone(), &[io, io], &[io], &[]) }
            .err()
            .unwrap();
        assert!(matches!(err, UdoError::WrongNumOfInputs(_)));

        let err = unsafe { def.create_operation(infra, &[io], &[], &[]) }
            .err()
            .unwrap();
        assert!(matches!(err, UdoError::WrongNumOfOutputs(_)));
    }

    #[test]
    fn missing_infrastructure_is_rejected() {
        let mut dims = [1u32];
        let mut data = [0.0f32];
        let io = tensor(&mut dims, &mut data);

        let err = unsafe { add_bias().create_operation(None, &[io], &[io], &[]) }
            .err()
            .unwrap();
        assert!(matches!(err, UdoError::InvalidArgument(_)));
    }
}
