use std::sync::Arc;

use udo_core::{
    Kernel, KernelContext, KernelOpDefinition, OpDefinition, Result, StaticParams, UdoError,
};

pub const SELU_SCALE: f32 = 1.050_700_98;
pub const SELU_ALPHA: f32 = 1.673_263_24;

#[inline]
pub fn selu(x: f32) -> f32 {
    if x > 0.0 {
        SELU_SCALE * x
    } else {
        SELU_SCALE * SELU_ALPHA * (x.exp() - 1.0)
    }
}

/// Scaled exponential linear unit over one f32 tensor.
#[derive(Clone, Copy, Debug, Default)]
pub struct SeluKernel;

impl Kernel for SeluKernel {
    fn compute(&mut self, ctx: &mut KernelContext<'_>) -> Result<()> {
        ctx.unary_f32(0, 0, selu)
    }
}

pub fn definition() -> Arc<dyn OpDefinition> {
    Arc::new(KernelOpDefinition::new(
        crate::OPERATION_TYPE,
        1,
        1,
        |params: &StaticParams| {
            if !params.is_empty() {
                return Err(UdoError::WrongNumOfParams(format!(
                    "{} takes no static params, got {}",
                    crate::OPERATION_TYPE,
                    params.len()
                )));
            }
            Ok(SeluKernel)
        },
    ))
}
