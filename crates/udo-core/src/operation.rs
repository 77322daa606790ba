use std::mem::{align_of, size_of};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::abi::{DataType, UdoExternalNotify, UdoTensorParam};
use crate::error::{Result, UdoError};
use crate::infra::Infrastructure;
use crate::param::StaticParams;
use crate::tensor::{Payload, TensorParam};

/// An executable instance created by an [`OpDefinition`](crate::OpDefinition).
pub trait Operation {
    fn operation_type(&self) -> &str;

    /// Runs the operation once. Only blocking execution is supported by the
    /// kernels in this workspace.
    fn execute(&mut self, blocking: bool, request_id: u32, notify: UdoExternalNotify)
        -> Result<()>;

    /// Rebinds inputs and outputs by shallow copy. The number of tensors read
    /// from each array is the count the operation was created with.
    ///
    /// # Safety
    ///
    /// Non-null arrays must hold that many valid tensor descriptions.
    unsafe fn set_io(
        &mut self,
        inputs: *const UdoTensorParam,
        outputs: *const UdoTensorParam,
    ) -> Result<()>;

    /// Elapsed time of the last successful execution, in microseconds.
    fn profile(&self) -> u32;
}

/// Numeric body of an operation.
pub trait Kernel {
    fn compute(&mut self, ctx: &mut KernelContext<'_>) -> Result<()>;
}

/// What a kernel sees during one execution.
pub struct KernelContext<'a> {
    inputs: &'a [TensorParam],
    outputs: &'a [TensorParam],
    params: &'a StaticParams,
    infra: &'a dyn Infrastructure,
}

impl<'a> KernelContext<'a> {
    pub fn new(
        inputs: &'a [TensorParam],
        outputs: &'a [TensorParam],
        params: &'a StaticParams,
        infra: &'a dyn Infrastructure,
    ) -> Self {
        Self {
            inputs,
            outputs,
            params,
            infra,
        }
    }

    pub fn params(&self) -> &StaticParams {
        self.params
    }

    pub fn input(&self, index: usize) -> Result<&TensorParam> {
        self.inputs
            .get(index)
            .ok_or_else(|| UdoError::WrongNumOfInputs(format!("no input {index}")))
    }

    pub fn output(&self, index: usize) -> Result<&TensorParam> {
        self.outputs
            .get(index)
            .ok_or_else(|| UdoError::WrongNumOfOutputs(format!("no output {index}")))
    }

    /// Applies `f` to every f32 element of input `input`, writing output
    /// `output`. Works in place when both tensors resolve to the same address.
    pub fn unary_f32(
        &mut self,
        input: usize,
        output: usize,
        mut f: impl FnMut(f32) -> f32,
    ) -> Result<()> {
        let src = self.input(input)?;
        let dst = self.output(output)?;
        for t in [src, dst] {
            if t.data_type != DataType::FLOAT_32 {
                return Err(UdoError::InvalidArgument(format!(
                    "expected FLOAT_32 tensor, got {:?}",
                    t.data_type
                )));
            }
        }
        let len = src.element_count();
        if dst.element_count() != len {
            return Err(UdoError::WrongNumOfDimensions(format!(
                "input shape {:?} does not match output shape {:?}",
                src.curr_dims(),
                dst.curr_dims()
            )));
        }
        if len == 0 {
            return Ok(());
        }

        let src_ptr = self.address(src)?.cast::<f32>();
        let dst_ptr = match dst.payload() {
            Payload::Borrowed(_) => self.address(dst)?.cast::<f32>(),
            Payload::Owned(_) => {
                return Err(UdoError::InvalidArgument(
                    "output tensor does not alias host memory".to_string(),
                ))
            }
        };

        // SAFETY: both addresses come from the host for tensors of `len`
        // f32 elements and are checked for alignment; overlap is handled
        // below so no two live slices alias.
        unsafe {
            if src_ptr == dst_ptr {
                for v in std::slice::from_raw_parts_mut(dst_ptr, len) {
                    *v = f(*v);
                }
                return Ok(());
            }

            let bytes = len * size_of::<f32>();
            let (s, d) = (src_ptr as usize, dst_ptr as usize);
            if s < d + bytes && d < s + bytes {
                return Err(UdoError::InvalidArgument(
                    "input and output partially overlap".to_string(),
                ));
            }

            let src = std::slice::from_raw_parts(src_ptr, len);
            let dst = std::slice::from_raw_parts_mut(dst_ptr, len);
            for (o, &i) in dst.iter_mut().zip(src) {
                *o = f(i);
            }
        }
        Ok(())
    }

    fn address(&self, tensor: &TensorParam) -> Result<*mut u8> {
        let ptr = match tensor.payload() {
            Payload::Borrowed(handle) => self
                .infra
                .resolve(*handle)
                .ok_or_else(|| UdoError::InvalidArgument("tensor payload is null".to_string()))?
                .as_ptr(),
            Payload::Owned(buf) => buf.as_ptr().cast_mut(),
        };
        if ptr as usize % align_of::<f32>() != 0 {
            return Err(UdoError::InvalidArgument(format!(
                "tensor payload {ptr:p} is misaligned"
            )));
        }
        Ok(ptr)
    }
}

/// [`Operation`] that runs a [`Kernel`] over shallow copies of its I/O.
pub struct KernelOperation<K> {
    operation_type: String,
    kernel: K,
    inputs: Vec<TensorParam>,
    outputs: Vec<TensorParam>,
    params: StaticParams,
    infra: Arc<dyn Infrastructure>,
    last_execution_us: u32,
}

impl<K: Kernel> KernelOperation<K> {
    /// # Safety
    ///
    /// Every entry of `inputs` and `outputs` must satisfy
    /// [`TensorParam::from_raw`].
    pub unsafe fn new(
        operation_type: &str,
        kernel: K,
        infra: Arc<dyn Infrastructure>,
        inputs: &[UdoTensorParam],
        outputs: &[UdoTensorParam],
        params: StaticParams,
    ) -> Result<Self> {
        if inputs.is_empty() {
            return Err(UdoError::WrongNumOfInputs(format!(
                "{operation_type} created without inputs"
            )));
        }
        if outputs.is_empty() {
            return Err(UdoError::WrongNumOfOutputs(format!(
                "{operation_type} created without outputs"
            )));
        }

        Ok(Self {
            operation_type: operation_type.to_string(),
            kernel,
            inputs: shallow_copy(inputs)?,
            outputs: shallow_copy(outputs)?,
            params,
            infra,
            last_execution_us: 0,
        })
    }

    pub fn inputs(&self) -> &[TensorParam] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorParam] {
        &self.outputs
    }

    pub fn params(&self) -> &StaticParams {
        &self.params
    }
}

impl<K: Kernel> Operation for KernelOperation<K> {
    fn operation_type(&self) -> &str {
        &self.operation_type
    }

    fn execute(
        &mut self,
        blocking: bool,
        request_id: u32,
        _notify: UdoExternalNotify,
    ) -> Result<()> {
        if !blocking {
            return Err(UdoError::UnsupportedFeature(format!(
                "non-blocking execution of {} (request {request_id})",
                self.operation_type
            )));
        }
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(UdoError::InvalidArgument(format!(
                "{} has no bound inputs or outputs",
                self.operation_type
            )));
        }

        let started = Instant::now();
        let mut ctx = KernelContext::new(
            &self.inputs,
            &self.outputs,
            &self.params,
            self.infra.as_ref(),
        );
        self.kernel.compute(&mut ctx)?;
        self.last_execution_us = u32::try_from(started.elapsed().as_micros()).unwrap_or(u32::MAX);

        debug!(
            op = %self.operation_type,
            request_id,
            elapsed_us = self.last_execution_us,
            "executed"
        );
        Ok(())
    }

    unsafe fn set_io(
        &mut self,
        inputs: *const UdoTensorParam,
        outputs: *const UdoTensorParam,
    ) -> Result<()> {
        if inputs.is_null() || self.inputs.is_empty() {
            return Err(UdoError::WrongNumOfInputs(format!(
                "cannot rebind inputs of {}",
                self.operation_type
            )));
        }
        if outputs.is_null() || self.outputs.is_empty() {
            return Err(UdoError::WrongNumOfOutputs(format!(
                "cannot rebind outputs of {}",
                self.operation_type
            )));
        }

        let inputs = shallow_copy(std::slice::from_raw_parts(inputs, self.inputs.len()))?;
        let outputs = shallow_copy(std::slice::from_raw_parts(outputs, self.outputs.len()))?;
        self.inputs = inputs;
        self.outputs = outputs;
        Ok(())
    }

    fn profile(&self) -> u32 {
        self.last_execution_us
    }
}

unsafe fn shallow_copy(raw: &[UdoTensorParam]) -> Result<Vec<TensorParam>> {
    raw.iter().map(|t| TensorParam::from_raw(t, false)).collect()
}
