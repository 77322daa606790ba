use udo_core::{c_str, CoreType, Result, UdoError, UdoOpDefinition, UdoParam, UdoTensorParam};

/// Checked view of a host [`UdoOpDefinition`] handed to validators.
///
/// The array accessors read host memory, so a descriptor must not outlive the
/// call that received the definition.
pub struct OperationDescriptor {
    raw: UdoOpDefinition,
    operation_type: String,
}

impl OperationDescriptor {
    /// # Safety
    ///
    /// `raw` must be null or point at a definition whose operation type is a
    /// nul-terminated string and whose non-null arrays hold the advertised
    /// number of entries, all outliving the descriptor.
    pub unsafe fn from_raw(raw: *const UdoOpDefinition) -> Result<Self> {
        let raw = *raw
            .as_ref()
            .ok_or_else(|| UdoError::InvalidArgument("operation definition is null".to_string()))?;
        let operation_type = c_str(raw.operation_type, "operation type")?.to_string();
        Ok(Self {
            raw,
            operation_type,
        })
    }

    pub fn operation_type(&self) -> &str {
        &self.operation_type
    }

    pub fn core_type(&self) -> CoreType {
        self.raw.udo_core_type
    }

    pub fn num_of_static_params(&self) -> u32 {
        self.raw.num_of_static_params
    }

    pub fn num_of_inputs(&self) -> u32 {
        self.raw.num_of_inputs
    }

    pub fn num_of_outputs(&self) -> u32 {
        self.raw.num_of_outputs
    }

    pub fn static_params(&self) -> &[UdoParam] {
        // SAFETY: from_raw contract.
        unsafe { raw_slice(self.raw.static_params, self.raw.num_of_static_params) }
    }

    pub fn inputs(&self) -> &[UdoTensorParam] {
        // SAFETY: from_raw contract.
        unsafe { raw_slice(self.raw.inputs, self.raw.num_of_inputs) }
    }

    pub fn outputs(&self) -> &[UdoTensorParam] {
        // SAFETY: from_raw contract.
        unsafe { raw_slice(self.raw.outputs, self.raw.num_of_outputs) }
    }
}

unsafe fn raw_slice<'a, T>(ptr: *const T, len: u32) -> &'a [T] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len as usize)
    }
}

/// Structural check for one (operation type, core type) pair.
pub trait ValidationFunction: Send {
    fn validate(&self, op: &OperationDescriptor) -> Result<()>;
}

impl<F> ValidationFunction for F
where
    F: Fn(&OperationDescriptor) -> Result<()> + Send,
{
    fn validate(&self, op: &OperationDescriptor) -> Result<()> {
        self(op)
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;

    use super::*;

    fn definition(name: &CString, core: CoreType, inputs: u32) -> UdoOpDefinition {
        UdoOpDefinition {
            udo_core_type: core,
            operation_type: name.as_ptr().cast_mut(),
            num_of_static_params: 0,
            static_params: std::ptr::null_mut(),
            num_of_inputs: inputs,
            inputs: std::ptr::null_mut(),
            num_of_outputs: 0,
            outputs: std::ptr::null_mut(),
        }
    }

    #[test]
    fn reads_definition_fields() {
        let name = CString::new("Selu").unwrap();
        let raw = definition(&name, CoreType::CPU, 1);
        let op = unsafe { OperationDescriptor::from_raw(&raw) }.unwrap();

        assert_eq!(op.operation_type(), "Selu");
        assert_eq!(op.core_type(), CoreType::CPU);
        assert_eq!(op.num_of_inputs(), 1);
        // null arrays read as empty whatever the count says
        assert!(op.inputs().is_empty());
        assert!(op.static_params().is_empty());
    }

    #[test]
    fn null_definition_is_invalid() {
        let err = unsafe { OperationDescriptor::from_raw(std::ptr::null()) }
            .err()
            .unwrap();
        assert!(matches!(err, UdoError::InvalidArgument(_)));
    }

    #[test]
    fn closures_are_validation_functions() {
        let check = |op: &OperationDescriptor| {
            if op.num_of_inputs() == 1 {
                Ok(())
            } else {
                Err(UdoError::WrongNumOfInputs("expected one input".to_string()))
            }
        };
        let boxed: Box<dyn ValidationFunction> = Box::new(check);

        let name = CString::new("Selu").unwrap();
        let good = definition(&name, CoreType::CPU, 1);
        let bad = definition(&name, CoreType::CPU, 2);
        assert!(boxed
            .validate(&unsafe { OperationDescriptor::from_raw(&good) }.unwrap())
            .is_ok());
        assert!(boxed
            .validate(&unsafe { OperationDescriptor::from_raw(&bad) }.unwrap())
            .is_err());
    }
}
