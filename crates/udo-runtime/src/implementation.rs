use std::collections::HashMap;
use std::ffi::{c_void, CString};
use std::sync::Arc;

use tracing::debug;
use udo_core::{
    CoreType, CpuInfrastructure, Infrastructure, OpDefinition, Operation, Result, UdoError,
    UdoImpInfo, UdoLibVersion, UdoParam, UdoTensorParam,
};

/// Registry of operation definitions for one core type.
pub struct ImplementationLibrary {
    core_type: CoreType,
    package_name: CString,
    version: UdoLibVersion,
    definitions: HashMap<String, Arc<dyn OpDefinition>>,
    order: Vec<String>,
    operations_string: CString,
    info: UdoImpInfo,
}

// SAFETY: the raw pointers in `info` only ever point into `package_name` and
// `operations_string`, which move with the library.
unsafe impl Send for ImplementationLibrary {}

impl ImplementationLibrary {
    pub fn new(core_type: CoreType, package_name: &str) -> Result<Self> {
        let package_name = to_c_string(package_name, "package name")?;
        Ok(Self {
            core_type,
            package_name,
            version: UdoLibVersion::default(),
            definitions: HashMap::new(),
            order: Vec::new(),
            operations_string: CString::default(),
            info: UdoImpInfo {
                udo_core_type: core_type,
                package_name: std::ptr::null_mut(),
                operations_string: std::ptr::null_mut(),
                num_of_operations: 0,
            },
        })
    }

    pub fn core_type(&self) -> CoreType {
        self.core_type
    }

    pub fn package_name(&self) -> &str {
        self.package_name.to_str().unwrap_or_default()
    }

    pub fn set_version(&mut self, major: u32, minor: u32, teeny: u32) {
        self.version = UdoLibVersion::new(major, minor, teeny);
    }

    pub fn version(&self) -> &UdoLibVersion {
        &self.version
    }

    /// Version struct the host may read until the library is torn down.
    pub fn version_mut(&mut self) -> &mut UdoLibVersion {
        &mut self.version
    }

    /// Operation types in registration order.
    pub fn operation_types(&self) -> &[String] {
        &self.order
    }

    pub fn definition(&self, operation_type: &str) -> Option<&Arc<dyn OpDefinition>> {
        self.definitions.get(operation_type)
    }

    /// Registers `definition` under its operation type. A second definition
    /// for the same type is rejected and the first one kept.
    pub fn register_op_definition(&mut self, definition: Arc<dyn OpDefinition>) -> Result<()> {
        let name = definition.operation_type().to_string();
        if self.definitions.contains_key(&name) {
            return Err(UdoError::WrongOperation(format!(
                "operation {name} is already registered"
            )));
        }
        to_c_string(&name, "operation type")?;

        debug!(op = %name, package = %self.package_name(), "registered op definition");
        self.definitions.insert(name.clone(), definition);
        self.order.push(name);
        Ok(())
    }

    /// Binds a definition to an infrastructure and a static-parameter array.
    ///
    /// The parameter array is not copied: the host keeps it alive for the
    /// factory's lifetime.
    ///
    /// # Safety
    ///
    /// `infrastructure` must be null or valid for `core_type`.
    /// `static_params` must be null or address `num_of_static_params`
    /// parameters that outlive the factory.
    pub unsafe fn create_op_factory(
        &self,
        core_type: CoreType,
        infrastructure: *mut c_void,
        operation_type: &str,
        num_of_static_params: u32,
        static_params: *const UdoParam,
    ) -> Result<OpFactory> {
        if core_type != self.core_type {
            return Err(UdoError::WrongCoreType(format!(
                "library serves {:?}, factory requested for {core_type:?}",
                self.core_type
            )));
        }
        let definition = self.definitions.get(operation_type).ok_or_else(|| {
            UdoError::WrongOperation(format!("no definition for operation {operation_type}"))
        })?;
        if num_of_static_params > 0 && static_params.is_null() {
            return Err(UdoError::InvalidArgument(format!(
                "{num_of_static_params} static params given as null"
            )));
        }

        let infra = infrastructure_for(core_type, infrastructure)?;
        debug!(op = operation_type, num_of_static_params, "created op factory");
        Ok(OpFactory {
            definition: Arc::clone(definition),
            infra,
            static_params,
            num_of_static_params,
        })
    }

    /// Refreshes and returns the implementation summary. The returned struct
    /// points into this library and stays valid until the next registration.
    pub fn implementation_info(&mut self) -> Result<&mut UdoImpInfo> {
        self.operations_string = to_c_string(&self.order.join(" "), "operations string")?;
        self.info = UdoImpInfo {
            udo_core_type: self.core_type,
            package_name: self.package_name.as_ptr().cast_mut(),
            operations_string: self.operations_string.as_ptr().cast_mut(),
            num_of_operations: self.order.len() as u32,
        };
        Ok(&mut self.info)
    }
}

/// A definition bound to one infrastructure and static-parameter set.
///
/// Operations created here share the definition and infrastructure through
/// `Arc`s, so releasing the factory never invalidates them.
pub struct OpFactory {
    definition: Arc<dyn OpDefinition>,
    infra: Option<Arc<dyn Infrastructure>>,
    static_params: *const UdoParam,
    num_of_static_params: u32,
}

impl OpFactory {
    pub fn operation_type(&self) -> &str {
        self.definition.operation_type()
    }

    pub fn num_of_static_params(&self) -> u32 {
        self.num_of_static_params
    }

    /// # Safety
    ///
    /// The static parameters given at factory creation must still be alive,
    /// and the tensor descriptions must be valid for a shallow copy.
    pub unsafe fn create_operation(
        &self,
        inputs: &[UdoTensorParam],
        outputs: &[UdoTensorParam],
    ) -> Result<OperationHandle> {
        let static_params: &[UdoParam] = if self.num_of_static_params == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(self.static_params, self.num_of_static_params as usize)
        };
        let operation =
            self.definition
                .create_operation(self.infra.clone(), inputs, outputs, static_params)?;
        Ok(OperationHandle { operation })
    }
}

/// What the host's operation handle points at.
pub struct OperationHandle {
    operation: Box<dyn Operation>,
}

impl OperationHandle {
    pub fn operation(&self) -> &dyn Operation {
        self.operation.as_ref()
    }

    pub fn operation_mut(&mut self) -> &mut dyn Operation {
        self.operation.as_mut()
    }
}

unsafe fn infrastructure_for(
    core_type: CoreType,
    raw: *mut c_void,
) -> Result<Option<Arc<dyn Infrastructure>>> {
    if raw.is_null() {
        return Ok(None);
    }
    match core_type {
        CoreType::CPU => Ok(Some(Arc::new(CpuInfrastructure::from_raw(raw)?))),
        other => Err(UdoError::UnsupportedFeature(format!(
            "no infrastructure support for {other:?}"
        ))),
    }
}

pub(crate) fn to_c_string(value: &str, what: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| UdoError::InvalidArgument(format!("{what} {value:?} contains a nul byte")))
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use udo_core::{Kernel, KernelContext, KernelOpDefinition, StaticParams, UdoCpuInfrastructure};

    use super::*;

    struct Identity;

    impl Kernel for Identity {
        fn compute(&mut self, ctx: &mut KernelContext<'_>) -> Result<()> {
            ctx.unary_f32(0, 0, |x| x)
        }
    }

    fn identity(name: &str) -> Arc<dyn OpDefinition> {
        Arc::new(KernelOpDefinition::new(name, 1, 1, |_: &StaticParams| Ok(Identity)))
    }

    fn library(ops: &[&str]) -> ImplementationLibrary {
        let mut lib = ImplementationLibrary::new(CoreType::CPU, "Test").unwrap();
        for op in ops {
            lib.register_op_definition(identity(op)).unwrap();
        }
        lib
    }

    #[test]
    fn duplicate_registration_keeps_original() {
        let mut lib = library(&["Identity"]);
        let original = Arc::clone(lib.definition("Identity").unwrap());

        let err = lib.register_op_definition(identity("Identity")).unwrap_err();
        assert!(matches!(err, UdoError::WrongOperation(_)));
        assert!(Arc::ptr_eq(lib.definition("Identity").unwrap(), &original));
        assert_eq!(lib.operation_types(), ["Identity"]);
    }

    #[test]
    fn implementation_info_lists_operations_in_order() {
        let mut lib = library(&["A", "B", "C"]);
        let info = lib.implementation_info().unwrap();

        assert_eq!(info.num_of_operations, 3);
        assert_eq!(info.udo_core_type, CoreType::CPU);
        let ops = unsafe { CStr::from_ptr(info.operations_string) };
        assert_eq!(ops.to_str().unwrap(), "A B C");
        let package = unsafe { CStr::from_ptr(info.package_name) };
        assert_eq!(package.to_str().unwrap(), "Test");
    }

    #[test]
    fn implementation_info_tracks_new_registrations() {
        let mut lib = library(&["A"]);
        assert_eq!(lib.implementation_info().unwrap().num_of_operations, 1);

        lib.register_op_definition(identity("B")).unwrap();
        let info = lib.implementation_info().unwrap();
        assert_eq!(info.num_of_operations, 2);
        let ops = unsafe { CStr::from_ptr(info.operations_string) };
        assert_eq!(ops.to_str().unwrap(), "A B");
    }

    #[test]
    fn unknown_operation_has_no_factory() {
        let lib = library(&["Identity"]);
        let err = unsafe {
            lib.create_op_factory(CoreType::CPU, std::ptr::null_mut(), "Bogus", 0, std::ptr::null())
        }
        .err()
        .unwrap();
        assert!(matches!(err, UdoError::WrongOperation(_)));
    }

    #[test]
    fn factory_core_type_must_match() {
        let lib = library(&["Identity"]);
        let (infra, params) = (std::ptr::null_mut(), std::ptr::null());
        let err = unsafe { lib.create_op_factory(CoreType::DSP, infra, "Identity", 0, params) }
            .err()
            .unwrap();
        assert!(matches!(err, UdoError::WrongCoreType(_)));
    }

    #[test]
    fn null_static_params_with_count_are_rejected() {
        let lib = library(&["Identity"]);
        let (infra, params) = (std::ptr::null_mut(), std::ptr::null());
        let err = unsafe { lib.create_op_factory(CoreType::CPU, infra, "Identity", 2, params) }
            .err()
            .unwrap();
        assert!(matches!(err, UdoError::InvalidArgument(_)));
    }

    #[test]
    fn operations_outlive_their_factory() {
        let lib = library(&["Identity"]);
        let mut infra = UdoCpuInfrastructure { get_data: None };
        let factory = unsafe {
            lib.create_op_factory(
                CoreType::CPU,
                std::ptr::addr_of_mut!(infra).cast(),
                "Identity",
                0,
                std::ptr::null(),
            )
        }
        .unwrap();
        assert_eq!(factory.operation_type(), "Identity");

        let mut in_dims = [1u32, 4];
        let mut out_dims = [1u32, 4];
        let mut input = [1.0f32, 2.0, 3.0, 4.0];
        let mut output = [0.0f32; 4];
        let tensor = |dims: &mut [u32], data: &mut [f32]| UdoTensorParam {
            tensor_rank: dims.len() as u32,
            max_dimensions: dims.as_mut_ptr(),
            curr_dimensions: dims.as_mut_ptr(),
            tensor_data: data.as_mut_ptr().cast(),
            ..Default::default()
        };
        let inputs = [tensor(&mut in_dims, &mut input)];
        let outputs = [tensor(&mut out_dims, &mut output)];

        let mut handle = unsafe { factory.create_operation(&inputs, &outputs) }.unwrap();
        drop(factory);
        drop(lib);

        handle.operation_mut().execute(true, 0, None).unwrap();
        assert_eq!(output, [1.0, 2.0, 3.0, 4.0]);
        let _elapsed = handle.operation().profile();
    }
}
