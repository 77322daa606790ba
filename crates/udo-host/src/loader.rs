//! Dynamic loading of package libraries and typed wrappers over their
//! entry points.

use std::ffi::{c_void, CStr};
use std::path::Path;
use std::ptr;

use anyhow::{Context, Result};
use libloading::Library;
use udo_core::{
    symbols, CoreType, CreateOpFactoryFn, CreateOperationFn, ErrorType, ExecuteOpFn,
    GetImpInfoFn, GetRegInfoFn, GetVersionFn, InitImplLibraryFn, InitRegLibraryFn, ProfileOpFn,
    ReleaseOpFactoryFn, ReleaseOpFn, SetOpIoFn, TerminateLibraryFn, UdoImpInfo, UdoLibVersion,
    UdoOpDefinition, UdoOpFactory, UdoOperation, UdoRegInfo, UdoTensorParam, ValidateOperationFn,
};

unsafe fn symbol<T: Copy>(lib: &Library, name: &[u8]) -> Result<T> {
    let sym = lib.get::<T>(name).with_context(|| {
        format!(
            "missing symbol {}",
            String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name))
        )
    })?;
    Ok(*sym)
}

fn open(path: &Path) -> Result<Library> {
    unsafe { Library::new(path) }.with_context(|| format!("failed to load {}", path.display()))
}

fn check(status: ErrorType, entry: &str) -> Result<()> {
    Ok(status.into_result(entry)?)
}

unsafe fn version_from(get_version: GetVersionFn) -> Result<UdoLibVersion> {
    let mut version: *mut UdoLibVersion = ptr::null_mut();
    check(get_version(&mut version), "getVersion")?;
    version.as_ref().copied().context("getVersion returned null")
}

pub struct RegLibrary {
    _lib: Library,
    init: InitRegLibraryFn,
    get_version: GetVersionFn,
    get_reg_info: GetRegInfoFn,
    validate_operation: ValidateOperationFn,
    terminate: TerminateLibraryFn,
}

impl RegLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        let lib = open(path)?;
        unsafe {
            Ok(Self {
                init: symbol(&lib, symbols::INIT_REG_LIBRARY)?,
                get_version: symbol(&lib, symbols::GET_VERSION)?,
                get_reg_info: symbol(&lib, symbols::GET_REG_INFO)?,
                validate_operation: symbol(&lib, symbols::VALIDATE_OPERATION)?,
                terminate: symbol(&lib, symbols::TERMINATE_REG_LIBRARY)?,
                _lib: lib,
            })
        }
    }

    pub fn init(&self) -> Result<()> {
        check(unsafe { (self.init)() }, "initRegLibrary")
    }

    pub fn version(&self) -> Result<UdoLibVersion> {
        unsafe { version_from(self.get_version) }
    }

    /// The descriptor stays owned by the library until [`terminate`](Self::terminate).
    pub fn reg_info(&self) -> Result<&UdoRegInfo> {
        let mut info: *mut UdoRegInfo = ptr::null_mut();
        check(unsafe { (self.get_reg_info)(&mut info) }, "getRegInfo")?;
        unsafe { info.as_ref() }.context("getRegInfo returned null")
    }

    pub fn validate(&self, definition: &mut UdoOpDefinition) -> ErrorType {
        unsafe { (self.validate_operation)(definition) }
    }

    pub fn terminate(&self) -> Result<()> {
        check(unsafe { (self.terminate)() }, "terminateRegLibrary")
    }
}

pub struct ImplLibrary {
    _lib: Library,
    init: InitImplLibraryFn,
    get_imp_info: GetImpInfoFn,
    get_version: GetVersionFn,
    create_op_factory: CreateOpFactoryFn,
    create_operation: CreateOperationFn,
    execute_op: ExecuteOpFn,
    set_op_io: SetOpIoFn,
    profile_op: ProfileOpFn,
    release_op: ReleaseOpFn,
    release_op_factory: ReleaseOpFactoryFn,
    terminate: TerminateLibraryFn,
}

impl ImplLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        let lib = open(path)?;
        unsafe {
            Ok(Self {
                init: symbol(&lib, symbols::INIT_IMPL_LIBRARY)?,
                get_imp_info: symbol(&lib, symbols::GET_IMP_INFO)?,
                get_version: symbol(&lib, symbols::GET_VERSION)?,
                create_op_factory: symbol(&lib, symbols::CREATE_OP_FACTORY)?,
                create_operation: symbol(&lib, symbols::CREATE_OPERATION)?,
                execute_op: symbol(&lib, symbols::EXECUTE_OP)?,
                set_op_io: symbol(&lib, symbols::SET_OP_IO)?,
                profile_op: symbol(&lib, symbols::PROFILE_OP)?,
                release_op: symbol(&lib, symbols::RELEASE_OP)?,
                release_op_factory: symbol(&lib, symbols::RELEASE_OP_FACTORY)?,
                terminate: symbol(&lib, symbols::TERMINATE_IMPL_LIBRARY)?,
                _lib: lib,
            })
        }
    }

    pub fn init(&self) -> Result<()> {
        check(unsafe { (self.init)(ptr::null_mut()) }, "initImplLibrary")
    }

    pub fn imp_info(&self) -> Result<&UdoImpInfo> {
        let mut info: *mut UdoImpInfo = ptr::null_mut();
        check(unsafe { (self.get_imp_info)(&mut info) }, "getImpInfo")?;
        unsafe { info.as_ref() }.context("getImpInfo returned null")
    }

    pub fn version(&self) -> Result<UdoLibVersion> {
        unsafe { version_from(self.get_version) }
    }

    /// # Safety
    ///
    /// `infrastructure` must stay valid for the lifetime of the factory and
    /// every operation created from it.
    pub unsafe fn create_op_factory(
        &self,
        core_type: CoreType,
        infrastructure: *mut c_void,
        operation_type: &CStr,
    ) -> Result<UdoOpFactory> {
        let mut factory: UdoOpFactory = ptr::null_mut();
        check(
            (self.create_op_factory)(
                core_type,
                infrastructure,
                operation_type.as_ptr(),
                0,
                ptr::null_mut(),
                &mut factory,
            ),
            "createOpFactory",
        )?;
        Ok(factory)
    }

    /// # Safety
    ///
    /// The tensors' dimension and data pointers must outlive the operation.
    pub unsafe fn create_operation(
        &self,
        factory: UdoOpFactory,
        inputs: &mut [UdoTensorParam],
        outputs: &mut [UdoTensorParam],
    ) -> Result<UdoOperation> {
        let mut operation: UdoOperation = ptr::null_mut();
        check(
            (self.create_operation)(
                factory,
                ptr::null_mut(),
                inputs.len() as u32,
                inputs.as_mut_ptr(),
                outputs.len() as u32,
                outputs.as_mut_ptr(),
                &mut operation,
            ),
            "createOperation",
        )?;
        Ok(operation)
    }

    pub fn execute(&self, operation: UdoOperation, id: u32) -> Result<()> {
        check(unsafe { (self.execute_op)(operation, true, id, None) }, "executeOp")
    }

    /// # Safety
    ///
    /// Same contract as [`create_operation`](Self::create_operation).
    pub unsafe fn set_io(
        &self,
        operation: UdoOperation,
        inputs: &mut [UdoTensorParam],
        outputs: &mut [UdoTensorParam],
    ) -> Result<()> {
        check(
            (self.set_op_io)(operation, inputs.as_mut_ptr(), outputs.as_mut_ptr()),
            "setOpIO",
        )
    }

    pub fn profile(&self, operation: UdoOperation) -> Result<u32> {
        let mut elapsed = 0;
        check(unsafe { (self.profile_op)(operation, &mut elapsed) }, "profileOp")?;
        Ok(elapsed)
    }

    pub fn release_op(&self, operation: UdoOperation) -> Result<()> {
        check(unsafe { (self.release_op)(operation) }, "releaseOp")
    }

    pub fn release_op_factory(&self, factory: UdoOpFactory) -> Result<()> {
        check(unsafe { (self.release_op_factory)(factory) }, "releaseOpFactory")
    }

    pub fn terminate(&self) -> Result<()> {
        check(unsafe { (self.terminate)() }, "terminateImplLibrary")
    }
}
