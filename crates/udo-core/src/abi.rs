//! Flat C structures shared with the host runtime.
//!
//! Everything in this module is `#[repr(C)]` and crosses the plugin boundary
//! by pointer. Field order and widths must never change without an API
//! version bump.
//!
//! Enumerations are transparent `u32` newtypes rather than Rust enums: the
//! host may hand us any bit pattern, and a newtype keeps unknown values
//! representable instead of undefined.

use std::ffi::{c_char, c_void};
use std::fmt;

macro_rules! abi_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr,)+
        }
    ) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl $name {
            $($(#[$vmeta])* pub const $variant: Self = Self($value);)+

            /// Name of a known value, `None` when the value is outside the enumeration.
            pub fn name(self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => Some(stringify!($variant)),)+
                    _ => None,
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.name() {
                    Some(name) => f.write_str(name),
                    None => write!(f, "{}({:#x})", stringify!($name), self.0),
                }
            }
        }
    };
}

abi_enum! {
    /// Status code returned by every entry point.
    ErrorType {
        NO_ERROR = 0,
        WRONG_CORE = 1,
        MEM_ALLOC_ERROR = 2,
        WRONG_OPERATION = 3,
        WRONG_CORE_TYPE = 4,
        WRONG_NUM_OF_PARAMS = 5,
        WRONG_NUM_OF_DIMENSIONS = 6,
        WRONG_NUM_OF_INPUTS = 7,
        WRONG_NUM_OF_OUTPUTS = 8,
        PROGRAM_CACHE_NOT_FOUND = 0x100,
        INVALID_ARGUMENT = 0x200,
        UNSUPPORTED_FEATURE = 0x300,
        UNKNOWN_ERROR = 0xFFFF_FFFF,
    }
}

abi_enum! {
    /// Scalar kind of a tensor element. Values are single bits so they can be
    /// or-ed into calculation-type masks.
    DataType {
        FLOAT_16 = 0x01,
        FLOAT_32 = 0x02,
        FIXED_4 = 0x04,
        FIXED_8 = 0x08,
        FIXED_16 = 0x10,
        FIXED_32 = 0x20,
        UINT_8 = 0x100,
        UINT_16 = 0x200,
        UINT_32 = 0x400,
        INT_8 = 0x1000,
        INT_16 = 0x2000,
        INT_32 = 0x4000,
    }
}

abi_enum! {
    /// Execution backend class. Values are single bits (see [`Bitmask`]).
    CoreType {
        UNDEFINED = 0,
        CPU = 0x01,
        GPU = 0x02,
        DSP = 0x04,
    }
}

abi_enum! {
    TensorLayout {
        NHWC = 0x01,
        NCHW = 0x02,
        NDHWC = 0x03,
        GPU_OPTIMAL1 = 0x04,
        GPU_OPTIMAL2 = 0x05,
        DSP_OPTIMAL1 = 0x11,
        DSP_OPTIMAL2 = 0x12,
    }
}

abi_enum! {
    /// Discriminant of the [`UdoParamValue`] union.
    ParamType {
        SCALAR = 0,
        STRING = 1,
        TENSOR = 2,
    }
}

abi_enum! {
    QuantizationType {
        NONE = 0,
        TF = 1,
        QMN = 2,
    }
}

/// Or-ed set of [`CoreType`] or [`DataType`] bits.
pub type Bitmask = u32;

impl DataType {
    /// Bytes per element, `None` for values outside the enumeration.
    pub fn element_size(self) -> Option<usize> {
        match self {
            Self::INT_8 | Self::UINT_8 | Self::FIXED_4 | Self::FIXED_8 => Some(1),
            Self::INT_16 | Self::UINT_16 | Self::FLOAT_16 | Self::FIXED_16 => Some(2),
            Self::INT_32 | Self::UINT_32 | Self::FLOAT_32 | Self::FIXED_32 => Some(4),
            _ => None,
        }
    }
}

impl CoreType {
    pub fn is_in(self, mask: Bitmask) -> bool {
        self.0 != 0 && mask & self.0 == self.0
    }
}

impl ErrorType {
    pub fn is_ok(self) -> bool {
        self == Self::NO_ERROR
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UdoTfQuantize {
    pub min_value: f32,
    pub max_value: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UdoQmnQuantize {
    pub integer_bits: u32,
    pub fractional_bits: u32,
    pub min_value: f32,
    pub max_value: f32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union UdoQuantizeValues {
    pub tf_params: UdoTfQuantize,
    pub qmn_params: UdoQmnQuantize,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct UdoQuantizeParams {
    pub quantize_type: QuantizationType,
    pub values: UdoQuantizeValues,
}

impl Default for UdoQuantizeParams {
    fn default() -> Self {
        Self {
            quantize_type: QuantizationType::NONE,
            values: UdoQuantizeValues {
                qmn_params: UdoQmnQuantize::default(),
            },
        }
    }
}

impl fmt::Debug for UdoQuantizeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("UdoQuantizeParams");
        dbg.field("quantize_type", &self.quantize_type);
        // SAFETY: the discriminant selects the initialized member.
        unsafe {
            match self.quantize_type {
                QuantizationType::TF => dbg.field("tf_params", &self.values.tf_params),
                QuantizationType::QMN => dbg.field("qmn_params", &self.values.qmn_params),
                _ => &mut dbg,
            };
        }
        dbg.finish()
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union UdoScalarValue {
    pub float_value: f32,
    pub uint32_value: u32,
    pub int32_value: i32,
    pub uint16_value: u16,
    pub int16_value: i16,
    pub uint8_value: u8,
    pub int8_value: i8,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct UdoScalarParam {
    pub data_type: DataType,
    pub data_value: UdoScalarValue,
}

/// One tensor as the host describes it.
///
/// `max_dimensions` and `curr_dimensions` each point at `tensor_rank`
/// extents. `tensor_data` is a raw address for CPU tensors and an
/// infrastructure handle otherwise.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct UdoTensorParam {
    pub data_type: DataType,
    pub layout: TensorLayout,
    pub quantize_params: UdoQuantizeParams,
    pub tensor_rank: u32,
    pub max_dimensions: *mut u32,
    pub curr_dimensions: *mut u32,
    pub tensor_data: *mut c_void,
}

impl Default for UdoTensorParam {
    fn default() -> Self {
        Self {
            data_type: DataType::FLOAT_32,
            layout: TensorLayout::NHWC,
            quantize_params: UdoQuantizeParams::default(),
            tensor_rank: 0,
            max_dimensions: std::ptr::null_mut(),
            curr_dimensions: std::ptr::null_mut(),
            tensor_data: std::ptr::null_mut(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union UdoParamValue {
    pub scalar_param: UdoScalarParam,
    pub tensor_param: UdoTensorParam,
    pub string_param: *mut c_char,
}

/// A named static parameter; `param_type` selects the live union member.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct UdoParam {
    pub param_type: ParamType,
    pub param_name: *mut c_char,
    pub value: UdoParamValue,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdoPerCoreDatatype {
    pub core_type: CoreType,
    pub data_type: DataType,
}

/// Schema of one input or output tensor in the registration descriptor.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct UdoTensorInfo {
    pub tensor_name: *mut c_char,
    pub per_core_datatype: *mut UdoPerCoreDatatype,
    pub layout: TensorLayout,
    pub repeated: bool,
    pub is_static: bool,
}

/// Structural description of a requested operation, handed to validators.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct UdoOpDefinition {
    pub udo_core_type: CoreType,
    pub operation_type: *mut c_char,
    pub num_of_static_params: u32,
    pub static_params: *mut UdoParam,
    pub num_of_inputs: u32,
    pub inputs: *mut UdoTensorParam,
    pub num_of_outputs: u32,
    pub outputs: *mut UdoTensorParam,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UdoVersion {
    pub major: u32,
    pub minor: u32,
    pub teeny: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UdoLibVersion {
    pub api_version: UdoVersion,
    pub lib_version: UdoVersion,
}

/// Version of this ABI. Fixed at compile time; reported next to every
/// library version.
pub const API_VERSION: UdoVersion = UdoVersion {
    major: 1,
    minor: 5,
    teeny: 0,
};

impl UdoLibVersion {
    pub fn new(major: u32, minor: u32, teeny: u32) -> Self {
        Self {
            api_version: API_VERSION,
            lib_version: UdoVersion {
                major,
                minor,
                teeny,
            },
        }
    }
}

impl fmt::Display for UdoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.teeny)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdoOpCoreInfo {
    pub core_type: CoreType,
    pub operation_calculation_types: Bitmask,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct UdoOperationInfo {
    pub operation_type: *mut c_char,
    pub supported_by_cores: Bitmask,
    pub num_of_static_params: u32,
    pub static_params: *mut UdoParam,
    pub num_of_inputs: u32,
    pub input_infos: *mut UdoTensorInfo,
    pub num_of_outputs: u32,
    pub output_infos: *mut UdoTensorInfo,
    pub op_per_core_info: *mut UdoOpCoreInfo,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct UdoLibraryInfo {
    pub library_name: *mut c_char,
    pub udo_core_type: CoreType,
}

/// Top-level registration descriptor read by the host at discovery time.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct UdoRegInfo {
    pub package_name: *mut c_char,
    pub supported_core_types: Bitmask,
    pub num_of_implementation_lib: u32,
    pub implementation_lib: *mut UdoLibraryInfo,
    pub operations_string: *mut c_char,
    pub num_of_operations: u32,
    pub operations_info: *mut UdoOperationInfo,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct UdoImpInfo {
    pub udo_core_type: CoreType,
    pub package_name: *mut c_char,
    pub operations_string: *mut c_char,
    pub num_of_operations: u32,
}

/// Resolves a CPU payload handle into an address.
pub type UdoCpuGetData = unsafe extern "C" fn(handle: *mut c_void) -> *mut c_void;

/// Per-factory infrastructure the host passes for CPU operations.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct UdoCpuInfrastructure {
    pub get_data: Option<UdoCpuGetData>,
}

/// Completion callback for non-blocking execution.
pub type UdoExternalNotify = Option<unsafe extern "C" fn(id: u32)>;

/// Opaque factory handle.
pub type UdoOpFactory = *mut c_void;

/// Opaque operation handle.
pub type UdoOperation = *mut c_void;

// Registration library entry points.
pub type InitRegLibraryFn = unsafe extern "C" fn() -> ErrorType;
pub type GetRegInfoFn = unsafe extern "C" fn(reg_info: *mut *mut UdoRegInfo) -> ErrorType;
pub type ValidateOperationFn =
    unsafe extern "C" fn(definition: *mut UdoOpDefinition) -> ErrorType;

// Shared by both libraries.
pub type GetVersionFn = unsafe extern "C" fn(version: *mut *mut UdoLibVersion) -> ErrorType;
pub type TerminateLibraryFn = unsafe extern "C" fn() -> ErrorType;

// Implementation library entry points.
pub type InitImplLibraryFn = unsafe extern "C" fn(global_infrastructure: *mut c_void) -> ErrorType;
pub type GetImpInfoFn = unsafe extern "C" fn(info: *mut *mut UdoImpInfo) -> ErrorType;
pub type CreateOpFactoryFn = unsafe extern "C" fn(
    core_type: CoreType,
    infrastructure: *mut c_void,
    operation_type: *const c_char,
    num_of_static_params: u32,
    static_params: *mut UdoParam,
    op_factory: *mut UdoOpFactory,
) -> ErrorType;
pub type CreateOperationFn = unsafe extern "C" fn(
    op_factory: UdoOpFactory,
    per_op_infrastructure: *mut c_void,
    num_of_inputs: u32,
    inputs: *mut UdoTensorParam,
    num_of_outputs: u32,
    outputs: *mut UdoTensorParam,
    operation: *mut UdoOperation,
) -> ErrorType;
pub type ExecuteOpFn = unsafe extern "C" fn(
    operation: UdoOperation,
    blocking: bool,
    id: u32,
    notify: UdoExternalNotify,
) -> ErrorType;
pub type SetOpIoFn = unsafe extern "C" fn(
    operation: UdoOperation,
    inputs: *mut UdoTensorParam,
    outputs: *mut UdoTensorParam,
) -> ErrorType;
pub type ProfileOpFn =
    unsafe extern "C" fn(operation: UdoOperation, execution_time: *mut u32) -> ErrorType;
pub type ReleaseOpFn = unsafe extern "C" fn(operation: UdoOperation) -> ErrorType;
pub type ReleaseOpFactoryFn = unsafe extern "C" fn(op_factory: UdoOpFactory) -> ErrorType;

/// Exported symbol names, nul-terminated for dynamic lookup.
pub mod symbols {
    pub const INIT_REG_LIBRARY: &[u8] = b"SnpeUdo_initRegLibrary\0";
    pub const GET_REG_INFO: &[u8] = b"SnpeUdo_getRegInfo\0";
    pub const VALIDATE_OPERATION: &[u8] = b"SnpeUdo_validateOperation\0";
    pub const TERMINATE_REG_LIBRARY: &[u8] = b"SnpeUdo_terminateRegLibrary\0";

    pub const GET_VERSION: &[u8] = b"SnpeUdo_getVersion\0";

    pub const INIT_IMPL_LIBRARY: &[u8] = b"SnpeUdo_initImplLibrary\0";
    pub const GET_IMP_INFO: &[u8] = b"SnpeUdo_getImpInfo\0";
    pub const CREATE_OP_FACTORY: &[u8] = b"SnpeUdo_createOpFactory\0";
    pub const CREATE_OPERATION: &[u8] = b"SnpeUdo_createOperation\0";
    pub const EXECUTE_OP: &[u8] = b"SnpeUdo_executeOp\0";
    pub const SET_OP_IO: &[u8] = b"SnpeUdo_setOpIO\0";
    pub const PROFILE_OP: &[u8] = b"SnpeUdo_profileOp\0";
    pub const RELEASE_OP: &[u8] = b"SnpeUdo_releaseOp\0";
    pub const RELEASE_OP_FACTORY: &[u8] = b"SnpeUdo_releaseOpFactory\0";
    pub const TERMINATE_IMPL_LIBRARY: &[u8] = b"SnpeUdo_terminateImplLibrary\0";
}
