use std::collections::HashMap;
use std::ffi::{c_char, CStr};

use crate::abi::{DataType, ParamType, UdoParam, UdoScalarParam};
use crate::error::{Result, UdoError};
use crate::tensor::TensorParam;

/// Decoded scalar parameter value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    F32(f32),
    U32(u32),
    I32(i32),
    U16(u16),
    I16(i16),
    U8(u8),
    I8(i8),
}

impl Scalar {
    /// Reads the union member selected by the scalar's datatype.
    pub fn from_raw(raw: &UdoScalarParam) -> Result<Self> {
        // SAFETY: each arm reads the member its datatype selects; all members
        // are plain integers or floats, valid for any bit pattern.
        let value = unsafe {
            match raw.data_type {
                DataType::FLOAT_32 | DataType::FLOAT_16 => Self::F32(raw.data_value.float_value),
                DataType::UINT_32 | DataType::FIXED_32 => Self::U32(raw.data_value.uint32_value),
                DataType::INT_32 => Self::I32(raw.data_value.int32_value),
                DataType::UINT_16 | DataType::FIXED_16 => Self::U16(raw.data_value.uint16_value),
                DataType::INT_16 => Self::I16(raw.data_value.int16_value),
                DataType::UINT_8 | DataType::FIXED_8 | DataType::FIXED_4 => {
                    Self::U8(raw.data_value.uint8_value)
                }
                DataType::INT_8 => Self::I8(raw.data_value.int8_value),
                other => {
                    return Err(UdoError::InvalidArgument(format!(
                        "unsupported scalar datatype {other:?}"
                    )))
                }
            }
        };
        Ok(value)
    }

    pub fn as_f32(self) -> f32 {
        match self {
            Self::F32(v) => v,
            Self::U32(v) => v as f32,
            Self::I32(v) => v as f32,
            Self::U16(v) => v as f32,
            Self::I16(v) => v as f32,
            Self::U8(v) => v as f32,
            Self::I8(v) => v as f32,
        }
    }
}

#[derive(Debug)]
pub enum ParamValue {
    Scalar(Scalar),
    String(String),
    Tensor(TensorParam),
}

/// Static parameters of one operation, keyed by name.
#[derive(Debug, Default)]
pub struct StaticParams {
    params: HashMap<String, ParamValue>,
}

impl StaticParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies host parameters. Tensor parameters are deep-copied with their
    /// payload; strings are copied into owned storage.
    ///
    /// # Safety
    ///
    /// Every entry of `params` must have a valid nul-terminated name and the
    /// union member selected by its `param_type` must be valid as described on
    /// [`TensorParam::from_raw`].
    pub unsafe fn from_raw(params: &[UdoParam]) -> Result<Self> {
        let mut out = Self::new();
        for param in params {
            let name = c_str(param.param_name, "param name")?;
            let value = match param.param_type {
                ParamType::SCALAR => {
                    ParamValue::Scalar(Scalar::from_raw(&param.value.scalar_param)?)
                }
                ParamType::STRING => {
                    ParamValue::String(c_str(param.value.string_param, "string param")?.to_string())
                }
                ParamType::TENSOR => {
                    ParamValue::Tensor(TensorParam::from_raw(&param.value.tensor_param, true)?)
                }
                other => {
                    return Err(UdoError::InvalidArgument(format!(
                        "unknown param type {other:?} for param {name}"
                    )))
                }
            };
            out.insert(name, value)?;
        }
        Ok(out)
    }

    /// Adds a parameter. Names are unique within one operation.
    pub fn insert(&mut self, name: &str, value: ParamValue) -> Result<()> {
        if self.params.contains_key(name) {
            return Err(UdoError::InvalidArgument(format!(
                "static param {name} given more than once"
            )));
        }
        self.params.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<Scalar> {
        match self.params.get(name) {
            Some(ParamValue::Scalar(s)) => Some(*s),
            _ => None,
        }
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.params.get(name) {
            Some(ParamValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn tensor(&self, name: &str) -> Option<&TensorParam> {
        match self.params.get(name) {
            Some(ParamValue::Tensor(t)) => Some(t),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }
}

/// Borrows a host C string as UTF-8.
///
/// # Safety
///
/// `ptr` must be null or point at a nul-terminated string that outlives `'a`.
pub unsafe fn c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(UdoError::InvalidArgument(format!("{what} is null")));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| UdoError::InvalidArgument(format!("{what} is not valid UTF-8")))
}
