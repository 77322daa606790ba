use std::ffi::c_void;
use std::ptr;

use bytes::BytesMut;
use smallvec::SmallVec;

use crate::abi::{DataType, TensorLayout, UdoQuantizeParams, UdoTensorParam};
use crate::error::{Result, UdoError};

/// Per-axis extents. Most tensors are rank 4 or less.
pub type Dims = SmallVec<[u32; 6]>;

/// Ownership of a tensor's payload, fixed when the parameter is copied.
#[derive(Debug)]
pub enum Payload {
    /// Deep copy owned by the parameter and released with it.
    Owned(BytesMut),
    /// Alias of a host handle. Never released here.
    Borrowed(*mut c_void),
}

/// A tensor parameter copied out of a host [`UdoTensorParam`].
///
/// The dimension arrays are always owned. The payload is owned only when the
/// parameter was copied with data (static tensor parameters); runtime inputs
/// and outputs alias host memory.
#[derive(Debug)]
pub struct TensorParam {
    pub data_type: DataType,
    pub layout: TensorLayout,
    pub quantize_params: UdoQuantizeParams,
    curr_dims: Dims,
    max_dims: Dims,
    payload: Payload,
}

impl TensorParam {
    /// Copies `src`, deep-copying the payload when `copy_data` is set.
    ///
    /// Only the dimension pointers are validated. Rank and datatype
    /// consistency is the caller's business, except that a deep copy needs a
    /// known element size to size its buffer.
    ///
    /// # Safety
    ///
    /// Both dimension pointers of `src` must address `tensor_rank` readable
    /// extents. With `copy_data`, `tensor_data` must address at least
    /// `product(curr_dimensions) * element_size` readable bytes.
    pub unsafe fn from_raw(src: &UdoTensorParam, copy_data: bool) -> Result<Self> {
        if src.max_dimensions.is_null() || src.curr_dimensions.is_null() {
            return Err(UdoError::InvalidArgument(
                "provided dimensions are null".to_string(),
            ));
        }

        let rank = src.tensor_rank as usize;
        let curr_dims: Dims = std::slice::from_raw_parts(src.curr_dimensions, rank)
            .iter()
            .copied()
            .collect();
        let max_dims: Dims = std::slice::from_raw_parts(src.max_dimensions, rank)
            .iter()
            .copied()
            .collect();

        let payload = if copy_data {
            let element_size = src.data_type.element_size().ok_or_else(|| {
                UdoError::InvalidArgument(format!(
                    "cannot size payload of datatype {:?}",
                    src.data_type
                ))
            })?;
            let byte_len = payload_len(&curr_dims, element_size)?;
            if byte_len > 0 && src.tensor_data.is_null() {
                return Err(UdoError::InvalidArgument(
                    "tensor payload is null".to_string(),
                ));
            }

            let mut buf = BytesMut::with_capacity(byte_len);
            if byte_len > 0 {
                buf.extend_from_slice(std::slice::from_raw_parts(
                    src.tensor_data.cast::<u8>(),
                    byte_len,
                ));
            }
            Payload::Owned(buf)
        } else {
            Payload::Borrowed(src.tensor_data)
        };

        Ok(Self {
            data_type: src.data_type,
            layout: src.layout,
            quantize_params: src.quantize_params,
            curr_dims,
            max_dims,
            payload,
        })
    }

    /// Builds a parameter that owns `data`.
    pub fn owned(data_type: DataType, layout: TensorLayout, dims: &[u32], data: &[u8]) -> Self {
        Self {
            data_type,
            layout,
            quantize_params: UdoQuantizeParams::default(),
            curr_dims: Dims::from_slice(dims),
            max_dims: Dims::from_slice(dims),
            payload: Payload::Owned(BytesMut::from(data)),
        }
    }

    pub fn rank(&self) -> u32 {
        self.curr_dims.len() as u32
    }

    pub fn curr_dims(&self) -> &[u32] {
        &self.curr_dims
    }

    pub fn max_dims(&self) -> &[u32] {
        &self.max_dims
    }

    pub fn element_count(&self) -> usize {
        self.curr_dims.iter().map(|&d| d as usize).product()
    }

    /// Payload length implied by the current shape, `None` for unknown datatypes.
    pub fn byte_len(&self) -> Option<usize> {
        self.data_type
            .element_size()
            .and_then(|size| payload_len(&self.curr_dims, size).ok())
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.payload, Payload::Owned(_))
    }

    /// The payload handle as the host would see it.
    pub fn tensor_data(&self) -> *const c_void {
        match &self.payload {
            Payload::Owned(buf) => buf.as_ptr().cast(),
            Payload::Borrowed(handle) => handle.cast_const(),
        }
    }

    pub fn owned_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Owned(buf) => Some(&buf[..]),
            Payload::Borrowed(_) => None,
        }
    }

    pub fn owned_bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.payload {
            Payload::Owned(buf) => Some(&mut buf[..]),
            Payload::Borrowed(_) => None,
        }
    }

    /// Flat view of this parameter whose pointers borrow from `self`.
    ///
    /// The view is valid until `self` is moved, mutated or dropped.
    pub fn as_raw(&mut self) -> UdoTensorParam {
        let tensor_data = match &mut self.payload {
            Payload::Owned(buf) if buf.is_empty() => ptr::null_mut(),
            Payload::Owned(buf) => buf.as_mut_ptr().cast(),
            Payload::Borrowed(handle) => *handle,
        };
        UdoTensorParam {
            data_type: self.data_type,
            layout: self.layout,
            quantize_params: self.quantize_params,
            tensor_rank: self.rank(),
            max_dimensions: self.max_dims.as_mut_ptr(),
            curr_dimensions: self.curr_dims.as_mut_ptr(),
            tensor_data,
        }
    }
}

fn payload_len(dims: &[u32], element_size: usize) -> Result<usize> {
    dims.iter()
        .try_fold(element_size, |acc, &d| acc.checked_mul(d as usize))
        .ok_or_else(|| UdoError::InvalidArgument(format!("payload size of {dims:?} overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_f32(dims: &mut [u32], data: &mut [f32]) -> UdoTensorParam {
        UdoTensorParam {
            data_type: DataType::FLOAT_32,
            tensor_rank: dims.len() as u32,
            max_dimensions: dims.as_mut_ptr(),
            curr_dimensions: dims.as_mut_ptr(),
            tensor_data: data.as_mut_ptr().cast(),
            ..Default::default()
        }
    }

    #[test]
    fn deep_copy_round_trips_bytes() {
        let mut dims = [1u32, 4];
        let mut data = [1.0f32, 2.0, 3.0, 4.0];
        let src = raw_f32(&mut dims, &mut data);

        let copy = unsafe { TensorParam::from_raw(&src, true) }.unwrap();
        assert!(copy.is_owned());
        assert_eq!(copy.curr_dims(), &[1, 4]);
        assert_eq!(copy.byte_len(), Some(16));

        let expected: Vec<u8> = data.iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(copy.owned_bytes().unwrap(), expected.as_slice());
    }

    #[test]
    fn deep_copy_is_independent_of_source() {
        let mut dims = [4u32];
        let mut data = [1.0f32, 2.0, 3.0, 4.0];
        let src = raw_f32(&mut dims, &mut data);

        let mut copy = unsafe { TensorParam::from_raw(&src, true) }.unwrap();
        copy.owned_bytes_mut().unwrap().fill(0);
        assert_eq!(data, [1.0, 2.0, 3.0, 4.0]);
        assert_ne!(copy.tensor_data(), src.tensor_data.cast_const());

        dims[0] = 99;
        assert_eq!(copy.curr_dims(), &[4]);
    }

    #[test]
    fn shallow_copy_aliases_payload() {
        let mut dims = [2u32, 2];
        let mut data = [0.5f32; 4];
        let src = raw_f32(&mut dims, &mut data);

        let mut copy = unsafe { TensorParam::from_raw(&src, false) }.unwrap();
        assert!(!copy.is_owned());
        assert_eq!(copy.tensor_data(), src.tensor_data.cast_const());
        assert_eq!(copy.as_raw().tensor_data, src.tensor_data);
        // dimensions are still private copies
        assert_ne!(copy.as_raw().curr_dimensions, src.curr_dimensions);
    }

    #[test]
    fn null_dimensions_are_rejected() {
        let mut data = [0.0f32; 1];
        let mut dims = [1u32];
        let mut src = raw_f32(&mut dims, &mut data);
        src.max_dimensions = ptr::null_mut();

        let err = unsafe { TensorParam::from_raw(&src, false) }.unwrap_err();
        assert!(matches!(err, UdoError::InvalidArgument(_)));
    }

    #[test]
    fn shallow_copy_does_not_check_datatype() {
        let mut dims = [3u32];
        let mut data = [0.0f32; 3];
        let mut src = raw_f32(&mut dims, &mut data);
        src.data_type = DataType(0xdead);

        let copy = unsafe { TensorParam::from_raw(&src, false) }.unwrap();
        assert_eq!(copy.data_type, DataType(0xdead));
        assert_eq!(copy.byte_len(), None);

        let err = unsafe { TensorParam::from_raw(&src, true) }.unwrap_err();
        assert!(matches!(err, UdoError::InvalidArgument(_)));
    }

    #[test]
    fn deep_copy_of_empty_tensor_allocates_nothing() {
        let mut dims = [0u32, 4];
        let mut src = raw_f32(&mut dims, &mut []);
        src.tensor_data = ptr::null_mut();

        let mut copy = unsafe { TensorParam::from_raw(&src, true) }.unwrap();
        assert_eq!(copy.owned_bytes().unwrap().len(), 0);
        assert!(copy.as_raw().tensor_data.is_null());
    }

    #[test]
    fn deep_copy_of_null_payload_fails() {
        let mut dims = [2u32];
        let mut data = [0.0f32; 2];
        let mut src = raw_f32(&mut dims, &mut data);
        src.tensor_data = ptr::null_mut();

        assert!(unsafe { TensorParam::from_raw(&src, true) }.is_err());
    }

    #[test]
    fn element_size_scales_payload() {
        let mut dims = [3u32];
        let mut data = [1u8, 2, 3, 4, 5, 6];
        let src = UdoTensorParam {
            data_type: DataType::INT_16,
            tensor_rank: 1,
            max_dimensions: dims.as_mut_ptr(),
            curr_dimensions: dims.as_mut_ptr(),
            tensor_data: data.as_mut_ptr().cast(),
            ..Default::default()
        };

        let copy = unsafe { TensorParam::from_raw(&src, true) }.unwrap();
        assert_eq!(copy.owned_bytes().unwrap(), &data);
    }

    #[test]
    fn raw_view_round_trips() {
        let mut param =
            TensorParam::owned(DataType::UINT_8, TensorLayout::NCHW, &[1, 3], &[7, 8, 9]);
        let raw = param.as_raw();
        let again = unsafe { TensorParam::from_raw(&raw, true) }.unwrap();
        assert_eq!(again.layout, TensorLayout::NCHW);
        assert_eq!(again.max_dims(), &[1, 3]);
        assert_eq!(again.owned_bytes().unwrap(), &[7, 8, 9]);
    }
}
