//! Dense tensors and their binary records (TNSR, TDIC).

pub mod codec;
pub mod dict;
pub mod dtype;

pub use codec::{
    decode_tensor, encode_tensor, load_tensors, read_tensor, save_tensors, write_tensor,
    TENSOR_TAG,
};
pub use dict::{
    decode_tensor_dict, encode_tensor_dict, load_tensor_dict, read_tensor_dict, save_tensor_dict,
    write_tensor_dict, TensorDict, MAX_NAME_LEN, TENSOR_DICT_TAG,
};
pub use dtype::{DType, Element};

use crate::errors::ExportError;

/// Row-major N-dimensional array stored as little-endian bytes.
///
/// Invariant: `data.len() == dtype.size() * shape.iter().product()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl Tensor {
    /// Build from raw little-endian payload. Checks rank, dimension range and
    /// payload length against the shape.
    pub fn from_raw(dtype: DType, shape: Vec<usize>, data: Vec<u8>) -> Result<Self, ExportError> {
        let expected = payload_len(dtype, &shape)?;
        if data.len() != expected {
            return Err(ExportError::malformed(format!(
                "payload length {} does not match shape {:?} ({} bytes for {})",
                data.len(),
                shape,
                expected,
                dtype
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Build from typed elements in row-major order.
    pub fn from_slice<T: Element>(shape: &[usize], values: &[T]) -> Result<Self, ExportError> {
        let mut data = Vec::new();
        T::pack(values, &mut data);
        Self::from_raw(T::DTYPE, shape.to_vec(), data)
    }

    pub fn from_f32(shape: &[usize], values: &[f32]) -> Result<Self, ExportError> {
        Self::from_slice(shape, values)
    }

    pub fn from_i64(shape: &[usize], values: &[i64]) -> Result<Self, ExportError> {
        Self::from_slice(shape, values)
    }

    /// All-zero tensor.
    pub fn zeros(dtype: DType, shape: &[usize]) -> Result<Self, ExportError> {
        let len = payload_len(dtype, shape)?;
        Self::from_raw(dtype, shape.to_vec(), vec![0u8; len])
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Raw little-endian payload.
    #[inline]
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    /// Typed copy of the payload; errors if `T` is not this tensor's dtype.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, ExportError> {
        if T::DTYPE != self.dtype {
            return Err(ExportError::malformed(format!(
                "tensor holds {}, requested {}",
                self.dtype,
                T::DTYPE
            )));
        }
        Ok(T::unpack(&self.data))
    }

    pub fn as_f32_vec(&self) -> Result<Vec<f32>, ExportError> {
        self.to_vec::<f32>()
    }

    pub fn as_i64_vec(&self) -> Result<Vec<i64>, ExportError> {
        self.to_vec::<i64>()
    }
}

/// Byte size of a payload, rejecting shapes the record header cannot carry.
fn payload_len(dtype: DType, shape: &[usize]) -> Result<usize, ExportError> {
    if shape.len() > i16::MAX as usize {
        return Err(ExportError::malformed(format!(
            "rank {} does not fit in i16",
            shape.len()
        )));
    }
    let mut numel: usize = 1;
    for &d in shape {
        if d > i32::MAX as usize {
            return Err(ExportError::malformed(format!(
                "dimension {} does not fit in i32",
                d
            )));
        }
        numel = numel
            .checked_mul(d)
            .ok_or_else(|| ExportError::malformed(format!("shape {:?} overflows", shape)))?;
    }
    numel
        .checked_mul(dtype.size())
        .ok_or_else(|| ExportError::malformed(format!("shape {:?} overflows", shape)))
}
