//! Element types a tensor record can carry.
//!
//! Each dtype is one registry entry: wire code, element width and the
//! little-endian pack/unpack pair in [`Element`]. Adding a dtype means adding
//! a variant, a registry row and an `Element` impl.

use crate::errors::ExportError;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Tensor element type. Discriminants are the on-disk codes.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32 = 1,
    I64 = 2,
}

struct DTypeEntry {
    dtype: DType,
    width: usize,
    name: &'static str,
}

const REGISTRY: &[DTypeEntry] = &[
    DTypeEntry {
        dtype: DType::F32,
        width: 4,
        name: "f32",
    },
    DTypeEntry {
        dtype: DType::I64,
        width: 8,
        name: "i64",
    },
];

impl DType {
    fn entry(self) -> &'static DTypeEntry {
        // every variant has a registry row
        REGISTRY
            .iter()
            .find(|e| e.dtype == self)
            .unwrap_or(&REGISTRY[0])
    }

    /// Wire code written as i16.
    #[inline]
    pub fn code(self) -> i16 {
        self as i16
    }

    /// Element width in bytes.
    #[inline]
    pub fn size(self) -> usize {
        self.entry().width
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn from_code(code: i16) -> Result<Self, ExportError> {
        REGISTRY
            .iter()
            .find(|e| e.dtype.code() == code)
            .map(|e| e.dtype)
            .ok_or(ExportError::UnsupportedDtype(code))
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Rust scalar that maps onto a [`DType`].
pub trait Element: Copy + Sized {
    const DTYPE: DType;

    /// Append `values` to `out` as little-endian bytes.
    fn pack(values: &[Self], out: &mut Vec<u8>);

    /// Decode little-endian bytes; `bytes.len()` is a multiple of the width.
    fn unpack(bytes: &[u8]) -> Vec<Self>;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn pack(values: &[Self], out: &mut Vec<u8>) {
        out.reserve(values.len() * 4);
        for &v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn unpack(bytes: &[u8]) -> Vec<Self> {
        bytes.chunks_exact(4).map(LittleEndian::read_f32).collect()
    }
}

impl Element for i64 {
    const DTYPE: DType = DType::I64;

    fn pack(values: &[Self], out: &mut Vec<u8>) {
        out.reserve(values.len() * 8);
        for &v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn unpack(bytes: &[u8]) -> Vec<Self> {
        bytes.chunks_exact(8).map(LittleEndian::read_i64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_widths() {
        assert_eq!(DType::F32.code(), 1);
        assert_eq!(DType::I64.code(), 2);
        assert_eq!(DType::F32.size(), 4);
        assert_eq!(DType::I64.size(), 8);
    }

    #[test]
    fn unknown_code_is_unsupported() {
        assert!(matches!(
            DType::from_code(3),
            Err(ExportError::UnsupportedDtype(3))
        ));
        assert_eq!(DType::from_code(2).unwrap(), DType::I64);
    }

    #[test]
    fn pack_unpack_i64() {
        let mut buf = Vec::new();
        i64::pack(&[-1, 0, i64::MAX], &mut buf);
        assert_eq!(buf.len(), 24);
        assert_eq!(i64::unpack(&buf), vec![-1, 0, i64::MAX]);
    }
}
