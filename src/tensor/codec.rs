//! TNSR record: one tensor.
//!
//! Layout (little-endian):
//! - `b"TNSR"`
//! - i16 rank
//! - i16 dtype code
//! - i32 × rank: shape
//! - payload, row-major, `dtype.size()` bytes per element
//! - i16 `0x55AA`

use super::{DType, Tensor};
use crate::errors::ExportError;
use crate::format::{eof, expect_end, expect_magic, expect_tag, read_vec, write_magic, write_tag};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use tracing::debug;

pub const TENSOR_TAG: &[u8; 4] = b"TNSR";

/// Write one TNSR record.
pub fn write_tensor<W: Write>(w: &mut W, tensor: &Tensor) -> Result<(), ExportError> {
    write_tag(w, TENSOR_TAG)?;
    w.write_i16::<LittleEndian>(tensor.rank() as i16)?;
    w.write_i16::<LittleEndian>(tensor.dtype().code())?;
    for &d in tensor.shape() {
        w.write_i32::<LittleEndian>(d as i32)?;
    }
    w.write_all(tensor.raw_data())?;
    write_magic(w)?;
    Ok(())
}

/// Read one TNSR record.
pub fn read_tensor<R: Read>(r: &mut R) -> Result<Tensor, ExportError> {
    expect_tag(r, TENSOR_TAG)?;

    let rank = r.read_i16::<LittleEndian>().map_err(|e| eof("rank", e))?;
    if rank < 0 {
        return Err(ExportError::malformed(format!("negative rank {}", rank)));
    }
    let dtype_code = r.read_i16::<LittleEndian>().map_err(|e| eof("dtype", e))?;
    let dtype = DType::from_code(dtype_code)?;

    let mut shape = Vec::with_capacity(rank as usize);
    for _ in 0..rank {
        let d = r.read_i32::<LittleEndian>().map_err(|e| eof("shape", e))?;
        if d < 0 {
            return Err(ExportError::malformed(format!("negative dimension {}", d)));
        }
        shape.push(d as usize);
    }

    let n_bytes = shape
        .iter()
        .try_fold(dtype.size(), |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| ExportError::malformed(format!("shape {:?} overflows", shape)))?;
    let data = read_vec(r, n_bytes, "tensor payload")?;
    expect_magic(r)?;

    Tensor::from_raw(dtype, shape, data)
}

/// Encode a tensor into a standalone TNSR record.
pub fn encode_tensor(tensor: &Tensor) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::with_capacity(12 + 4 * tensor.rank() + tensor.raw_data().len());
    write_tensor(&mut buf, tensor)?;
    Ok(buf)
}

/// Decode a buffer holding exactly one TNSR record.
pub fn decode_tensor(bytes: &[u8]) -> Result<Tensor, ExportError> {
    let mut cursor = Cursor::new(bytes);
    let tensor = read_tensor(&mut cursor)?;
    expect_end(&bytes[cursor.position() as usize..], "tensor record")?;
    Ok(tensor)
}

/// Write a sequence of back-to-back TNSR records (`*.test_tensors.bin`).
pub fn save_tensors(tensors: &[Tensor], path: impl AsRef<Path>) -> Result<(), ExportError> {
    let path = path.as_ref();
    let mut w = BufWriter::new(File::create(path)?);
    for tensor in tensors {
        write_tensor(&mut w, tensor)?;
    }
    w.flush()?;
    debug!("wrote {} tensors to {:?}", tensors.len(), path);
    Ok(())
}

/// Read TNSR records until end of file.
pub fn load_tensors(path: impl AsRef<Path>) -> Result<Vec<Tensor>, ExportError> {
    let mut r = BufReader::new(File::open(path.as_ref())?);
    let mut tensors = Vec::new();
    while !r.fill_buf()?.is_empty() {
        tensors.push(read_tensor(&mut r)?);
    }
    Ok(tensors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tensor {
        Tensor::from_f32(&[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap()
    }

    #[test]
    fn f32_2x3_layout() {
        let bytes = encode_tensor(&sample()).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"TNSR");
        expected.extend_from_slice(&2i16.to_le_bytes());
        expected.extend_from_slice(&1i16.to_le_bytes());
        expected.extend_from_slice(&2i32.to_le_bytes());
        expected.extend_from_slice(&3i32.to_le_bytes());
        for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
            expected.extend_from_slice(&v.to_le_bytes());
        }
        expected.extend_from_slice(&[0xAA, 0x55]);

        assert_eq!(bytes, expected);
    }

    #[test]
    fn i64_roundtrip() {
        let t = Tensor::from_i64(&[3], &[-5, 0, 1 << 40]).unwrap();
        let back = decode_tensor(&encode_tensor(&t).unwrap()).unwrap();
        assert_eq!(back, t);
        assert_eq!(back.as_i64_vec().unwrap(), vec![-5, 0, 1 << 40]);
    }

    #[test]
    fn bad_tag_is_malformed() {
        let mut bytes = encode_tensor(&sample()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            decode_tensor(&bytes),
            Err(ExportError::MalformedRecord(_))
        ));
    }

    #[test]
    fn bad_sentinel_is_malformed() {
        let mut bytes = encode_tensor(&sample()).unwrap();
        let n = bytes.len();
        bytes[n - 1] = 0;
        assert!(matches!(
            decode_tensor(&bytes),
            Err(ExportError::MalformedRecord(_))
        ));
    }

    #[test]
    fn short_payload_is_malformed() {
        let bytes = encode_tensor(&sample()).unwrap();
        // drop one float and the sentinel
        let cut = &bytes[..bytes.len() - 6];
        assert!(matches!(
            decode_tensor(cut),
            Err(ExportError::MalformedRecord(_))
        ));
    }

    #[test]
    fn unknown_dtype_code() {
        let mut bytes = encode_tensor(&sample()).unwrap();
        bytes[6] = 7;
        assert!(matches!(
            decode_tensor(&bytes),
            Err(ExportError::UnsupportedDtype(7))
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode_tensor(&sample()).unwrap();
        bytes.push(0);
        assert!(decode_tensor(&bytes).is_err());
    }
}
