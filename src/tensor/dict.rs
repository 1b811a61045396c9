//! TDIC record: ordered name → tensor container (`*.params.bin`).
//!
//! Layout (little-endian):
//! - `b"TDIC"`
//! - i32 entry count
//! - per entry: i16 name length, UTF-8 name, TNSR record
//! - i16 `0x55AA`

use super::codec::{read_tensor, write_tensor};
use super::Tensor;
use crate::errors::ExportError;
use crate::format::{eof, expect_end, expect_magic, expect_tag, read_vec, write_magic, write_tag};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, info};

pub const TENSOR_DICT_TAG: &[u8; 4] = b"TDIC";

/// Longest tensor name in UTF-8 bytes. Longer names are rejected, never truncated.
pub const MAX_NAME_LEN: usize = 1024;

/// Named tensors in insertion order.
///
/// Inserting an existing name replaces its tensor and keeps the position of
/// the first insertion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorDict {
    entries: IndexMap<String, Tensor>,
}

impl TensorDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the replaced tensor, if any.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        let name = name.into();
        let prev = self.entries.insert(name, tensor);
        if prev.is_some() {
            debug!("tensor dict: replaced existing entry");
        }
        prev
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<S: Into<String>> FromIterator<(S, Tensor)> for TensorDict {
    fn from_iter<I: IntoIterator<Item = (S, Tensor)>>(iter: I) -> Self {
        let mut dict = TensorDict::new();
        for (name, tensor) in iter {
            dict.insert(name, tensor);
        }
        dict
    }
}

fn check_name(name: &str) -> Result<(), ExportError> {
    if name.len() > MAX_NAME_LEN {
        return Err(ExportError::NameTooLong {
            len: name.len(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

/// Write one TDIC record. Names are validated before anything is written.
pub fn write_tensor_dict<W: Write>(w: &mut W, dict: &TensorDict) -> Result<(), ExportError> {
    for name in dict.names() {
        check_name(name)?;
    }
    if dict.len() > i32::MAX as usize {
        return Err(ExportError::malformed(format!(
            "{} entries do not fit in i32",
            dict.len()
        )));
    }

    write_tag(w, TENSOR_DICT_TAG)?;
    w.write_i32::<LittleEndian>(dict.len() as i32)?;
    for (name, tensor) in dict.iter() {
        let bytes = name.as_bytes();
        w.write_i16::<LittleEndian>(bytes.len() as i16)?;
        w.write_all(bytes)?;
        write_tensor(w, tensor)?;
    }
    write_magic(w)?;
    Ok(())
}

/// Read one TDIC record.
pub fn read_tensor_dict<R: Read>(r: &mut R) -> Result<TensorDict, ExportError> {
    expect_tag(r, TENSOR_DICT_TAG)?;
    let count = r.read_i32::<LittleEndian>().map_err(|e| eof("entry count", e))?;
    if count < 0 {
        return Err(ExportError::malformed(format!(
            "negative entry count {}",
            count
        )));
    }

    let mut dict = TensorDict::new();
    for _ in 0..count {
        let name_len = r.read_i16::<LittleEndian>().map_err(|e| eof("name length", e))?;
        if name_len < 0 || name_len as usize > MAX_NAME_LEN {
            return Err(ExportError::malformed(format!(
                "invalid name length {}",
                name_len
            )));
        }
        let name_bytes = read_vec(r, name_len as usize, "tensor name")?;
        let name = String::from_utf8(name_bytes)
            .map_err(|_| ExportError::malformed("tensor name is not valid UTF-8"))?;
        let tensor = read_tensor(r)?;
        dict.insert(name, tensor);
    }
    expect_magic(r)?;
    Ok(dict)
}

pub fn encode_tensor_dict(dict: &TensorDict) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    write_tensor_dict(&mut buf, dict)?;
    Ok(buf)
}

/// Decode a buffer holding exactly one TDIC record.
pub fn decode_tensor_dict(bytes: &[u8]) -> Result<TensorDict, ExportError> {
    let mut cursor = Cursor::new(bytes);
    let dict = read_tensor_dict(&mut cursor)?;
    expect_end(&bytes[cursor.position() as usize..], "tensor dict record")?;
    Ok(dict)
}

/// Save a tensor dict as `*.params.bin`. Names are checked before the file is created.
pub fn save_tensor_dict(dict: &TensorDict, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let path = path.as_ref();
    for name in dict.names() {
        check_name(name)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    write_tensor_dict(&mut w, dict)?;
    w.flush()?;
    info!("wrote {} tensors to {:?}", dict.len(), path);
    Ok(())
}

pub fn load_tensor_dict(path: impl AsRef<Path>) -> Result<TensorDict, ExportError> {
    let mut r = BufReader::new(File::open(path.as_ref())?);
    read_tensor_dict(&mut r)
}
