//! Framing primitives shared by the TNSR, TDIC and LLsp records.
//!
//! Every record starts with a 4-byte ASCII tag and carries one or more
//! `0x55AA` sentinels (little-endian i16) used to detect corruption on read.

use crate::errors::ExportError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Sentinel written after headers and at the end of every record.
pub const MAGIC_NUMBER: i16 = 0x55AA;

pub(crate) fn write_tag<W: Write>(w: &mut W, tag: &[u8; 4]) -> io::Result<()> {
    w.write_all(tag)
}

pub(crate) fn write_magic<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_i16::<LittleEndian>(MAGIC_NUMBER)
}

pub(crate) fn expect_tag<R: Read>(r: &mut R, tag: &[u8; 4]) -> Result<(), ExportError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf, "record tag")?;
    if &buf != tag {
        return Err(ExportError::malformed(format!(
            "bad header: expected {:?}, got {:?}",
            String::from_utf8_lossy(tag),
            String::from_utf8_lossy(&buf)
        )));
    }
    Ok(())
}

pub(crate) fn expect_magic<R: Read>(r: &mut R) -> Result<(), ExportError> {
    let magic = r.read_i16::<LittleEndian>().map_err(|e| eof("sentinel", e))?;
    if magic != MAGIC_NUMBER {
        return Err(ExportError::malformed(format!(
            "bad sentinel: expected 0x{:04x}, got 0x{:04x}",
            MAGIC_NUMBER, magic as u16
        )));
    }
    Ok(())
}

pub(crate) fn read_exact<R: Read>(r: &mut R, buf: &mut [u8], what: &str) -> Result<(), ExportError> {
    r.read_exact(buf).map_err(|e| eof(what, e))
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
pub(crate) fn read_vec<R: Read>(r: &mut R, len: usize, what: &str) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(ExportError::malformed(format!(
            "{}: expected {} bytes, got {}",
            what,
            len,
            buf.len()
        )));
    }
    Ok(buf)
}

/// Truncated input is a framing problem, not an I/O failure.
pub(crate) fn eof(what: &str, e: io::Error) -> ExportError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ExportError::malformed(format!("truncated {}", what))
    } else {
        ExportError::Io(e)
    }
}

/// Error if anything follows a complete record in a single-record buffer.
pub(crate) fn expect_end(rest: &[u8], what: &str) -> Result<(), ExportError> {
    if !rest.is_empty() {
        return Err(ExportError::malformed(format!(
            "{} trailing bytes after {}",
            rest.len(),
            what
        )));
    }
    Ok(())
}
