//! LLsp vocabulary file (`*.tokenizer.bin`) and its text dump.
//!
//! Layout (little-endian):
//! - `b"LLsp"`
//! - i32 token count
//! - i16 `0x55AA`
//! - per token: u8 flags, u8 piece length, piece, u8 display length,
//!   display (UTF-8), f32 weight
//! - i16 `0x55AA`

use super::builder::Vocabulary;
use super::token::{Token, TokenFlags};
use crate::errors::ExportError;
use crate::format::{eof, expect_end, expect_magic, expect_tag, read_vec, write_magic, write_tag};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use tracing::info;

pub const VOCAB_TAG: &[u8; 4] = b"LLsp";

/// Longest piece or display string a u8 length prefix can frame.
pub const MAX_FIELD_LEN: usize = 255;

pub const TRUNCATED_SUFFIX: &str = "...(truncated)";

/// Shorten a display string to at most 255 UTF-8 bytes.
///
/// Longer strings lose trailing characters (never partial ones) and gain
/// [`TRUNCATED_SUFFIX`]. Applying it twice changes nothing.
pub fn truncate_display(s: &str) -> Cow<'_, str> {
    if s.len() <= MAX_FIELD_LEN {
        return Cow::Borrowed(s);
    }
    let budget = MAX_FIELD_LEN - TRUNCATED_SUFFIX.len();
    let end = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= budget)
        .last()
        .unwrap_or(0);
    Cow::Owned(format!("{}{}", &s[..end], TRUNCATED_SUFFIX))
}

/// Caller guarantees `token.piece.len() <= MAX_FIELD_LEN`.
fn write_token<W: Write>(w: &mut W, token: &Token) -> Result<(), ExportError> {
    let display = truncate_display(&token.piece_display);

    w.write_u8(token.flags.bits())?;
    w.write_u8(token.piece.len() as u8)?;
    w.write_all(&token.piece)?;
    w.write_u8(display.len() as u8)?;
    w.write_all(display.as_bytes())?;
    w.write_f32::<LittleEndian>(token.weight)?;
    Ok(())
}

fn read_token<R: Read>(r: &mut R, id: u32) -> Result<Token, ExportError> {
    let flags = TokenFlags::from_bits_retain(r.read_u8().map_err(|e| eof("token flags", e))?);
    let piece_len = r.read_u8().map_err(|e| eof("piece length", e))?;
    let piece = read_vec(r, piece_len as usize, "piece")?;
    if flags.contains(TokenFlags::BYTE) && piece.len() != 1 {
        return Err(ExportError::malformed(format!(
            "byte token {} has {} piece bytes",
            id,
            piece.len()
        )));
    }
    let display_len = r.read_u8().map_err(|e| eof("display length", e))?;
    let display = read_vec(r, display_len as usize, "display")?;
    let piece_display = String::from_utf8(display)
        .map_err(|_| ExportError::malformed(format!("token {} display is not UTF-8", id)))?;
    let weight = r.read_f32::<LittleEndian>().map_err(|e| eof("weight", e))?;
    Ok(Token::new(id, flags, piece, piece_display, weight))
}

/// Write one LLsp record. Every piece is checked before anything is written.
pub fn write_vocabulary<W: Write>(w: &mut W, vocab: &Vocabulary) -> Result<(), ExportError> {
    if let Some(t) = vocab.iter().find(|t| t.piece.len() > MAX_FIELD_LEN) {
        return Err(ExportError::malformed(format!(
            "token {} piece is {} bytes (max {})",
            t.id,
            t.piece.len(),
            MAX_FIELD_LEN
        )));
    }
    if vocab.len() > i32::MAX as usize {
        return Err(ExportError::malformed("vocabulary too large"));
    }

    write_tag(w, VOCAB_TAG)?;
    w.write_i32::<LittleEndian>(vocab.len() as i32)?;
    write_magic(w)?;
    for token in vocab.iter() {
        write_token(w, token)?;
    }
    write_magic(w)?;
    Ok(())
}

/// Read one LLsp record; ids are assigned by position.
pub fn read_vocabulary<R: Read>(r: &mut R) -> Result<Vocabulary, ExportError> {
    expect_tag(r, VOCAB_TAG)?;
    let count = r.read_i32::<LittleEndian>().map_err(|e| eof("token count", e))?;
    if count < 0 {
        return Err(ExportError::malformed(format!("negative token count {}", count)));
    }
    expect_magic(r)?;

    let mut tokens = Vec::new();
    for id in 0..count as u32 {
        tokens.push(read_token(r, id)?);
    }
    expect_magic(r)?;
    Vocabulary::from_tokens(tokens)
}

pub fn encode_vocabulary(vocab: &Vocabulary) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    write_vocabulary(&mut buf, vocab)?;
    Ok(buf)
}

pub fn decode_vocabulary(bytes: &[u8]) -> Result<Vocabulary, ExportError> {
    let mut cursor = Cursor::new(bytes);
    let vocab = read_vocabulary(&mut cursor)?;
    expect_end(&bytes[cursor.position() as usize..], "vocabulary record")?;
    Ok(vocab)
}

pub fn save_vocabulary(vocab: &Vocabulary, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let path = path.as_ref();
    let bytes = encode_vocabulary(vocab)?;
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&bytes)?;
    w.flush()?;
    info!("wrote {} tokens to {:?}", vocab.len(), path);
    Ok(())
}

pub fn load_vocabulary(path: impl AsRef<Path>) -> Result<Vocabulary, ExportError> {
    let mut r = BufReader::new(File::open(path.as_ref())?);
    read_vocabulary(&mut r)
}

/// Piece bytes in Python `bytes` repr form, without the `b'...'` wrapper:
/// `\\`, `\t`, `\n`, `\r`, lowercase `\xNN` for other non-printables, and
/// only the quote character repr would pick is escaped.
fn escape_piece(piece: &[u8]) -> String {
    let quote = if piece.contains(&b'\'') && !piece.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    let mut out = String::with_capacity(piece.len());
    for &b in piece {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            _ if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out
}

/// One debug line: `id\t0x<flags>\t<weight>\t<piece>\t<display>`.
pub fn text_line(token: &Token) -> String {
    format!(
        "{}\t0x{:02x}\t{}\t{}\t{}",
        token.id,
        token.flags.bits(),
        token.weight,
        escape_piece(&token.piece),
        truncate_display(&token.piece_display)
    )
}

/// Human-readable dump, one token per line. Not meant to be parsed back.
pub fn write_text_vocabulary<W: Write>(w: &mut W, vocab: &Vocabulary) -> Result<(), ExportError> {
    for token in vocab.iter() {
        writeln!(w, "{}", text_line(token))?;
    }
    Ok(())
}

pub fn save_text_vocabulary(vocab: &Vocabulary, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let mut w = BufWriter::new(File::create(path.as_ref())?);
    write_text_vocabulary(&mut w, vocab)?;
    w.flush()?;
    Ok(())
}
