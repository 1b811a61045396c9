//! Central error types for lrt-export.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported dtype code {0}")]
    UnsupportedDtype(i16),

    #[error("Tensor name too long: {len} bytes (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Duplicated token id {0}")]
    DuplicateTokenId(u32),

    #[error("Invalid character {ch:?} in piece {piece:?}: no byte mapping")]
    InvalidCharacterMapping { piece: String, ch: char },

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ExportError::MalformedRecord(msg.into())
    }
}
