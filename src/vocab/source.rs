//! Capability interface over the two upstream vocabulary representations.

use crate::errors::ExportError;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// Word-boundary marker used by piece-score (sentencepiece-style) vocabularies.
pub const WORD_BOUNDARY: char = '\u{2581}';

/// Which upstream representation a source exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TokenizerKind {
    /// Unigram model: every piece has an independent score.
    Spm,
    /// Byte-level BPE model: pieces ranked by merge order.
    Transformers,
}

impl fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizerKind::Spm => write!(f, "spm"),
            TokenizerKind::Transformers => write!(f, "transformers"),
        }
    }
}

/// Unigram-style vocabulary indexed by id in `[0, vocab_size)`.
pub trait PieceScoreSource {
    fn vocab_size(&self) -> usize;
    fn is_unknown(&self, id: u32) -> bool;
    fn is_control(&self, id: u32) -> bool;
    fn is_unused(&self, id: u32) -> bool;
    fn is_byte(&self, id: u32) -> bool;
    /// Surface form; byte tokens are `<0xHH>`.
    fn piece_text(&self, id: u32) -> &str;
    fn score(&self, id: u32) -> f32;
    fn encode_as_pieces(&self, text: &str) -> Result<Vec<String>, ExportError>;
}

/// Byte-pair-merge vocabulary in its framework's reversible surface encoding.
pub trait MergeRankSource {
    fn vocab_size(&self) -> usize;
    /// Surface piece → id.
    fn encoder(&self) -> &IndexMap<String, u32>;
    /// Surface character → raw byte.
    fn byte_decoder(&self) -> &HashMap<char, u8>;
    /// (left, right) → merge rank; lower ranks merge first.
    fn merge_ranks(&self) -> &IndexMap<(String, String), u32>;
    /// (id, surface) pairs that become control tokens.
    fn special_tokens(&self) -> &[(u32, String)];
    fn unk_token_id(&self) -> u32;
    fn tokenize(&self, text: &str) -> Result<Vec<String>, ExportError>;
}

/// A borrowed source of either kind; the builder dispatches on the variant.
#[derive(Clone, Copy)]
pub enum TokenizerSource<'a> {
    PieceScore(&'a dyn PieceScoreSource),
    MergeRank(&'a dyn MergeRankSource),
}

impl<'a> TokenizerSource<'a> {
    pub fn kind(&self) -> TokenizerKind {
        match self {
            TokenizerSource::PieceScore(_) => TokenizerKind::Spm,
            TokenizerSource::MergeRank(_) => TokenizerKind::Transformers,
        }
    }

    pub fn vocab_size(&self) -> usize {
        match self {
            TokenizerSource::PieceScore(s) => s.vocab_size(),
            TokenizerSource::MergeRank(s) => s.vocab_size(),
        }
    }

    /// Reference segmentation of `text` into surface pieces.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>, ExportError> {
        match self {
            TokenizerSource::PieceScore(s) => s.encode_as_pieces(text),
            TokenizerSource::MergeRank(s) => s.tokenize(text),
        }
    }
}

impl fmt::Debug for TokenizerSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenizerSource")
            .field("kind", &self.kind())
            .field("vocab_size", &self.vocab_size())
            .finish()
    }
}

/// Byte value of a `<0xHH>` piece.
pub fn parse_byte_piece(text: &str) -> Option<u8> {
    let hex = text.strip_prefix("<0x")?.strip_suffix('>')?;
    if hex.len() != 2 {
        return None;
    }
    u8::from_str_radix(hex, 16).ok()
}

/// `<0xHH>` form of a byte.
pub fn byte_piece(b: u8) -> String {
    format!("<0x{:02X}>", b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_piece_roundtrip() {
        assert_eq!(parse_byte_piece("<0x0A>"), Some(0x0A));
        assert_eq!(parse_byte_piece("<0xff>"), Some(0xFF));
        assert_eq!(byte_piece(0xE6), "<0xE6>");
        assert_eq!(parse_byte_piece("<0x1>"), None);
        assert_eq!(parse_byte_piece("0x41"), None);
        assert_eq!(parse_byte_piece("<0xZZ>"), None);
    }
}
