//! In-memory tokenizer sources.
//!
//! [`PieceScoreTable`] and [`MergeRankTable`] hold a vocabulary already pulled
//! out of some upstream model and carry their own segmentation routines, so a
//! vocabulary can be built and its test cases generated without the
//! framework that produced it.

use super::byte_level;
use super::source::{
    byte_piece, parse_byte_piece, MergeRankSource, PieceScoreSource, WORD_BOUNDARY,
};
use super::token::TokenFlags;
use crate::errors::ExportError;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Penalty below the lowest piece score for a character no piece covers.
const UNKNOWN_PENALTY: f32 = 10.0;

/// One entry of a unigram vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPiece {
    pub text: String,
    pub score: f32,
    pub flags: TokenFlags,
}

impl ScoredPiece {
    pub fn normal(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
            flags: TokenFlags::NONE,
        }
    }

    pub fn with_flags(text: impl Into<String>, score: f32, flags: TokenFlags) -> Self {
        Self {
            text: text.into(),
            score,
            flags,
        }
    }
}

/// Unigram vocabulary: pieces in id order with independent scores.
#[derive(Debug, Clone)]
pub struct PieceScoreTable {
    pieces: Vec<ScoredPiece>,
    /// Normal pieces only; these are the segmentation candidates.
    index: HashMap<String, u32>,
    byte_ids: HashMap<u8, u32>,
    unk_id: Option<u32>,
    max_piece_chars: usize,
    fallback_score: f32,
}

impl PieceScoreTable {
    pub fn new(pieces: Vec<ScoredPiece>) -> Self {
        let mut index = HashMap::new();
        let mut byte_ids = HashMap::new();
        let mut unk_id = None;
        let mut max_piece_chars = 1;
        let mut min_score = 0.0f32;

        for (id, piece) in pieces.iter().enumerate() {
            let id = id as u32;
            if piece.flags.contains(TokenFlags::BYTE) {
                if let Some(b) = parse_byte_piece(&piece.text) {
                    byte_ids.entry(b).or_insert(id);
                }
            } else if piece.flags.contains(TokenFlags::UNK) {
                unk_id.get_or_insert(id);
            } else if piece.flags.is_empty() {
                index.entry(piece.text.clone()).or_insert(id);
                max_piece_chars = max_piece_chars.max(piece.text.chars().count());
                min_score = min_score.min(piece.score);
            }
        }

        Self {
            pieces,
            index,
            byte_ids,
            unk_id,
            max_piece_chars,
            fallback_score: min_score - UNKNOWN_PENALTY,
        }
    }

    fn flags(&self, id: u32) -> TokenFlags {
        self.pieces
            .get(id as usize)
            .map(|p| p.flags)
            .unwrap_or(TokenFlags::NONE)
    }

    /// Pieces for a character no normal piece covers: byte pieces when every
    /// byte has one, else the unknown piece.
    fn fallback_pieces(&self, ch: &str, out: &mut Vec<String>) {
        let bytes = ch.as_bytes();
        if bytes.iter().all(|b| self.byte_ids.contains_key(b)) {
            out.extend(bytes.iter().map(|&b| byte_piece(b)));
        } else if let Some(unk) = self.unk_id {
            out.push(self.pieces[unk as usize].text.clone());
        } else {
            out.push(ch.to_string());
        }
    }
}

impl PieceScoreSource for PieceScoreTable {
    fn vocab_size(&self) -> usize {
        self.pieces.len()
    }

    fn is_unknown(&self, id: u32) -> bool {
        self.flags(id).contains(TokenFlags::UNK)
    }

    fn is_control(&self, id: u32) -> bool {
        self.flags(id).contains(TokenFlags::CONTROL)
    }

    fn is_unused(&self, id: u32) -> bool {
        self.flags(id).contains(TokenFlags::UNUSED)
    }

    fn is_byte(&self, id: u32) -> bool {
        self.flags(id).contains(TokenFlags::BYTE)
    }

    fn piece_text(&self, id: u32) -> &str {
        self.pieces
            .get(id as usize)
            .map(|p| p.text.as_str())
            .unwrap_or("")
    }

    fn score(&self, id: u32) -> f32 {
        self.pieces.get(id as usize).map(|p| p.score).unwrap_or(0.0)
    }

    /// Viterbi segmentation maximizing the summed score of normal pieces.
    fn encode_as_pieces(&self, text: &str) -> Result<Vec<String>, ExportError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let boundary = WORD_BOUNDARY.to_string();
        let normalized = format!("{}{}", boundary, text.replace(' ', &boundary));
        let bounds: Vec<usize> = normalized
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(normalized.len()))
            .collect();
        let n = bounds.len() - 1;

        // best[end] = (score, start, piece id or None for fallback)
        let mut best: Vec<Option<(f32, usize, Option<u32>)>> = vec![None; n + 1];
        best[0] = Some((0.0, 0, None));
        for end in 1..=n {
            for start in end.saturating_sub(self.max_piece_chars)..end {
                let Some((base, _, _)) = best[start] else {
                    continue;
                };
                let sub = &normalized[bounds[start]..bounds[end]];
                let candidate = match self.index.get(sub) {
                    Some(&id) => Some((base + self.pieces[id as usize].score, Some(id))),
                    None if end == start + 1 => Some((base + self.fallback_score, None)),
                    None => None,
                };
                if let Some((score, id)) = candidate {
                    if best[end].map_or(true, |(s, _, _)| score > s) {
                        best[end] = Some((score, start, id));
                    }
                }
            }
        }

        let mut segments = Vec::new();
        let mut end = n;
        while end > 0 {
            let (_, start, id) = best[end]
                .ok_or_else(|| ExportError::ModelLoad("segmentation lattice broken".into()))?;
            segments.push((start, end, id));
            end = start;
        }

        let mut pieces = Vec::with_capacity(segments.len());
        for &(start, end, id) in segments.iter().rev() {
            match id {
                Some(id) => pieces.push(self.pieces[id as usize].text.clone()),
                None => {
                    self.fallback_pieces(&normalized[bounds[start]..bounds[end]], &mut pieces)
                }
            }
        }
        Ok(pieces)
    }
}

/// Byte-level BPE vocabulary.
#[derive(Debug, Clone)]
pub struct MergeRankTable {
    encoder: IndexMap<String, u32>,
    byte_decoder: HashMap<char, u8>,
    merge_ranks: IndexMap<(String, String), u32>,
    special_tokens: Vec<(u32, String)>,
    unk_token_id: u32,
    vocab_size: usize,
}

impl MergeRankTable {
    /// `vocab_size` defaults to one past the largest encoder or special id.
    pub fn new(
        encoder: IndexMap<String, u32>,
        merge_ranks: IndexMap<(String, String), u32>,
        special_tokens: Vec<(u32, String)>,
        unk_token_id: u32,
    ) -> Self {
        let vocab_size = encoder
            .values()
            .copied()
            .chain(special_tokens.iter().map(|(id, _)| *id))
            .chain(std::iter::once(unk_token_id))
            .max()
            .map_or(0, |max| max as usize + 1);
        Self {
            encoder,
            byte_decoder: byte_level::byte_decoder(),
            merge_ranks,
            special_tokens,
            unk_token_id,
            vocab_size,
        }
    }

    pub fn with_vocab_size(mut self, vocab_size: usize) -> Self {
        self.vocab_size = vocab_size;
        self
    }

    /// Ranks from an ordered merge list: the i-th pair gets rank i.
    pub fn ranks_from_merges<I, S>(merges: I) -> IndexMap<(String, String), u32>
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        merges
            .into_iter()
            .enumerate()
            .map(|(rank, (l, r))| ((l.into(), r.into()), rank as u32))
            .collect()
    }

    fn rank(&self, left: &str, right: &str) -> Option<u32> {
        self.merge_ranks
            .get(&(left.to_string(), right.to_string()))
            .copied()
    }

    /// Merge the lowest-ranked adjacent pair until none is left.
    fn bpe(&self, word: &str) -> Vec<String> {
        let mut symbols: Vec<String> = word.chars().map(|c| c.to_string()).collect();
        loop {
            let best = symbols
                .windows(2)
                .filter_map(|w| self.rank(&w[0], &w[1]).map(|r| (r, w[0].clone(), w[1].clone())))
                .min_by_key(|(r, _, _)| *r);
            let Some((_, left, right)) = best else {
                break;
            };

            let mut merged = Vec::with_capacity(symbols.len());
            let mut i = 0;
            while i < symbols.len() {
                if i + 1 < symbols.len() && symbols[i] == left && symbols[i + 1] == right {
                    merged.push(format!("{}{}", left, right));
                    i += 2;
                } else {
                    merged.push(symbols[i].clone());
                    i += 1;
                }
            }
            symbols = merged;
        }
        symbols
    }
}

/// Split before each space that follows a non-space, so words keep their
/// leading space.
fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = 0;
    let mut prev_space = true;
    for (i, ch) in text.char_indices() {
        if ch == ' ' && !prev_space && i > start {
            words.push(&text[start..i]);
            start = i;
        }
        prev_space = ch == ' ';
    }
    if start < text.len() {
        words.push(&text[start..]);
    }
    words
}

impl MergeRankSource for MergeRankTable {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn encoder(&self) -> &IndexMap<String, u32> {
        &self.encoder
    }

    fn byte_decoder(&self) -> &HashMap<char, u8> {
        &self.byte_decoder
    }

    fn merge_ranks(&self) -> &IndexMap<(String, String), u32> {
        &self.merge_ranks
    }

    fn special_tokens(&self) -> &[(u32, String)] {
        &self.special_tokens
    }

    fn unk_token_id(&self) -> u32 {
        self.unk_token_id
    }

    fn tokenize(&self, text: &str) -> Result<Vec<String>, ExportError> {
        let mut pieces = Vec::new();
        for word in split_words(text) {
            let surface = byte_level::encode_bytes(word.as_bytes());
            pieces.extend(self.bpe(&surface));
        }
        Ok(pieces)
    }
}
