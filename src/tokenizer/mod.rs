//! Hugging Face `tokenizer.json` as a tokenizer source.
//!
//! The vocabulary, merges and added tokens are read with serde; the reference
//! segmentation for test cases comes from the `tokenizers` crate so it matches
//! what the framework itself produces.

use crate::errors::ExportError;
use crate::vocab::source::{parse_byte_piece, MergeRankSource, PieceScoreSource};
use crate::vocab::{
    MergeRankTable, PieceScoreTable, ScoredPiece, TokenFlags, TokenizerKind, TokenizerSource,
};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Deserialize)]
struct TokenizerJson {
    #[serde(default)]
    added_tokens: Vec<AddedToken>,
    model: ModelJson,
}

#[derive(Deserialize)]
struct AddedToken {
    id: u32,
    content: String,
    #[serde(default)]
    special: bool,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ModelJson {
    #[serde(rename = "BPE")]
    Bpe {
        vocab: IndexMap<String, u32>,
        #[serde(default)]
        merges: Vec<MergeJson>,
        #[serde(default)]
        unk_token: Option<String>,
        #[serde(default)]
        byte_fallback: bool,
    },
    Unigram {
        vocab: Vec<(String, f64)>,
        #[serde(default)]
        unk_id: Option<u32>,
        #[serde(default)]
        byte_fallback: bool,
    },
}

/// Older files store merges as `"a b"`, newer ones as `["a", "b"]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum MergeJson {
    Joined(String),
    Pair(String, String),
}

impl MergeJson {
    fn into_pair(self) -> Result<(String, String), ExportError> {
        match self {
            MergeJson::Pair(l, r) => Ok((l, r)),
            MergeJson::Joined(s) => s
                .split_once(' ')
                .map(|(l, r)| (l.to_string(), r.to_string()))
                .ok_or_else(|| ExportError::ModelLoad(format!("invalid merge entry {:?}", s))),
        }
    }
}

/// `tokenizer.json` itself, or a directory containing one.
pub fn resolve_tokenizer_path(input: impl AsRef<Path>) -> PathBuf {
    let input = input.as_ref();
    if input.is_dir() {
        input.join("tokenizer.json")
    } else {
        input.to_path_buf()
    }
}

/// Piece-score vocabulary (Unigram, or SentencePiece-style BPE) with
/// framework segmentation.
pub struct HfPieceScore {
    table: PieceScoreTable,
    tokenizer: tokenizers::Tokenizer,
}

/// Byte-level BPE vocabulary with framework segmentation.
pub struct HfBpe {
    table: MergeRankTable,
    tokenizer: tokenizers::Tokenizer,
}

/// A loaded `tokenizer.json`, viewed as the requested source kind.
pub enum HfTokenizer {
    PieceScore(HfPieceScore),
    Bpe(HfBpe),
}

impl HfTokenizer {
    /// Load from a `tokenizer.json` path or a directory holding one.
    pub fn from_file(path: impl AsRef<Path>, kind: TokenizerKind) -> Result<Self, ExportError> {
        let path = resolve_tokenizer_path(path);
        info!("loading {} tokenizer from {:?}", kind, path);
        let json = std::fs::read_to_string(&path)
            .map_err(|e| ExportError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        let tokenizer = tokenizers::Tokenizer::from_file(&path)
            .map_err(|e| ExportError::ModelLoad(e.to_string()))?;
        Self::from_parts(&json, tokenizer, kind)
    }

    /// Build from already-read JSON and the matching framework tokenizer.
    ///
    /// `Spm` accepts Unigram models and SentencePiece-style BPE models
    /// (`byte_fallback`, `▁` word boundaries); `Transformers` accepts
    /// byte-level BPE models.
    pub fn from_parts(
        json: &str,
        tokenizer: tokenizers::Tokenizer,
        kind: TokenizerKind,
    ) -> Result<Self, ExportError> {
        let parsed: TokenizerJson =
            serde_json::from_str(json).map_err(|e| ExportError::ModelLoad(e.to_string()))?;
        let added = &parsed.added_tokens;
        match (kind, parsed.model) {
            (
                TokenizerKind::Spm,
                ModelJson::Unigram {
                    vocab,
                    unk_id,
                    byte_fallback,
                },
            ) => {
                let table = unigram_table(vocab, unk_id, byte_fallback, added);
                Ok(HfTokenizer::PieceScore(HfPieceScore { table, tokenizer }))
            }
            (
                TokenizerKind::Spm,
                ModelJson::Bpe {
                    vocab,
                    unk_token,
                    byte_fallback,
                    ..
                },
            ) => {
                let table = sentencepiece_bpe_table(vocab, unk_token, byte_fallback, added);
                Ok(HfTokenizer::PieceScore(HfPieceScore { table, tokenizer }))
            }
            (
                TokenizerKind::Transformers,
                ModelJson::Bpe {
                    vocab,
                    merges,
                    unk_token,
                    ..
                },
            ) => {
                let table = bpe_table(vocab, merges, unk_token, added)?;
                Ok(HfTokenizer::Bpe(HfBpe { table, tokenizer }))
            }
            (TokenizerKind::Transformers, ModelJson::Unigram { .. }) => Err(ExportError::ModelLoad(
                "transformers export needs a BPE model, file holds a Unigram model".into(),
            )),
        }
    }

    pub fn kind(&self) -> TokenizerKind {
        match self {
            HfTokenizer::PieceScore(_) => TokenizerKind::Spm,
            HfTokenizer::Bpe(_) => TokenizerKind::Transformers,
        }
    }

    pub fn source(&self) -> TokenizerSource<'_> {
        match self {
            HfTokenizer::PieceScore(p) => TokenizerSource::PieceScore(p),
            HfTokenizer::Bpe(b) => TokenizerSource::MergeRank(b),
        }
    }
}

fn bpe_table(
    vocab: IndexMap<String, u32>,
    merges: Vec<MergeJson>,
    unk_token: Option<String>,
    added_tokens: &[AddedToken],
) -> Result<MergeRankTable, ExportError> {
    let merges = merges
        .into_iter()
        .map(MergeJson::into_pair)
        .collect::<Result<Vec<_>, _>>()?;
    let ranks = MergeRankTable::ranks_from_merges(merges);

    // added tokens outside the byte-level vocabulary are plain text: control
    let specials: Vec<(u32, String)> = added_tokens
        .iter()
        .filter(|t| t.special || !vocab.contains_key(&t.content))
        .map(|t| (t.id, t.content.clone()))
        .collect();

    let unk_id = unk_token
        .as_deref()
        .and_then(|unk| {
            vocab.get(unk).copied().or_else(|| {
                added_tokens
                    .iter()
                    .find(|t| t.content == unk)
                    .map(|t| t.id)
            })
        })
        .or_else(|| specials.first().map(|(id, _)| *id))
        .ok_or_else(|| ExportError::ModelLoad("BPE model has no unknown token".into()))?;

    Ok(MergeRankTable::new(vocab, ranks, specials, unk_id))
}

/// SentencePiece-style BPE as a piece-score table.
///
/// Ids follow the vocabulary; normal pieces score `-id`, which keeps the
/// merge priority the vocabulary order encodes. Ids no piece claims become
/// unused slots.
fn sentencepiece_bpe_table(
    vocab: IndexMap<String, u32>,
    unk_token: Option<String>,
    byte_fallback: bool,
    added_tokens: &[AddedToken],
) -> PieceScoreTable {
    let unk_id = unk_token.as_deref().and_then(|unk| vocab.get(unk).copied());
    let control: HashSet<u32> = added_tokens
        .iter()
        .filter(|t| t.special)
        .map(|t| t.id)
        .collect();

    let size = vocab
        .values()
        .copied()
        .chain(added_tokens.iter().map(|t| t.id))
        .max()
        .map_or(0, |max| max as usize + 1);
    let mut pieces: Vec<Option<ScoredPiece>> = vec![None; size];

    for (text, id) in vocab {
        let mut flags = TokenFlags::NONE;
        if Some(id) == unk_id {
            flags |= TokenFlags::UNK;
        } else if control.contains(&id) {
            flags |= TokenFlags::CONTROL;
        } else if byte_fallback && parse_byte_piece(&text).is_some() {
            flags |= TokenFlags::BYTE;
        }
        let score = if flags.is_empty() { 0.0 - id as f32 } else { 0.0 };
        pieces[id as usize] = Some(ScoredPiece::with_flags(text, score, flags));
    }
    // added tokens outside the model vocabulary
    for t in added_tokens {
        let slot = &mut pieces[t.id as usize];
        if slot.is_none() {
            let flags = if t.special {
                TokenFlags::CONTROL
            } else {
                TokenFlags::NONE
            };
            *slot = Some(ScoredPiece::with_flags(t.content.clone(), 0.0, flags));
        }
    }

    let pieces = pieces
        .into_iter()
        .map(|p| p.unwrap_or_else(|| ScoredPiece::with_flags("", 0.0, TokenFlags::UNUSED)))
        .collect();
    PieceScoreTable::new(pieces)
}

fn unigram_table(
    vocab: Vec<(String, f64)>,
    unk_id: Option<u32>,
    byte_fallback: bool,
    added_tokens: &[AddedToken],
) -> PieceScoreTable {
    let control: HashSet<u32> = added_tokens
        .iter()
        .filter(|t| t.special)
        .map(|t| t.id)
        .collect();
    let pieces = vocab
        .into_iter()
        .enumerate()
        .map(|(id, (text, score))| {
            let id = id as u32;
            let mut flags = TokenFlags::NONE;
            if Some(id) == unk_id {
                flags |= TokenFlags::UNK;
            }
            if control.contains(&id) && Some(id) != unk_id {
                flags |= TokenFlags::CONTROL;
            }
            if byte_fallback && parse_byte_piece(&text).is_some() {
                flags |= TokenFlags::BYTE;
            }
            ScoredPiece::with_flags(text, score as f32, flags)
        })
        .collect();
    PieceScoreTable::new(pieces)
}

fn encode_tokens(tokenizer: &tokenizers::Tokenizer, text: &str) -> Result<Vec<String>, ExportError> {
    let encoding = tokenizer
        .encode(text, false)
        .map_err(|e| ExportError::ModelLoad(e.to_string()))?;
    Ok(encoding.get_tokens().to_vec())
}

impl PieceScoreSource for HfPieceScore {
    fn vocab_size(&self) -> usize {
        self.table.vocab_size()
    }

    fn is_unknown(&self, id: u32) -> bool {
        self.table.is_unknown(id)
    }

    fn is_control(&self, id: u32) -> bool {
        self.table.is_control(id)
    }

    fn is_unused(&self, id: u32) -> bool {
        self.table.is_unused(id)
    }

    fn is_byte(&self, id: u32) -> bool {
        self.table.is_byte(id)
    }

    fn piece_text(&self, id: u32) -> &str {
        self.table.piece_text(id)
    }

    fn score(&self, id: u32) -> f32 {
        self.table.score(id)
    }

    fn encode_as_pieces(&self, text: &str) -> Result<Vec<String>, ExportError> {
        encode_tokens(&self.tokenizer, text)
    }
}

impl MergeRankSource for HfBpe {
    fn vocab_size(&self) -> usize {
        self.table.vocab_size()
    }

    fn encoder(&self) -> &IndexMap<String, u32> {
        self.table.encoder()
    }

    fn byte_decoder(&self) -> &HashMap<char, u8> {
        self.table.byte_decoder()
    }

    fn merge_ranks(&self) -> &IndexMap<(String, String), u32> {
        self.table.merge_ranks()
    }

    fn special_tokens(&self) -> &[(u32, String)] {
        self.table.special_tokens()
    }

    fn unk_token_id(&self) -> u32 {
        self.table.unk_token_id()
    }

    fn tokenize(&self, text: &str) -> Result<Vec<String>, ExportError> {
        encode_tokens(&self.tokenizer, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BPE_JSON: &str = r#"{
        "version": "1.0",
        "added_tokens": [
            {"id": 5, "content": "<|endoftext|>", "special": true}
        ],
        "model": {
            "type": "BPE",
            "dropout": null,
            "unk_token": null,
            "vocab": {"a": 0, "b": 1, "ab": 2, "Ġ": 3, "Ġab": 4},
            "merges": ["a b", ["Ġ", "ab"]]
        }
    }"#;

    const UNIGRAM_JSON: &str = r#"{
        "added_tokens": [
            {"id": 0, "content": "<unk>", "special": true},
            {"id": 1, "content": "<s>", "special": true}
        ],
        "model": {
            "type": "Unigram",
            "unk_id": 0,
            "byte_fallback": true,
            "vocab": [["<unk>", 0.0], ["<s>", 0.0], ["<0x41>", 0.0], ["▁hi", -2.5]]
        }
    }"#;

    #[test]
    fn bpe_json_to_table() {
        let parsed: TokenizerJson = serde_json::from_str(BPE_JSON).unwrap();
        let ModelJson::Bpe {
            vocab,
            merges,
            unk_token,
            ..
        } = parsed.model
        else {
            panic!("expected BPE");
        };
        let table = bpe_table(vocab, merges, unk_token, &parsed.added_tokens).unwrap();
        assert_eq!(table.vocab_size(), 6);
        assert_eq!(table.unk_token_id(), 5);
        assert_eq!(table.special_tokens(), &[(5, "<|endoftext|>".to_string())]);
        assert_eq!(table.merge_ranks().get(&("Ġ".to_string(), "ab".to_string())), Some(&1));
    }

    #[test]
    fn unigram_json_to_table() {
        let parsed: TokenizerJson = serde_json::from_str(UNIGRAM_JSON).unwrap();
        let ModelJson::Unigram {
            vocab,
            unk_id,
            byte_fallback,
        } = parsed.model
        else {
            panic!("expected Unigram");
        };
        let table = unigram_table(vocab, unk_id, byte_fallback, &parsed.added_tokens);
        assert!(table.is_unknown(0));
        assert!(!table.is_control(0));
        assert!(table.is_control(1));
        assert!(table.is_byte(2));
        assert_eq!(table.score(3), -2.5);
    }

    const LLAMA_JSON: &str = r#"{
        "added_tokens": [
            {"id": 0, "content": "<unk>", "special": true},
            {"id": 1, "content": "<s>", "special": true},
            {"id": 7, "content": "<pad>", "special": true}
        ],
        "model": {
            "type": "BPE",
            "unk_token": "<unk>",
            "byte_fallback": true,
            "vocab": {"<unk>": 0, "<s>": 1, "<0x0A>": 2, "▁": 3, "t": 4, "▁t": 5},
            "merges": [["▁", "t"]]
        }
    }"#;

    #[test]
    fn sentencepiece_bpe_json_to_table() {
        let parsed: TokenizerJson = serde_json::from_str(LLAMA_JSON).unwrap();
        let ModelJson::Bpe {
            vocab,
            unk_token,
            byte_fallback,
            ..
        } = parsed.model
        else {
            panic!("expected BPE");
        };
        assert!(byte_fallback);
        let table = sentencepiece_bpe_table(vocab, unk_token, byte_fallback, &parsed.added_tokens);
        assert_eq!(table.vocab_size(), 8);
        assert!(table.is_unknown(0));
        assert!(!table.is_control(0));
        assert!(table.is_control(1));
        assert!(table.is_byte(2));
        assert_eq!(table.piece_text(5), "▁t");
        assert_eq!(table.score(5), -5.0);
        assert!(table.score(3) > table.score(5));
        // gap between the model vocabulary and <pad>
        assert!(table.is_unused(6));
        assert!(table.is_control(7));
        assert_eq!(table.piece_text(7), "<pad>");
    }

    #[test]
    fn bad_merge_entry() {
        assert!(MergeJson::Joined("ab".into()).into_pair().is_err());
    }
}
