//! Dense token tables from either tokenizer source.

use super::source::{
    parse_byte_piece, MergeRankSource, PieceScoreSource, TokenizerSource, WORD_BOUNDARY,
};
use super::token::{Token, TokenFlags};
use crate::errors::ExportError;
use indexmap::IndexMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Two merge-rank entries produced the same combined piece. The first weight
/// is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConflict {
    pub piece: String,
    pub kept_weight: f32,
    pub ignored_weight: f32,
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pair for {:?} already exists (kept weight {}, ignored {})",
            self.piece, self.kept_weight, self.ignored_weight
        )
    }
}

/// Token table indexed by id; every id in `[0, len)` appears exactly once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vocabulary {
    tokens: Vec<Token>,
}

impl Vocabulary {
    /// Wrap a token list, checking `tokens[i].id == i`.
    pub fn from_tokens(tokens: Vec<Token>) -> Result<Self, ExportError> {
        if let Some((i, t)) = tokens
            .iter()
            .enumerate()
            .find(|(i, t)| t.id as usize != *i)
        {
            return Err(ExportError::malformed(format!(
                "token at index {} has id {}",
                i, t.id
            )));
        }
        Ok(Self { tokens })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Token> {
        self.tokens.get(id as usize)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Ids carrying the UNK flag.
    pub fn unk_ids(&self) -> Vec<u32> {
        self.tokens
            .iter()
            .filter(|t| t.is_unknown())
            .map(|t| t.id)
            .collect()
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }
}

/// Builder output: the table plus recoverable conflicts seen on the way.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub vocabulary: Vocabulary,
    pub conflicts: Vec<MergeConflict>,
}

/// Build a dense vocabulary from either source.
pub fn build_vocabulary(source: TokenizerSource<'_>) -> Result<BuildReport, ExportError> {
    let report = match source {
        TokenizerSource::PieceScore(s) => BuildReport {
            vocabulary: from_piece_score(s)?,
            conflicts: Vec::new(),
        },
        TokenizerSource::MergeRank(s) => from_merge_rank(s)?,
    };
    info!(
        "built {} vocabulary: {} tokens, {} merge conflicts",
        source.kind(),
        report.vocabulary.len(),
        report.conflicts.len()
    );
    Ok(report)
}

/// Unigram path: one token per id, flags from the four predicates.
pub fn from_piece_score(source: &dyn PieceScoreSource) -> Result<Vocabulary, ExportError> {
    let mut tokens = Vec::with_capacity(source.vocab_size());
    for id in 0..source.vocab_size() as u32 {
        let mut flags = TokenFlags::NONE;
        if source.is_unknown(id) {
            flags |= TokenFlags::UNK;
        }
        if source.is_control(id) {
            flags |= TokenFlags::CONTROL;
        }
        if source.is_unused(id) {
            flags |= TokenFlags::UNUSED;
        }
        if source.is_byte(id) {
            flags |= TokenFlags::BYTE;
        }

        let text = source.piece_text(id);
        let piece = if flags.contains(TokenFlags::BYTE) {
            let b = parse_byte_piece(text).ok_or_else(|| {
                ExportError::ModelLoad(format!("byte token {} has piece {:?}", id, text))
            })?;
            vec![b]
        } else if flags.is_empty() {
            text.replace(WORD_BOUNDARY, " ").into_bytes()
        } else {
            Vec::new()
        };

        tokens.push(Token::new(id, flags, piece, text, source.score(id)));
    }
    Vocabulary::from_tokens(tokens)
}

/// Raw bytes behind a byte-level surface piece.
fn decode_surface(source: &dyn MergeRankSource, surface: &str) -> Result<Vec<u8>, ExportError> {
    let decoder = source.byte_decoder();
    surface
        .chars()
        .map(|ch| {
            decoder
                .get(&ch)
                .copied()
                .ok_or_else(|| ExportError::InvalidCharacterMapping {
                    piece: surface.to_string(),
                    ch,
                })
        })
        .collect()
}

struct PendingToken {
    id: u32,
    piece: Vec<u8>,
    weight: Option<f32>,
}

/// BPE path: pieces from the encoder, weights from negated merge ranks,
/// specials and UNK applied last.
pub fn from_merge_rank(source: &dyn MergeRankSource) -> Result<BuildReport, ExportError> {
    // pieces and ids
    let mut pieces: IndexMap<&str, PendingToken> = IndexMap::with_capacity(source.encoder().len());
    for (surface, &id) in source.encoder() {
        pieces.insert(
            surface.as_str(),
            PendingToken {
                id,
                piece: decode_surface(source, surface)?,
                weight: None,
            },
        );
    }

    // weights
    let mut conflicts = Vec::new();
    for ((left, right), &rank) in source.merge_ranks() {
        let combined = format!("{}{}", left, right);
        // +0.0 for rank 0, never -0.0
        let weight = 0.0 - rank as f32;
        let pending = pieces.get_mut(combined.as_str()).ok_or_else(|| {
            ExportError::ModelLoad(format!(
                "merge ({:?}, {:?}) produces {:?} which is not in the vocabulary",
                left, right, combined
            ))
        })?;
        match pending.weight {
            Some(kept) => {
                let conflict = MergeConflict {
                    piece: combined,
                    kept_weight: kept,
                    ignored_weight: weight,
                };
                warn!("{}", conflict);
                conflicts.push(conflict);
            }
            None => pending.weight = Some(weight),
        }
    }

    // dense table
    let vocab_size = source.vocab_size();
    let mut slots: Vec<Option<Token>> = vec![None; vocab_size];
    for (surface, pending) in pieces {
        let slot = slots.get_mut(pending.id as usize).ok_or_else(|| {
            ExportError::ModelLoad(format!(
                "token {:?} has id {} outside vocab size {}",
                surface, pending.id, vocab_size
            ))
        })?;
        if slot.is_some() {
            return Err(ExportError::DuplicateTokenId(pending.id));
        }
        *slot = Some(Token::new(
            pending.id,
            TokenFlags::NONE,
            pending.piece,
            surface,
            pending.weight.unwrap_or(0.0),
        ));
    }

    let mut tokens: Vec<Token> = slots
        .into_iter()
        .enumerate()
        .map(|(id, slot)| slot.unwrap_or_else(|| Token::unused(id as u32)))
        .collect();
    let unused = tokens.iter().filter(|t| t.is_unused()).count();
    if unused > 0 {
        debug!("{} ids not claimed by any piece", unused);
    }

    // special tokens replace whatever held their id
    for (id, surface) in source.special_tokens() {
        let slot = tokens.get_mut(*id as usize).ok_or_else(|| {
            ExportError::ModelLoad(format!(
                "special token {:?} has id {} outside vocab size {}",
                surface, id, vocab_size
            ))
        })?;
        *slot = Token::control(*id, surface.clone());
    }

    let unk_id = source.unk_token_id();
    tokens
        .get_mut(unk_id as usize)
        .ok_or_else(|| {
            ExportError::ModelLoad(format!(
                "unknown token id {} outside vocab size {}",
                unk_id, vocab_size
            ))
        })?
        .flags |= TokenFlags::UNK;

    Ok(BuildReport {
        vocabulary: Vocabulary::from_tokens(tokens)?,
        conflicts,
    })
}
