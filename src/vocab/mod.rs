//! Tokenizer vocabularies: sources, the dense-table builder and the LLsp codec.

pub mod builder;
pub mod byte_level;
pub mod codec;
pub mod source;
pub mod table;
pub mod test_cases;
pub mod token;

pub use builder::{build_vocabulary, BuildReport, MergeConflict, Vocabulary};
pub use codec::{
    decode_vocabulary, encode_vocabulary, load_vocabulary, save_text_vocabulary, save_vocabulary,
    truncate_display, write_text_vocabulary, VOCAB_TAG,
};
pub use source::{MergeRankSource, PieceScoreSource, TokenizerKind, TokenizerSource, WORD_BOUNDARY};
pub use table::{MergeRankTable, PieceScoreTable, ScoredPiece};
pub use token::{Token, TokenFlags};
