//! # lrt-export
//!
//! Export side of a lightweight runtime: writes model parameters and tokenizer
//! vocabularies into the compact little-endian records the runtime loads.
//!
//! ## Records
//!
//! - **TNSR**: one dense tensor (dtype, shape, row-major payload)
//! - **TDIC**: ordered name → tensor map, used for `*.params.bin`
//! - **LLsp**: dense vocabulary table, used for `*.tokenizer.bin`
//!
//! Every record carries `0x55AA` sentinels so corruption is caught on read.
//!
//! ## Tokenizers
//!
//! A [`TokenizerSource`] is either a piece-score (Unigram/SentencePiece style)
//! or a merge-rank (byte-level BPE) vocabulary. [`build_vocabulary`] turns
//! either one into a [`Vocabulary`] with one token per id.

pub mod errors;
pub mod export;
pub(crate) mod format;
pub mod inspect;
pub mod namespace;
pub mod tensor;
pub mod tokenizer;
pub mod vocab;

pub use errors::ExportError;
pub use export::{
    export_model, export_test_tensors, export_tokenizer, ExportOptions, IniDocument,
    TokenizerArtifacts,
};
pub use format::MAGIC_NUMBER;
pub use inspect::{inspect_file, FileSummary, TensorStats};
pub use namespace::NamespaceContext;
pub use tensor::{DType, Element, Tensor, TensorDict};
pub use tokenizer::HfTokenizer;
pub use vocab::{
    build_vocabulary, BuildReport, MergeConflict, MergeRankSource, PieceScoreSource, Token,
    TokenFlags, TokenizerKind, TokenizerSource, Vocabulary,
};
