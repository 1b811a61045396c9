//! Export runs: turn a source into the artifact files the runtime reads.
//!
//! Every artifact is built in memory before the first file is created, so a
//! fatal error never leaves a half-written export behind.

pub mod ini;

pub use ini::IniDocument;

use crate::errors::ExportError;
use crate::tensor::{encode_tensor_dict, save_tensors, Tensor, TensorDict};
use crate::vocab::codec::encode_vocabulary;
use crate::vocab::test_cases::{generate_test_cases, write_test_cases};
use crate::vocab::{
    build_vocabulary, save_text_vocabulary, MergeConflict, TokenizerKind, TokenizerSource,
    Vocabulary,
};
use indexmap::IndexMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// `<prefix><suffix>`, e.g. `out/gpt2` + `.tokenizer.bin`.
pub fn output_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(prefix.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// What to write besides the binary vocabulary and its INI.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub test_cases: bool,
    pub text_dump: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            test_cases: true,
            text_dump: false,
        }
    }
}

/// Files written by [`export_tokenizer`].
#[derive(Debug, Clone)]
pub struct TokenizerArtifacts {
    pub model_file: PathBuf,
    pub config_file: PathBuf,
    pub test_cases_file: Option<PathBuf>,
    pub text_dump_file: Option<PathBuf>,
    pub vocabulary: Vocabulary,
    pub conflicts: Vec<MergeConflict>,
}

/// `[tokenizer]` section pointing the runtime at `model_file`.
pub fn tokenizer_ini(kind: TokenizerKind, model_file: &str) -> IniDocument {
    // unigram vocabularies mark word starts; byte-level BPE carries raw spaces
    let sentencepiece_style = kind == TokenizerKind::Spm;
    let mut ini = IniDocument::new();
    ini.set("tokenizer", "type", "bpe")
        .set("tokenizer", "model_file", model_file)
        .set("tokenizer", "add_prefix_space", sentencepiece_style)
        .set("tokenizer", "split_by_unicode", sentencepiece_style);
    ini
}

/// Build, encode and write `<prefix>.tokenizer.{bin,ini}` plus the optional
/// test cases and text dump.
pub fn export_tokenizer(
    source: TokenizerSource<'_>,
    prefix: impl AsRef<Path>,
    options: &ExportOptions,
) -> Result<TokenizerArtifacts, ExportError> {
    let prefix = prefix.as_ref();

    let report = build_vocabulary(source)?;
    let bytes = encode_vocabulary(&report.vocabulary)?;
    let cases = if options.test_cases {
        Some(generate_test_cases(source)?)
    } else {
        None
    };

    let model_file = output_path(prefix, ".tokenizer.bin");
    let mut w = BufWriter::new(File::create(&model_file)?);
    w.write_all(&bytes)?;
    w.flush()?;
    info!(
        "wrote {} tokens ({} bytes) to {:?}",
        report.vocabulary.len(),
        bytes.len(),
        model_file
    );

    let config_file = output_path(prefix, ".tokenizer.ini");
    tokenizer_ini(source.kind(), &file_name(&model_file)).save(&config_file)?;

    let test_cases_file = match cases {
        Some(cases) => {
            let path = output_path(prefix, ".tokenizer.test_cases.txt");
            let mut w = BufWriter::new(File::create(&path)?);
            write_test_cases(&mut w, &cases)?;
            w.flush()?;
            info!("wrote {} test cases to {:?}", cases.len(), path);
            Some(path)
        }
        None => None,
    };

    let text_dump_file = if options.text_dump {
        let path = output_path(prefix, ".tokenizer.txt");
        save_text_vocabulary(&report.vocabulary, &path)?;
        Some(path)
    } else {
        None
    };

    Ok(TokenizerArtifacts {
        model_file,
        config_file,
        test_cases_file,
        text_dump_file,
        vocabulary: report.vocabulary,
        conflicts: report.conflicts,
    })
}

/// Files written by [`export_model`].
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub params_file: PathBuf,
    pub config_file: PathBuf,
}

/// Write `<prefix>.params.bin` and `<prefix>.config.ini` with `[model]` and
/// `[config]` sections.
pub fn export_model(
    params: &TensorDict,
    config: &IndexMap<String, String>,
    prefix: impl AsRef<Path>,
) -> Result<ModelArtifacts, ExportError> {
    let prefix = prefix.as_ref();
    let bytes = encode_tensor_dict(params)?;

    let params_file = output_path(prefix, ".params.bin");
    let mut w = BufWriter::new(File::create(&params_file)?);
    w.write_all(&bytes)?;
    w.flush()?;
    info!("wrote {} tensors to {:?}", params.len(), params_file);

    let mut ini = IniDocument::new();
    ini.set("model", "params_file", file_name(&params_file));
    for (key, value) in config {
        ini.set("config", key, value);
    }
    let config_file = output_path(prefix, ".config.ini");
    ini.save(&config_file)?;

    Ok(ModelArtifacts {
        params_file,
        config_file,
    })
}

/// Write reference tensors to `<prefix>.test_tensors.bin`.
pub fn export_test_tensors(tensors: &[Tensor], prefix: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
    let path = output_path(prefix.as_ref(), ".test_tensors.bin");
    save_tensors(tensors, &path)?;
    Ok(path)
}
