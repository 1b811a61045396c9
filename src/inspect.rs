//! Summaries of exported files: which record kind, what it holds, and basic
//! value statistics for float tensors.

use crate::errors::ExportError;
use crate::tensor::{decode_tensor_dict, read_tensor, Tensor, DType, TENSOR_DICT_TAG, TENSOR_TAG};
use crate::vocab::{decode_vocabulary, Vocabulary, VOCAB_TAG};
use serde::Serialize;
use std::fmt;
use std::io::{BufRead, Cursor};
use std::path::Path;

/// Value statistics for an F32 tensor; non-finite values are counted, not folded in.
#[derive(Debug, Clone, Serialize)]
pub struct TensorStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub std: f32,
    pub count: usize,
    pub nan_count: usize,
    pub inf_count: usize,
    pub zero_count: usize,
}

impl TensorStats {
    pub fn from_slice(slice: &[f32]) -> Self {
        let count = slice.len();
        let nan_count = slice.iter().filter(|x| x.is_nan()).count();
        let inf_count = slice.iter().filter(|x| x.is_infinite()).count();
        let zero_count = slice.iter().filter(|&&x| x == 0.0).count();
        let finite = || slice.iter().filter(|x| x.is_finite()).copied();
        let finite_count = count - nan_count - inf_count;
        let mean = if finite_count > 0 {
            finite().sum::<f32>() / finite_count as f32
        } else {
            f32::NAN
        };
        // sample standard deviation over finite values
        let var: f32 = finite().map(|x| (x - mean) * (x - mean)).sum();
        let std = if finite_count > 1 {
            (var / (finite_count - 1) as f32).sqrt()
        } else {
            0.0
        };
        let min = finite().fold(f32::INFINITY, f32::min);
        let max = finite().fold(f32::NEG_INFINITY, f32::max);
        Self {
            min: if min == f32::INFINITY { 0.0 } else { min },
            max: if max == f32::NEG_INFINITY { 0.0 } else { max },
            mean,
            std,
            count,
            nan_count,
            inf_count,
            zero_count,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.nan_count == 0 && self.inf_count == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TensorSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub dtype: String,
    pub shape: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TensorStats>,
}

impl TensorSummary {
    pub fn new(name: Option<&str>, tensor: &Tensor) -> Self {
        let stats = match tensor.dtype() {
            DType::F32 => tensor.as_f32_vec().ok().map(|v| TensorStats::from_slice(&v)),
            DType::I64 => None,
        };
        Self {
            name: name.map(str::to_string),
            dtype: tensor.dtype().name().to_string(),
            shape: tensor.shape().to_vec(),
            stats,
        }
    }
}

/// Token counts per flag; a token can land in several buckets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VocabularySummary {
    pub tokens: usize,
    pub unknown: usize,
    pub control: usize,
    pub byte: usize,
    pub unused: usize,
    pub normal: usize,
    pub unk_ids: Vec<u32>,
}

impl VocabularySummary {
    pub fn new(vocab: &Vocabulary) -> Self {
        let mut s = VocabularySummary {
            tokens: vocab.len(),
            unk_ids: vocab.unk_ids(),
            ..Default::default()
        };
        for t in vocab.iter() {
            if t.is_unknown() {
                s.unknown += 1;
            }
            if t.is_control() {
                s.control += 1;
            }
            if t.is_byte() {
                s.byte += 1;
            }
            if t.is_unused() {
                s.unused += 1;
            }
            if t.flags.is_empty() {
                s.normal += 1;
            }
        }
        s
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileSummary {
    TensorDict { tensors: Vec<TensorSummary> },
    Tensors { tensors: Vec<TensorSummary> },
    Vocabulary(VocabularySummary),
}

/// Identify the record kind from the leading tag and summarize the contents.
pub fn inspect_bytes(bytes: &[u8]) -> Result<FileSummary, ExportError> {
    let tag = bytes
        .get(..4)
        .ok_or_else(|| ExportError::malformed("file shorter than a record tag"))?;
    if tag == TENSOR_DICT_TAG {
        let dict = decode_tensor_dict(bytes)?;
        let tensors = dict
            .iter()
            .map(|(name, t)| TensorSummary::new(Some(name), t))
            .collect();
        Ok(FileSummary::TensorDict { tensors })
    } else if tag == TENSOR_TAG {
        let mut cursor = Cursor::new(bytes);
        let mut tensors = Vec::new();
        while !cursor.fill_buf()?.is_empty() {
            tensors.push(TensorSummary::new(None, &read_tensor(&mut cursor)?));
        }
        Ok(FileSummary::Tensors { tensors })
    } else if tag == VOCAB_TAG {
        Ok(FileSummary::Vocabulary(VocabularySummary::new(
            &decode_vocabulary(bytes)?,
        )))
    } else {
        Err(ExportError::malformed(format!(
            "unknown record tag {:?}",
            String::from_utf8_lossy(tag)
        )))
    }
}

pub fn inspect_file(path: impl AsRef<Path>) -> Result<FileSummary, ExportError> {
    let bytes = std::fs::read(path.as_ref())?;
    inspect_bytes(&bytes)
}

fn write_tensor_line(f: &mut fmt::Formatter<'_>, idx: usize, t: &TensorSummary) -> fmt::Result {
    match &t.name {
        Some(name) => write!(f, "{}\t{}\t{:?}", name, t.dtype, t.shape)?,
        None => write!(f, "#{}\t{}\t{:?}", idx, t.dtype, t.shape)?,
    }
    if let Some(s) = &t.stats {
        write!(
            f,
            "\tmin={:.6} max={:.6} mean={:.6} std={:.6}",
            s.min, s.max, s.mean, s.std
        )?;
        if !s.is_healthy() {
            write!(f, " nan={} inf={}", s.nan_count, s.inf_count)?;
        }
    }
    writeln!(f)
}

impl fmt::Display for FileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSummary::TensorDict { tensors } => {
                writeln!(f, "TDIC: {} tensors", tensors.len())?;
                for (i, t) in tensors.iter().enumerate() {
                    write_tensor_line(f, i, t)?;
                }
            }
            FileSummary::Tensors { tensors } => {
                writeln!(f, "TNSR: {} tensors", tensors.len())?;
                for (i, t) in tensors.iter().enumerate() {
                    write_tensor_line(f, i, t)?;
                }
            }
            FileSummary::Vocabulary(v) => {
                writeln!(f, "LLsp: {} tokens", v.tokens)?;
                writeln!(f, "unknown: {} {:?}", v.unknown, v.unk_ids)?;
                writeln!(f, "control: {}", v.control)?;
                writeln!(f, "byte: {}", v.byte)?;
                writeln!(f, "unused: {}", v.unused)?;
                writeln!(f, "normal: {}", v.normal)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{encode_tensor, encode_tensor_dict, TensorDict};
    use crate::vocab::{encode_vocabulary, Token, TokenFlags};

    #[test]
    fn stats_skip_non_finite() {
        let s = TensorStats::from_slice(&[1.0, -3.0, 0.0, f32::NAN, f32::INFINITY]);
        assert_eq!(s.min, -3.0);
        assert_eq!(s.max, 1.0);
        assert!((s.mean - (-2.0 / 3.0)).abs() < 1e-6);
        assert_eq!(s.nan_count, 1);
        assert_eq!(s.inf_count, 1);
        assert_eq!(s.zero_count, 1);
        assert!(!s.is_healthy());
    }

    #[test]
    fn stats_sample_std() {
        let s = TensorStats::from_slice(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(s.mean, 5.0);
        // sum of squared deviations 32, n - 1 = 7
        assert!((s.std - (32.0f32 / 7.0).sqrt()).abs() < 1e-5);
        assert_eq!(TensorStats::from_slice(&[3.0]).std, 0.0);
    }

    #[test]
    fn summarizes_dict() {
        let mut dict = TensorDict::new();
        dict.insert("wte", Tensor::from_f32(&[2], &[1.0, 3.0]).unwrap());
        dict.insert("pos", Tensor::from_i64(&[1], &[7]).unwrap());
        let summary = inspect_bytes(&encode_tensor_dict(&dict).unwrap()).unwrap();
        let FileSummary::TensorDict { tensors } = &summary else {
            panic!("expected dict summary");
        };
        assert_eq!(tensors[0].name.as_deref(), Some("wte"));
        assert_eq!(tensors[0].stats.as_ref().unwrap().mean, 2.0);
        assert!(tensors[1].stats.is_none());
        assert!(summary.to_string().starts_with("TDIC: 2 tensors\n"));
    }

    #[test]
    fn summarizes_concatenated_tensors() {
        let mut bytes = encode_tensor(&Tensor::from_f32(&[1], &[0.5]).unwrap()).unwrap();
        bytes.extend(encode_tensor(&Tensor::from_i64(&[2], &[1, 2]).unwrap()).unwrap());
        let FileSummary::Tensors { tensors } = inspect_bytes(&bytes).unwrap() else {
            panic!("expected tensor list");
        };
        assert_eq!(tensors.len(), 2);
        assert_eq!(tensors[1].shape, vec![2]);
    }

    #[test]
    fn summarizes_vocabulary_as_json() {
        let vocab = Vocabulary::from_tokens(vec![
            Token::new(0, TokenFlags::UNK | TokenFlags::CONTROL, Vec::new(), "<unk>", 0.0),
            Token::new(1, TokenFlags::NONE, b"a".to_vec(), "a", -1.0),
            Token::unused(2),
        ])
        .unwrap();
        let summary = inspect_bytes(&encode_vocabulary(&vocab).unwrap()).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["kind"], "vocabulary");
        assert_eq!(json["tokens"], 3);
        assert_eq!(json["control"], 1);
        assert_eq!(json["unused"], 1);
        assert_eq!(json["normal"], 1);
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(inspect_bytes(b"GGUF\0\0\0\0").is_err());
        assert!(inspect_bytes(b"TD").is_err());
    }
}
