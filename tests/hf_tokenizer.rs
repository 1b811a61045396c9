//! Integration tests: `tokenizer.json` files loaded through the framework
//! tokenizer and exported end to end.

use lrt_export::export::{export_tokenizer, ExportOptions};
use lrt_export::vocab::byte_level::byte_encoder;
use lrt_export::vocab::{load_vocabulary, TokenFlags};
use lrt_export::{ExportError, HfTokenizer, TokenizerKind};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lrt-export-hf-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_fixture(dir: &Path, tokenizer: &Value) {
    std::fs::write(
        dir.join("tokenizer.json"),
        serde_json::to_string_pretty(tokenizer).unwrap(),
    )
    .unwrap();
}

fn added_token(id: u32, content: &str) -> Value {
    json!({
        "id": id,
        "content": content,
        "single_word": false,
        "lstrip": false,
        "rstrip": false,
        "normalized": false,
        "special": true
    })
}

fn sentencepiece_normalizer() -> Value {
    json!({
        "type": "Sequence",
        "normalizers": [
            {"type": "Prepend", "prepend": "▁"},
            {"type": "Replace", "pattern": {"String": " "}, "content": "▁"}
        ]
    })
}

/// GPT-2 shaped: the full byte alphabet at ids 0..256, "ab" = 256,
/// "Ġab" = 257, `<|endoftext|>` = 258.
fn gpt2_fixture(pair_merges: bool) -> Value {
    let mut vocab = Map::new();
    for (b, ch) in byte_encoder().iter().enumerate() {
        vocab.insert(ch.to_string(), json!(b));
    }
    vocab.insert("ab".into(), json!(256));
    vocab.insert("Ġab".into(), json!(257));
    let merges = if pair_merges {
        json!([["a", "b"], ["Ġ", "ab"]])
    } else {
        json!(["a b", "Ġ ab"])
    };
    json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [added_token(258, "<|endoftext|>")],
        "normalizer": null,
        "pre_tokenizer": {
            "type": "ByteLevel",
            "add_prefix_space": false,
            "trim_offsets": true,
            "use_regex": true
        },
        "post_processor": null,
        "decoder": {
            "type": "ByteLevel",
            "add_prefix_space": true,
            "trim_offsets": true,
            "use_regex": true
        },
        "model": {
            "type": "BPE",
            "dropout": null,
            "unk_token": null,
            "continuing_subword_prefix": null,
            "end_of_word_suffix": null,
            "fuse_unk": false,
            "byte_fallback": false,
            "vocab": vocab,
            "merges": merges
        }
    })
}

/// LLaMA shaped: specials, 256 byte pieces at ids 3..259, then `▁`-prefixed
/// BPE pieces.
fn llama_fixture() -> Value {
    let mut vocab = Map::new();
    vocab.insert("<unk>".into(), json!(0));
    vocab.insert("<s>".into(), json!(1));
    vocab.insert("</s>".into(), json!(2));
    for b in 0..=255u32 {
        vocab.insert(format!("<0x{:02X}>", b), json!(3 + b));
    }
    for (i, piece) in ["▁", "t", "h", "e", "▁t", "he", "▁the"].iter().enumerate() {
        vocab.insert(piece.to_string(), json!(259 + i));
    }
    json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            added_token(0, "<unk>"),
            added_token(1, "<s>"),
            added_token(2, "</s>")
        ],
        "normalizer": sentencepiece_normalizer(),
        "pre_tokenizer": null,
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "BPE",
            "dropout": null,
            "unk_token": "<unk>",
            "continuing_subword_prefix": null,
            "end_of_word_suffix": null,
            "fuse_unk": true,
            "byte_fallback": true,
            "vocab": vocab,
            "merges": [["▁", "t"], ["h", "e"], ["▁t", "he"]]
        }
    })
}

fn unigram_fixture() -> Value {
    json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [added_token(0, "<unk>"), added_token(1, "<s>")],
        "normalizer": sentencepiece_normalizer(),
        "pre_tokenizer": null,
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "Unigram",
            "unk_id": 0,
            "byte_fallback": false,
            "vocab": [
                ["<unk>", 0.0],
                ["<s>", 0.0],
                ["▁", -2.0],
                ["▁the", -1.0],
                ["t", -3.0],
                ["h", -3.0],
                ["e", -3.0]
            ]
        }
    })
}

fn export_gpt2(name: &str, pair_merges: bool) {
    let dir = scratch_dir(name);
    write_fixture(&dir, &gpt2_fixture(pair_merges));

    // a directory resolves to <dir>/tokenizer.json
    let tokenizer = HfTokenizer::from_file(&dir, TokenizerKind::Transformers).unwrap();
    assert_eq!(tokenizer.kind(), TokenizerKind::Transformers);
    let artifacts = export_tokenizer(
        tokenizer.source(),
        dir.join("gpt2"),
        &ExportOptions::default(),
    )
    .unwrap();

    let vocab = load_vocabulary(&artifacts.model_file).unwrap();
    assert_eq!(vocab.len(), 259);
    assert_eq!(vocab.get(32).unwrap().piece, b" ");
    assert_eq!(vocab.get(32).unwrap().piece_display, "Ġ");
    assert_eq!(vocab.get(256).unwrap().piece, b"ab");
    assert_eq!(vocab.get(256).unwrap().weight, 0.0);
    assert_eq!(vocab.get(257).unwrap().piece, b" ab");
    assert_eq!(vocab.get(257).unwrap().weight, -1.0);
    assert_eq!(
        vocab.get(258).unwrap().flags,
        TokenFlags::CONTROL | TokenFlags::UNK
    );

    let cases = std::fs::read_to_string(artifacts.test_cases_file.unwrap()).unwrap();
    let lines: Vec<&str> = cases.lines().collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(
        lines[3],
        "independent Japanese\ti n d e p e n d e n t Ġ J a p a n e s e"
    );

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn byte_level_bpe_with_pair_merges() {
    export_gpt2("pairs", true);
}

#[test]
fn byte_level_bpe_with_joined_merges() {
    export_gpt2("joined", false);
}

#[test]
fn sentencepiece_bpe_exports_as_piece_score() {
    let dir = scratch_dir("llama");
    write_fixture(&dir, &llama_fixture());

    let tokenizer =
        HfTokenizer::from_file(dir.join("tokenizer.json"), TokenizerKind::Spm).unwrap();
    assert_eq!(tokenizer.kind(), TokenizerKind::Spm);
    let artifacts = export_tokenizer(
        tokenizer.source(),
        dir.join("llama"),
        &ExportOptions::default(),
    )
    .unwrap();

    let vocab = load_vocabulary(&artifacts.model_file).unwrap();
    assert_eq!(vocab.len(), 266);
    assert_eq!(vocab.get(0).unwrap().flags, TokenFlags::UNK);
    assert_eq!(vocab.get(1).unwrap().flags, TokenFlags::CONTROL);
    let newline = vocab.get(3 + 0x0A).unwrap();
    assert_eq!(newline.flags, TokenFlags::BYTE);
    assert_eq!(newline.piece, vec![0x0A]);
    let the = vocab.get(265).unwrap();
    assert_eq!(the.piece, b" the");
    assert_eq!(the.piece_display, "▁the");
    assert_eq!(the.weight, -265.0);

    let ini = std::fs::read_to_string(&artifacts.config_file).unwrap();
    assert!(ini.contains("add_prefix_space=true\n"));

    let cases = std::fs::read_to_string(artifacts.test_cases_file.unwrap()).unwrap();
    let lines: Vec<&str> = cases.lines().collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[10], "🐱\t▁ <0xF0> <0x9F> <0x90> <0xB1>");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unigram_exports_as_piece_score() {
    let dir = scratch_dir("unigram");
    write_fixture(&dir, &unigram_fixture());

    let tokenizer = HfTokenizer::from_file(&dir, TokenizerKind::Spm).unwrap();
    let artifacts = export_tokenizer(
        tokenizer.source(),
        dir.join("uni"),
        &ExportOptions::default(),
    )
    .unwrap();

    let vocab = load_vocabulary(&artifacts.model_file).unwrap();
    assert_eq!(vocab.len(), 7);
    assert_eq!(vocab.unk_ids(), vec![0]);
    assert_eq!(vocab.get(3).unwrap().piece, b" the");
    assert_eq!(vocab.get(3).unwrap().weight, -1.0);

    let cases = std::fs::read_to_string(artifacts.test_cases_file.unwrap()).unwrap();
    let lines: Vec<&str> = cases.lines().collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[10], "🐱\t▁ <unk>");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn unigram_rejected_for_byte_level_export() {
    let dir = scratch_dir("mismatch");
    write_fixture(&dir, &unigram_fixture());

    let err = HfTokenizer::from_file(&dir, TokenizerKind::Transformers)
        .err()
        .unwrap();
    assert!(matches!(err, ExportError::ModelLoad(_)));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_file_is_model_load_error() {
    let dir = scratch_dir("missing");
    let err = HfTokenizer::from_file(&dir, TokenizerKind::Spm).err().unwrap();
    assert!(matches!(err, ExportError::ModelLoad(_)));
    std::fs::remove_dir_all(&dir).ok();
}
