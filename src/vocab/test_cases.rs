//! Reference segmentations the runtime tokenizer is checked against
//! (`*.tokenizer.test_cases.txt`).
//!
//! One line per sample: `<text>\t<pieces joined by a space>`.

use super::source::TokenizerSource;
use crate::errors::ExportError;
use std::io::Write;

/// Fixed sample covering CJK, macrons, quotes, digits, brackets and an emoji.
pub const SAMPLE_TEXT: &[&str] = &[
    "The Touhou Project (Japanese: 東方Project, Hepburn: Tōhō Purojekuto), ",
    "also known simply as Touhou (東方, literally ",
    "\"Eastern\" or \"Oriental\"), is a bullet hell shoot 'em up video game series created by one-man ",
    "independent Japanese",
    "doujin soft developer Team Shanghai Alice.",
    "Since 1995,[1][2] the team's member, Jun'ya \"ZUN\" Ōta, has independently",
    "developed programming, graphics, writing, and music for the series, self-publishing 18 mainline games and six",
    "spin-offs as of August 2022. ",
    "ZUN has also produced related print works and music albums, and collaborated with",
    "developer Twilight Frontier on seven official Touhou spin-offs, most being fighting games.[3]",
    "🐱",
];

/// Segment every sample text; fails on the first tokenizer error.
pub fn generate_test_cases(source: TokenizerSource<'_>) -> Result<Vec<(String, Vec<String>)>, ExportError> {
    SAMPLE_TEXT
        .iter()
        .map(|text| Ok((text.to_string(), source.tokenize(text)?)))
        .collect()
}

pub fn write_test_cases<W: Write>(
    w: &mut W,
    cases: &[(String, Vec<String>)],
) -> Result<(), ExportError> {
    for (text, pieces) in cases {
        writeln!(w, "{}\t{}", text, pieces.join(" "))?;
    }
    Ok(())
}
