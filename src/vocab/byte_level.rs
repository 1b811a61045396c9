//! Reversible byte ↔ printable-character alphabet used by byte-level BPE
//! vocabularies (GPT-2 and descendants).
//!
//! Printable Latin-1 bytes map to themselves; the remaining 68 bytes map to
//! U+0100 onward in byte order, so a space becomes `Ġ` (U+0120) and a newline
//! `Ċ` (U+010A).

use std::collections::HashMap;

fn is_printable(b: u8) -> bool {
    matches!(b, b'!'..=b'~' | 0xA1..=0xAC | 0xAE..=0xFF)
}

/// Character for every byte value.
pub fn byte_encoder() -> [char; 256] {
    let mut table = ['\0'; 256];
    let mut next = 0u32;
    for b in 0..=255u8 {
        table[b as usize] = if is_printable(b) {
            b as char
        } else {
            let ch = char::from_u32(256 + next).unwrap_or('\u{FFFD}');
            next += 1;
            ch
        };
    }
    table
}

/// Inverse of [`byte_encoder`].
pub fn byte_decoder() -> HashMap<char, u8> {
    byte_encoder()
        .iter()
        .enumerate()
        .map(|(b, &ch)| (ch, b as u8))
        .collect()
}

/// Surface form of raw bytes.
pub fn encode_bytes(bytes: &[u8]) -> String {
    let table = byte_encoder();
    bytes.iter().map(|&b| table[b as usize]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_chars() {
        let enc = byte_encoder();
        assert_eq!(enc[b' ' as usize], 'Ġ');
        assert_eq!(enc[b'\n' as usize], 'Ċ');
        assert_eq!(enc[b'A' as usize], 'A');
        assert_eq!(enc[0], '\u{0100}');
        assert_eq!(enc[0xAD], '\u{0143}');
    }

    #[test]
    fn decoder_is_bijective() {
        let dec = byte_decoder();
        assert_eq!(dec.len(), 256);
        for (b, ch) in byte_encoder().iter().enumerate() {
            assert_eq!(dec[ch] as usize, b);
        }
    }

    #[test]
    fn encode_multibyte() {
        assert_eq!(encode_bytes(" é".as_bytes()), "ĠÃ©");
    }
}
