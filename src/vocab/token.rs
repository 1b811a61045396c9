//! Vocabulary entries and their flag bits.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitset over {UNK, CONTROL, BYTE, UNUSED}, stored as one byte on disk.
///
/// Bits are independent: a special token can be both CONTROL and UNK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TokenFlags(u8);

impl TokenFlags {
    pub const NONE: TokenFlags = TokenFlags(0);
    pub const UNK: TokenFlags = TokenFlags(1);
    pub const CONTROL: TokenFlags = TokenFlags(2);
    pub const BYTE: TokenFlags = TokenFlags(4);
    pub const UNUSED: TokenFlags = TokenFlags(8);

    const NAMED: [(TokenFlags, &'static str); 4] = [
        (Self::UNK, "UNK"),
        (Self::CONTROL, "CONTROL"),
        (Self::BYTE, "BYTE"),
        (Self::UNUSED, "UNUSED"),
    ];

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Keeps unknown bits so a decoded file re-encodes unchanged.
    #[inline]
    pub const fn from_bits_retain(bits: u8) -> Self {
        TokenFlags(bits)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: TokenFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: TokenFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for TokenFlags {
    type Output = TokenFlags;

    fn bitor(self, rhs: TokenFlags) -> TokenFlags {
        TokenFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for TokenFlags {
    fn bitor_assign(&mut self, rhs: TokenFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for TokenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join("|"))
    }
}

/// Placeholder piece for ids no source token claims.
pub const UNUSED_PIECE: &[u8] = b"<UNUSED>";

/// One vocabulary entry; `id` is its index in the final table.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub id: u32,
    pub flags: TokenFlags,
    /// Raw bytes the token decodes to.
    pub piece: Vec<u8>,
    /// Surface form for diagnostics.
    pub piece_display: String,
    pub weight: f32,
}

impl Token {
    pub fn new(
        id: u32,
        flags: TokenFlags,
        piece: Vec<u8>,
        piece_display: impl Into<String>,
        weight: f32,
    ) -> Self {
        Self {
            id,
            flags,
            piece,
            piece_display: piece_display.into(),
            weight,
        }
    }

    /// Filler for a slot no source token claims.
    pub fn unused(id: u32) -> Self {
        Self::new(
            id,
            TokenFlags::UNUSED,
            UNUSED_PIECE.to_vec(),
            String::from_utf8_lossy(UNUSED_PIECE),
            0.0,
        )
    }

    /// Special token: control flag, no bytes, zero weight.
    pub fn control(id: u32, piece_display: impl Into<String>) -> Self {
        Self::new(id, TokenFlags::CONTROL, Vec::new(), piece_display, 0.0)
    }

    #[inline]
    pub fn is_unused(&self) -> bool {
        self.flags.contains(TokenFlags::UNUSED)
    }

    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.flags.contains(TokenFlags::UNK)
    }

    #[inline]
    pub fn is_control(&self) -> bool {
        self.flags.contains(TokenFlags::CONTROL)
    }

    #[inline]
    pub fn is_byte(&self) -> bool {
        self.flags.contains(TokenFlags::BYTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_match_wire_values() {
        assert_eq!(TokenFlags::UNK.bits(), 1);
        assert_eq!(TokenFlags::CONTROL.bits(), 2);
        assert_eq!(TokenFlags::BYTE.bits(), 4);
        assert_eq!(TokenFlags::UNUSED.bits(), 8);
    }

    #[test]
    fn flags_combine() {
        let mut f = TokenFlags::CONTROL;
        f |= TokenFlags::UNK;
        assert!(f.contains(TokenFlags::UNK));
        assert!(f.contains(TokenFlags::CONTROL));
        assert!(!f.contains(TokenFlags::BYTE));
        assert_eq!(f.bits(), 3);
        assert_eq!(f.to_string(), "UNK|CONTROL");
        assert_eq!(TokenFlags::NONE.to_string(), "NONE");
    }

    #[test]
    fn unused_token() {
        let t = Token::unused(7);
        assert!(t.is_unused());
        assert_eq!(t.piece, b"<UNUSED>");
        assert_eq!(t.weight, 0.0);
    }
}
