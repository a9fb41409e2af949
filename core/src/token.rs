//! Tag identifiers.
//!
//! A reader reports the raw ISO14443A UID: 4 bytes for single-size UIDs, 7 for
//! double-size (NTAG). Everything above the reader uses the canonical form,
//! two uppercase hex digits per byte, so a 4-byte UID becomes an 8-character
//! id and a 7-byte UID a 14-character one.

use core::fmt::{self, Write};

use heapless::{String, Vec};
use thiserror::Error;

/// Longest UID a reader may report (triple-size ISO14443A).
pub const MAX_UID_LEN: usize = 10;

/// Raw UID bytes as returned by a reader poll.
pub type RawId = Vec<u8, MAX_UID_LEN>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenIdError {
    #[error("UID of {0} bytes exceeds the {MAX_UID_LEN}-byte maximum")]
    TooLong(usize),

    #[error("UID must be hex digits, two per byte")]
    InvalidHex,
}

/// Canonical tag id. The empty id means "no tag".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TokenId(String<{ MAX_UID_LEN * 2 }>);

impl TokenId {
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// Render raw UID bytes as uppercase, zero-padded hex.
    pub fn from_raw(raw: &[u8]) -> Result<Self, TokenIdError> {
        if raw.len() > MAX_UID_LEN {
            return Err(TokenIdError::TooLong(raw.len()));
        }
        let mut id = String::new();
        for byte in raw {
            write!(id, "{byte:02X}").map_err(|_| TokenIdError::TooLong(raw.len()))?;
        }
        Ok(Self(id))
    }

    /// Parse a hex UID in either case, e.g. `04a1b2c3`.
    pub fn parse(text: &str) -> Result<Self, TokenIdError> {
        let raw = parse_uid(text)?;
        Self::from_raw(&raw)
    }

    /// Raw UID bytes behind this id.
    pub fn to_raw(&self) -> RawId {
        // Canonical ids are always valid hex of bounded length.
        parse_uid(&self.0).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of UID bytes this id was rendered from.
    pub fn uid_len(&self) -> usize {
        self.0.len() / 2
    }
}

impl From<&RawId> for TokenId {
    fn from(raw: &RawId) -> Self {
        // A RawId never holds more than MAX_UID_LEN bytes, so this cannot fail.
        Self::from_raw(raw).unwrap_or_default()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decode a hex UID (either case) into raw bytes.
pub fn parse_uid(text: &str) -> Result<RawId, TokenIdError> {
    let text = text.trim();
    if text.len() % 2 != 0 {
        return Err(TokenIdError::InvalidHex);
    }
    let digits = text.as_bytes();
    let mut raw = RawId::new();
    for pair in digits.chunks_exact(2) {
        let byte = (hex_value(pair[0])? << 4) | hex_value(pair[1])?;
        raw.push(byte).map_err(|_| TokenIdError::TooLong(digits.len() / 2))?;
    }
    Ok(raw)
}

fn hex_value(digit: u8) -> Result<u8, TokenIdError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(TokenIdError::InvalidHex),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_is_uppercase_and_zero_padded() {
        let id = TokenId::from_raw(&[0x04, 0xa1, 0x0b, 0xff]).unwrap();
        assert_eq!(id.as_str(), "04A10BFF");
        assert_eq!(id.uid_len(), 4);
    }

    #[test]
    fn seven_byte_uid_renders_fourteen_chars() {
        let id = TokenId::from_raw(&[0x04, 0x5e, 0x21, 0x9a, 0x6b, 0x11, 0x90]).unwrap();
        assert_eq!(id.as_str(), "045E219A6B1190");
        assert_eq!(id.uid_len(), 7);
    }

    #[test]
    fn parse_accepts_lowercase() {
        let id = TokenId::parse("aa11").unwrap();
        assert_eq!(id.as_str(), "AA11");
        assert_eq!(id.to_raw().as_slice(), &[0xAA, 0x11]);
    }

    #[test]
    fn parse_rejects_odd_length_and_non_hex() {
        assert_eq!(TokenId::parse("ABC"), Err(TokenIdError::InvalidHex));
        assert_eq!(TokenId::parse("ZZ"), Err(TokenIdError::InvalidHex));
    }

    #[test]
    fn oversized_uid_is_rejected() {
        assert_eq!(TokenId::from_raw(&[0u8; 11]), Err(TokenIdError::TooLong(11)));
        assert_eq!(parse_uid("0011223344556677889900"), Err(TokenIdError::TooLong(11)));
    }

    #[test]
    fn empty_id() {
        let id = TokenId::empty();
        assert!(id.is_empty());
        assert!(id.to_raw().is_empty());
        assert_eq!(TokenId::from_raw(&[]).unwrap(), id);
    }
}
