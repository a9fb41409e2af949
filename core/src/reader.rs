//! Tag reader seam.
//!
//! The device only needs two primitives from the reader frontend (PN532 or
//! similar): identify the chip once at startup, then repeatedly wait up to a
//! timeout for an ISO14443A tag and return its UID.

use core::fmt;
use core::time::Duration;

use crate::token::RawId;

pub trait TokenReader {
    /// Packed firmware word, `None` when no chip answers.
    fn firmware_version(&mut self) -> Option<u32>;

    /// Wait up to `timeout` for a tag in the field and return its UID.
    fn poll(&mut self, timeout: Duration) -> Option<RawId>;
}

impl<R: TokenReader + ?Sized> TokenReader for &mut R {
    fn firmware_version(&mut self) -> Option<u32> {
        (**self).firmware_version()
    }

    fn poll(&mut self, timeout: Duration) -> Option<RawId> {
        (**self).poll(timeout)
    }
}

/// Decoded firmware word: `IC | Ver | Rev | Support`, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    pub chip: u8,
    pub major: u8,
    pub minor: u8,
}

impl ChipInfo {
    pub fn from_version_word(word: u32) -> Self {
        Self {
            chip: ((word >> 24) & 0xFF) as u8,
            major: ((word >> 16) & 0xFF) as u8,
            minor: ((word >> 8) & 0xFF) as u8,
        }
    }
}

impl fmt::Display for ChipInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PN5{:X} firmware {}.{}", self.chip, self.major, self.minor)
    }
}
