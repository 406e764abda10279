//! Errors raised while parsing a legacy replay

use std::fmt;

/// Offsets are byte positions in the input where the problem was found
#[derive(Debug)]
pub enum LegacyReplayError {
    UnexpectedEof(usize),
    UnknownStringMarker(u8, usize),
    InvalidUtf8(usize),
    InvalidLength(usize),
    InvalidDate(usize),
    TrailingData(usize),
}

impl fmt::Display for LegacyReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegacyReplayError::UnexpectedEof(at) => {
                write!(f, "Unexpected end of replay at byte {}", at)
            }
            LegacyReplayError::UnknownStringMarker(marker, at) => {
                write!(f, "Unknown string marker 0x{:02x} at byte {}", marker, at)
            }
            LegacyReplayError::InvalidUtf8(at) => write!(f, "Invalid UTF-8 string at byte {}", at),
            LegacyReplayError::InvalidLength(at) => write!(f, "Invalid length at byte {}", at),
            LegacyReplayError::InvalidDate(at) => write!(f, "Invalid date at byte {}", at),
            LegacyReplayError::TrailingData(len) => {
                write!(f, "{} unexpected bytes after score id", len)
            }
        }
    }
}

impl std::error::Error for LegacyReplayError {}

pub type Result<T> = std::result::Result<T, LegacyReplayError>;
