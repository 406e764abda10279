//! Primitive encoding shared by the header writer and reader
//!
//! Integers are little-endian. Strings are a `0x0b` marker, a ULEB128 byte
//! length and UTF-8 bytes; a lone `0x00` marks a null string. Date-times are
//! 64-bit tick counts (100 ns units since 0001-01-01T00:00:00Z).

use chrono::{DateTime, TimeZone, Utc};

pub(crate) const STRING_MARKER: u8 = 0x0b;
pub(crate) const NULL_MARKER: u8 = 0x00;

const TICKS_PER_SECOND: i64 = 10_000_000;
/// Seconds between 0001-01-01 and the Unix epoch
const EPOCH_OFFSET_SECS: i64 = 62_135_596_800;

/// Append-only buffer writing the legacy binary primitives
#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn string(&mut self, value: &str) {
        self.u8(STRING_MARKER);
        self.uleb128(value.len() as u64);
        self.raw(value.as_bytes());
    }

    /// Length-prefixed byte block (`i32` length)
    pub fn byte_array(&mut self, bytes: &[u8]) {
        self.i32(bytes.len() as i32);
        self.raw(bytes);
    }

    pub fn date_time(&mut self, value: DateTime<Utc>) {
        self.i64(to_ticks(value));
    }

    fn uleb128(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.u8(byte);
                break;
            }
            self.u8(byte | 0x80);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

pub(crate) fn to_ticks(value: DateTime<Utc>) -> i64 {
    (value.timestamp() + EPOCH_OFFSET_SECS) * TICKS_PER_SECOND
        + i64::from(value.timestamp_subsec_nanos() / 100)
}

pub(crate) fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let secs = ticks.div_euclid(TICKS_PER_SECOND) - EPOCH_OFFSET_SECS;
    let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_encoding() {
        let mut writer = Writer::default();
        writer.string("abc");
        assert_eq!(writer.into_bytes(), vec![0x0b, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_empty_string_encoding() {
        let mut writer = Writer::default();
        writer.string("");
        assert_eq!(writer.into_bytes(), vec![0x0b, 0x00]);
    }

    #[test]
    fn test_long_string_uses_multibyte_length() {
        let mut writer = Writer::default();
        writer.string(&"x".repeat(300));
        let bytes = writer.into_bytes();
        // 300 = 0b10_0101100 -> 0xac 0x02
        assert_eq!(&bytes[..3], &[0x0b, 0xac, 0x02]);
        assert_eq!(bytes.len(), 3 + 300);
    }

    #[test]
    fn test_unix_epoch_ticks() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(to_ticks(epoch), 621_355_968_000_000_000);
        assert_eq!(from_ticks(621_355_968_000_000_000), Some(epoch));
    }

    #[test]
    fn test_ticks_keep_sub_second_precision() {
        let date = Utc.timestamp_opt(1_693_861_842, 123_456_700).unwrap();
        assert_eq!(from_ticks(to_ticks(date)), Some(date));
    }

    #[test]
    fn test_byte_array_is_length_prefixed() {
        let mut writer = Writer::default();
        writer.byte_array(&[9, 8, 7]);
        assert_eq!(writer.into_bytes(), vec![3, 0, 0, 0, 9, 8, 7]);
    }
}
