//! Parse a legacy replay back into its header fields

use crate::encoding::{from_ticks, NULL_MARKER, STRING_MARKER};
use crate::error::{LegacyReplayError, Result};
use chrono::{DateTime, Utc};

/// A legacy replay split into its header fields and frame data
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyReplay {
    pub ruleset_id: u8,
    pub score_version: i32,
    pub beatmap_checksum: Option<String>,
    pub username: Option<String>,
    pub score_checksum: [u8; 16],
    pub count300: u16,
    pub count100: u16,
    pub count50: u16,
    pub count_geki: u16,
    pub count_katu: u16,
    pub count_miss: u16,
    pub total_score: i32,
    pub max_combo: u16,
    pub perfect: bool,
    pub enabled_mods: i32,
    pub life_bar_graph: Option<String>,
    pub date: DateTime<Utc>,
    pub frames: Vec<u8>,
    pub score_id: u64,
}

impl LegacyReplay {
    /// Parse a complete replay. Trailing bytes after the score id are rejected.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader { bytes, pos: 0 };

        let replay = LegacyReplay {
            ruleset_id: reader.u8()?,
            score_version: reader.i32()?,
            beatmap_checksum: reader.string()?,
            username: reader.string()?,
            score_checksum: reader.array()?,
            count300: reader.u16()?,
            count100: reader.u16()?,
            count50: reader.u16()?,
            count_geki: reader.u16()?,
            count_katu: reader.u16()?,
            count_miss: reader.u16()?,
            total_score: reader.i32()?,
            max_combo: reader.u16()?,
            perfect: reader.u8()? != 0,
            enabled_mods: reader.i32()?,
            life_bar_graph: reader.string()?,
            date: reader.date_time()?,
            frames: reader.byte_array()?,
            score_id: reader.u64()?,
        };

        if reader.pos != bytes.len() {
            return Err(LegacyReplayError::TrailingData(bytes.len() - reader.pos));
        }

        Ok(replay)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(LegacyReplayError::UnexpectedEof(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn uleb128(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.u8()?;
            if shift >= 64 {
                return Err(LegacyReplayError::InvalidLength(self.pos));
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn string(&mut self) -> Result<Option<String>> {
        let at = self.pos;
        match self.u8()? {
            NULL_MARKER => Ok(None),
            STRING_MARKER => {
                let len = usize::try_from(self.uleb128()?)
                    .map_err(|_| LegacyReplayError::InvalidLength(at))?;
                let raw = self.take(len)?;
                String::from_utf8(raw.to_vec())
                    .map(Some)
                    .map_err(|_| LegacyReplayError::InvalidUtf8(at))
            }
            other => Err(LegacyReplayError::UnknownStringMarker(other, at)),
        }
    }

    fn byte_array(&mut self) -> Result<Vec<u8>> {
        let at = self.pos;
        let len = self.i32()?;
        if len < 0 {
            return Ok(Vec::new());
        }
        let len = usize::try_from(len).map_err(|_| LegacyReplayError::InvalidLength(at))?;
        Ok(self.take(len)?.to_vec())
    }

    fn date_time(&mut self) -> Result<DateTime<Utc>> {
        let at = self.pos;
        let ticks = self.i64()?;
        from_ticks(ticks).ok_or(LegacyReplayError::InvalidDate(at))
    }
}
