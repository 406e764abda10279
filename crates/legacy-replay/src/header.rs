//! Assemble a complete legacy replay from stored frames and score metadata

use crate::encoding::Writer;
use md5::{Digest, Md5};
use replay_db::{Beatmap, HighScore, User};

/// Score format version written when the database has none recorded for a
/// score. It is the oldest format the legacy client understands.
pub const DEFAULT_SCORE_VERSION: i32 = 20151228;

const HEADER_SIZE_HINT: usize = 96;

/// Checksum identifying the score inside the replay header.
///
/// MD5 over `{max_combo}osu{username}{beatmap_checksum}{score}{rank}`.
pub fn score_checksum(score: &HighScore, user: &User, beatmap: &Beatmap) -> [u8; 16] {
    let input = format!(
        "{}osu{}{}{}{}",
        score.max_combo, user.username, beatmap.checksum, score.score, score.rank
    );
    Md5::digest(input.as_bytes()).into()
}

/// Prefix raw frame data with a legacy replay header.
///
/// The output is the header fields in their fixed order, the frames as a
/// length-prefixed block, then the score id. Nothing follows the score id.
pub fn build(
    frames: &[u8],
    ruleset_id: u8,
    score_version: Option<i32>,
    score: &HighScore,
    user: &User,
    beatmap: &Beatmap,
) -> Vec<u8> {
    let mut writer = Writer::with_capacity(
        HEADER_SIZE_HINT + beatmap.checksum.len() + user.username.len() + frames.len(),
    );

    writer.u8(ruleset_id);
    writer.i32(score_version.unwrap_or(DEFAULT_SCORE_VERSION));
    writer.string(&beatmap.checksum);
    writer.string(&user.username);
    writer.raw(&score_checksum(score, user, beatmap));

    writer.u16(score.count300);
    writer.u16(score.count100);
    writer.u16(score.count50);
    writer.u16(score.count_geki);
    writer.u16(score.count_katu);
    writer.u16(score.count_miss);

    writer.i32(score.score);
    writer.u16(score.max_combo);
    writer.bool(score.perfect);
    writer.i32(score.enabled_mods);

    // life bar graph, never recorded for stored scores
    writer.string("");
    writer.date_time(score.date);

    writer.byte_array(frames);
    writer.u64(score.score_id);

    writer.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_score() -> HighScore {
        HighScore {
            score_id: 4501250208,
            beatmap_id: 1,
            user_id: 11315329,
            score: 13160096,
            max_combo: 724,
            rank: "S".to_string(),
            count50: 0,
            count100: 3,
            count300: 525,
            count_miss: 0,
            count_geki: 105,
            count_katu: 3,
            perfect: true,
            enabled_mods: 64,
            date: Utc.with_ymd_and_hms(2023, 9, 4, 21, 10, 42).unwrap(),
            replay: true,
        }
    }

    fn sample_user() -> User {
        User {
            username: "tsunyoku".to_string(),
        }
    }

    fn sample_beatmap() -> Beatmap {
        Beatmap {
            checksum: "5d370b1b0483f4fc7c64bff0ade06c0f".to_string(),
        }
    }

    #[test]
    fn test_score_checksum_matches_md5_of_fields() {
        let checksum = score_checksum(&sample_score(), &sample_user(), &sample_beatmap());
        let expected = Md5::digest(b"724osutsunyoku5d370b1b0483f4fc7c64bff0ade06c0f13160096S");
        assert_eq!(hex::encode(checksum), hex::encode(expected));
    }

    #[test]
    fn test_header_prefix_layout() {
        let bytes = build(
            b"",
            0,
            Some(20250628),
            &sample_score(),
            &sample_user(),
            &sample_beatmap(),
        );

        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..5], &20250628i32.to_le_bytes());
        assert_eq!(bytes[5], 0x0b);
        assert_eq!(bytes[6], 32);
        assert_eq!(&bytes[7..39], b"5d370b1b0483f4fc7c64bff0ade06c0f");
        assert_eq!(&bytes[39..41], &[0x0bu8, 8]);
        assert_eq!(&bytes[41..49], b"tsunyoku");
    }

    #[test]
    fn test_missing_version_uses_default() {
        let bytes = build(
            b"frames",
            1,
            None,
            &sample_score(),
            &sample_user(),
            &sample_beatmap(),
        );
        assert_eq!(&bytes[1..5], &DEFAULT_SCORE_VERSION.to_le_bytes());
    }

    #[test]
    fn test_ends_with_score_id() {
        let bytes = build(
            b"frames",
            0,
            None,
            &sample_score(),
            &sample_user(),
            &sample_beatmap(),
        );
        let tail = &bytes[bytes.len() - 8..];
        assert_eq!(tail, &4501250208u64.to_le_bytes());

        let frames_start = bytes.len() - 8 - 6;
        assert_eq!(&bytes[frames_start..bytes.len() - 8], b"frames");
        assert_eq!(
            &bytes[frames_start - 4..frames_start],
            &6i32.to_le_bytes()
        );
    }
}
