//! Identity of a stored replay

use crate::ruleset::Ruleset;
use std::fmt;

/// Identifies one replay blob in either storage tier.
///
/// Solo and legacy scores live in separate id spaces, so two keys that only
/// differ in `legacy` refer to unrelated replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplayKey {
    pub score_id: u64,
    pub ruleset: Ruleset,
    pub legacy: bool,
}

impl ReplayKey {
    pub fn solo(score_id: u64, ruleset: Ruleset) -> Self {
        Self {
            score_id,
            ruleset,
            legacy: false,
        }
    }

    pub fn legacy(score_id: u64, ruleset: Ruleset) -> Self {
        Self {
            score_id,
            ruleset,
            legacy: true,
        }
    }

    /// Prefix naming the kind of replay (`solo` or `legacy`)
    pub fn kind(&self) -> &'static str {
        if self.legacy {
            "legacy"
        } else {
            "solo"
        }
    }

    /// File or object name the blob is stored under
    pub fn file_name(&self) -> String {
        self.score_id.to_string()
    }
}

impl fmt::Display for ReplayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind(), self.ruleset, self.score_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let key = ReplayKey::legacy(42, Ruleset::Mania);
        assert_eq!(key.to_string(), "legacy/mania/42");
        assert_eq!(ReplayKey::solo(7, Ruleset::Osu).to_string(), "solo/osu/7");
    }

    #[test]
    fn test_legacy_flag_distinguishes_keys() {
        assert_ne!(
            ReplayKey::solo(1, Ruleset::Osu),
            ReplayKey::legacy(1, Ruleset::Osu)
        );
    }
}
