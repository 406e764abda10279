//! Ruleset ids and the names, tables and directories derived from them

use crate::error::{Result, StorageError};
use std::fmt;

/// One of the four legacy rulesets, identified by a small integer id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ruleset {
    Osu,
    Taiko,
    Fruits,
    Mania,
}

impl Ruleset {
    pub const ALL: [Ruleset; 4] = [Ruleset::Osu, Ruleset::Taiko, Ruleset::Fruits, Ruleset::Mania];

    /// Resolve a ruleset from its legacy id (0..=3)
    pub fn from_id(id: u16) -> Result<Self> {
        match id {
            0 => Ok(Ruleset::Osu),
            1 => Ok(Ruleset::Taiko),
            2 => Ok(Ruleset::Fruits),
            3 => Ok(Ruleset::Mania),
            other => Err(StorageError::InvalidRuleset(other)),
        }
    }

    pub fn id(self) -> u16 {
        match self {
            Ruleset::Osu => 0,
            Ruleset::Taiko => 1,
            Ruleset::Fruits => 2,
            Ruleset::Mania => 3,
        }
    }

    /// Canonical short name, used in file names, paths and bucket names
    pub fn name(self) -> &'static str {
        match self {
            Ruleset::Osu => "osu",
            Ruleset::Taiko => "taiko",
            Ruleset::Fruits => "fruits",
            Ruleset::Mania => "mania",
        }
    }

    /// Table holding legacy high scores for this ruleset
    pub fn legacy_high_score_table(self) -> String {
        format!("osu_scores{}_high", self.table_suffix())
    }

    /// Table holding legacy replay metadata (view counts, score version)
    pub fn legacy_replay_table(self) -> String {
        format!("osu_replays{}", self.table_suffix())
    }

    /// Substitute the ruleset name into a per-ruleset path or bucket template.
    ///
    /// Both `{ruleset}` and the positional `{0}` placeholder are accepted.
    pub fn format_template(self, template: &str) -> String {
        template
            .replace("{ruleset}", self.name())
            .replace("{0}", self.name())
    }

    fn table_suffix(self) -> String {
        match self {
            Ruleset::Osu => String::new(),
            other => format!("_{}", other.name()),
        }
    }
}

impl fmt::Display for Ruleset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u16> for Ruleset {
    type Error = StorageError;

    fn try_from(id: u16) -> Result<Self> {
        Ruleset::from_id(id)
    }
}
