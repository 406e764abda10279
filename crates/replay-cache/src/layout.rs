//! Directory layout shared by the file-backed caches

use replay_storage::{ReplayKey, Ruleset};
use std::path::PathBuf;

/// Where cached replays live on disk.
///
/// Solo replays use `base_dir`; legacy replays use one directory per ruleset
/// formatted from `legacy_dir_template`.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    base_dir: PathBuf,
    legacy_dir_template: String,
}

impl CacheLayout {
    pub fn new(base_dir: impl Into<PathBuf>, legacy_dir_template: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            legacy_dir_template: legacy_dir_template.into(),
        }
    }

    pub fn directory(&self, key: &ReplayKey) -> PathBuf {
        if key.legacy {
            PathBuf::from(key.ruleset.format_template(&self.legacy_dir_template))
        } else {
            self.base_dir.clone()
        }
    }

    /// Every top-level cache directory: solo first, then each legacy ruleset
    pub fn roots(&self) -> Vec<PathBuf> {
        std::iter::once(self.base_dir.clone())
            .chain(
                Ruleset::ALL
                    .iter()
                    .map(|ruleset| PathBuf::from(ruleset.format_template(&self.legacy_dir_template))),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directories() {
        let layout = CacheLayout::new("/cache/solo", "/cache/legacy/{ruleset}");

        assert_eq!(
            layout.directory(&ReplayKey::solo(1, Ruleset::Taiko)),
            PathBuf::from("/cache/solo")
        );
        assert_eq!(
            layout.directory(&ReplayKey::legacy(1, Ruleset::Taiko)),
            PathBuf::from("/cache/legacy/taiko")
        );
    }

    #[test]
    fn test_roots() {
        let layout = CacheLayout::new("/cache/solo", "/cache/legacy/{ruleset}");
        let roots = layout.roots();

        assert_eq!(roots.len(), 5);
        assert_eq!(roots[0], PathBuf::from("/cache/solo"));
        assert_eq!(roots[4], PathBuf::from("/cache/legacy/mania"));
    }
}
