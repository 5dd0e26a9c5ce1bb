//! Resolves logical asset names to files in the cache directories.

use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use std::fs;
use std::path::PathBuf;

/// Looks assets up in a primary directory, then a fallback directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocator {
    primary: PathBuf,
    fallback: PathBuf,
    extension: String,
}

impl AssetLocator {
    /// Creates a locator.
    ///
    /// # Arguments
    ///
    /// * `primary` - Directory searched first (songs)
    /// * `fallback` - Directory searched second (jingles)
    /// * `extension` - File extension appended to names, without the dot
    pub fn new(
        primary: impl Into<PathBuf>,
        fallback: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
            extension: extension.into(),
        }
    }

    /// Creates a locator for the directories named in the configuration.
    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(
            &config.primary_dir,
            &config.fallback_dir,
            config.extension.as_str(),
        )
    }

    /// Candidate paths for `name`, in lookup order.
    pub fn candidates(&self, name: &str) -> [PathBuf; 2] {
        let file_name = if self.extension.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, self.extension)
        };
        [self.primary.join(&file_name), self.fallback.join(&file_name)]
    }

    /// Finds the file holding `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::NotFound`] if the file exists in neither
    /// directory, or if `name` would escape them (empty, contains a path
    /// separator or `..`).
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        if !is_plain_name(name) {
            return Err(PlayerError::NotFound {
                name: name.to_string(),
                searched: Vec::new(),
            });
        }

        let candidates = self.candidates(name);
        if let Some(found) = candidates.iter().find(|path| path.is_file()) {
            tracing::debug!("Resolved asset '{}' to {:?}", name, found);
            return Ok(found.clone());
        }

        Err(PlayerError::NotFound {
            name: name.to_string(),
            searched: candidates.to_vec(),
        })
    }

    /// Reads the raw bytes of `name`.
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        Ok(fs::read(path)?)
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs() -> (tempfile::TempDir, AssetLocator) {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("songs")).unwrap();
        fs::create_dir_all(root.path().join("jingles")).unwrap();
        let locator =
            AssetLocator::new(root.path().join("songs"), root.path().join("jingles"), "mid");
        (root, locator)
    }

    #[test]
    fn test_primary_wins() {
        let (root, locator) = dirs();
        fs::write(root.path().join("songs/theme.mid"), b"primary").unwrap();
        fs::write(root.path().join("jingles/theme.mid"), b"fallback").unwrap();

        assert_eq!(locator.read("theme").unwrap(), b"primary");
    }

    #[test]
    fn test_falls_back() {
        let (root, locator) = dirs();
        fs::write(root.path().join("jingles/levelup.mid"), b"jingle").unwrap();

        let path = locator.resolve("levelup").unwrap();
        assert_eq!(path, root.path().join("jingles/levelup.mid"));
    }

    #[test]
    fn test_not_found_reports_both_candidates() {
        let (_root, locator) = dirs();
        match locator.resolve("missing") {
            Err(PlayerError::NotFound { name, searched }) => {
                assert_eq!(name, "missing");
                assert_eq!(searched.len(), 2);
                assert!(searched[0].ends_with("songs/missing.mid"));
                assert!(searched[1].ends_with("jingles/missing.mid"));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_path_like_names() {
        let (root, locator) = dirs();
        fs::write(root.path().join("secret.mid"), b"x").unwrap();

        assert!(matches!(
            locator.resolve("../secret"),
            Err(PlayerError::NotFound { .. })
        ));
        assert!(matches!(locator.resolve(""), Err(PlayerError::NotFound { .. })));
        assert!(matches!(
            locator.resolve("a/b"),
            Err(PlayerError::NotFound { .. })
        ));
    }
}
