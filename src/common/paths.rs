use std::path::{Path, PathBuf};
use std::fs;
use directories::ProjectDirs;
use crate::common::error::{FaceLockError, Result};
use crate::core::identity::Identity;

pub const SAMPLES_DIR: &str = "samples";
pub const MODELS_DIR: &str = "models";
pub const KEYS_DIR: &str = "keys";
pub const MODEL_FILE: &str = "model.bin";
pub const INDEX_FILE: &str = "index.map";
pub const KEY_EXTENSION: &str = "key";

pub enum RunMode {
    Local(PathBuf),  // Explicit data directory (defaults to ./data)
    User,            // Per-user platform data directory
}

/// Persisted state layout shared by every phase.
///
/// ```text
/// <root>/samples/<identity>/<n>.png
/// <root>/models/model.bin
/// <root>/models/index.map
/// <root>/keys/<identity>.key
/// ```
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_mode(mode: RunMode) -> Result<Self> {
        match mode {
            RunMode::Local(root) => Ok(Self::new(root)),
            RunMode::User => {
                let dirs = ProjectDirs::from("org", "facelock", "FaceLock")
                    .ok_or_else(|| FaceLockError::Storage("Failed to get project dirs".into()))?;
                Ok(Self::new(dirs.data_dir()))
            }
        }
    }

    /// Create the top-level directories. Identity directories stay lazy.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.samples_dir())?;
        fs::create_dir_all(self.models_dir())?;
        fs::create_dir_all(self.keys_dir())?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn samples_dir(&self) -> PathBuf {
        self.root.join(SAMPLES_DIR)
    }

    pub fn identity_samples_dir(&self, identity: &Identity) -> PathBuf {
        self.samples_dir().join(identity.as_str())
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join(MODELS_DIR)
    }

    pub fn model_file(&self) -> PathBuf {
        self.models_dir().join(MODEL_FILE)
    }

    pub fn index_file(&self) -> PathBuf {
        self.models_dir().join(INDEX_FILE)
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.root.join(KEYS_DIR)
    }

    pub fn key_file(&self, identity: &Identity) -> PathBuf {
        self.keys_dir().join(format!("{}.{}", identity.as_str(), KEY_EXTENSION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_documented_tree() {
        let layout = DataLayout::new("/var/lib/facelock");
        let alice = Identity::new("alice").unwrap();

        assert_eq!(layout.identity_samples_dir(&alice), PathBuf::from("/var/lib/facelock/samples/alice"));
        assert_eq!(layout.model_file(), PathBuf::from("/var/lib/facelock/models/model.bin"));
        assert_eq!(layout.index_file(), PathBuf::from("/var/lib/facelock/models/index.map"));
        assert_eq!(layout.key_file(&alice), PathBuf::from("/var/lib/facelock/keys/alice.key"));
    }

    #[test]
    fn ensure_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path().join("data"));
        layout.ensure().unwrap();

        assert!(layout.samples_dir().is_dir());
        assert!(layout.models_dir().is_dir());
        assert!(layout.keys_dir().is_dir());
    }
}
