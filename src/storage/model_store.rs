use crate::common::{DataLayout, FaceLockError, Result};
use crate::core::identity::{Identity, IdentityIndex};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const INDEX_VERSION: u32 = 1;

/// On-disk form of `index.map`. `model_digest` ties it to exactly one
/// `model.bin`, so a model and an index from different runs never load
/// together.
#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    trained_at: DateTime<Utc>,
    identities: Vec<Identity>,
    sample_counts: Vec<u32>,
    model_digest: [u8; 32],
}

/// A classifier model together with the identity index it was trained with.
#[derive(Debug, Clone)]
pub struct TrainedModel<M> {
    pub model: M,
    pub index: IdentityIndex,
    pub trained_at: DateTime<Utc>,
    /// Samples per identity, in label order.
    pub sample_counts: Vec<u32>,
}

pub struct ModelStore {
    models_dir: PathBuf,
    model_file: PathBuf,
    index_file: PathBuf,
}

impl ModelStore {
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            models_dir: layout.models_dir(),
            model_file: layout.model_file(),
            index_file: layout.index_file(),
        }
    }

    /// True when a model/index pair is present (not necessarily valid).
    pub fn exists(&self) -> bool {
        self.model_file.exists() || self.index_file.exists()
    }

    /// Persist model and index as one unit: both are staged as temp files
    /// and renamed model first, index last.
    pub fn save<M: Serialize>(&self, trained: &TrainedModel<M>) -> Result<()> {
        if trained.sample_counts.len() != trained.index.len() {
            return Err(FaceLockError::Storage(format!(
                "{} sample counts for {} identities",
                trained.sample_counts.len(), trained.index.len()
            )));
        }

        fs::create_dir_all(&self.models_dir)?;

        let model_bytes = bincode::serialize(&trained.model)
            .map_err(|e| FaceLockError::Storage(format!("Failed to serialize model: {}", e)))?;
        let index = IndexFile {
            version: INDEX_VERSION,
            trained_at: trained.trained_at,
            identities: trained.index.identities().to_vec(),
            sample_counts: trained.sample_counts.clone(),
            model_digest: Sha256::digest(&model_bytes).into(),
        };
        let index_bytes = bincode::serialize(&index)
            .map_err(|e| FaceLockError::Storage(format!("Failed to serialize index: {}", e)))?;

        let model_temp = self.stage(&model_bytes)?;
        let index_temp = self.stage(&index_bytes)?;

        model_temp.persist(&self.model_file).map_err(|e| e.error)?;
        index_temp.persist(&self.index_file).map_err(|e| e.error)?;

        tracing::info!(
            "Saved model ({} bytes) and index ({} identities) to {}",
            model_bytes.len(), trained.index.len(), self.models_dir.display()
        );
        Ok(())
    }

    pub fn load<M: DeserializeOwned>(&self) -> Result<TrainedModel<M>> {
        match (self.model_file.exists(), self.index_file.exists()) {
            (false, false) => return Err(FaceLockError::ModelNotTrained),
            (true, false) => {
                return Err(FaceLockError::ModelCorrupt(format!(
                    "{} exists without {}", self.model_file.display(), self.index_file.display()
                )))
            }
            (false, true) => {
                return Err(FaceLockError::ModelCorrupt(format!(
                    "{} exists without {}", self.index_file.display(), self.model_file.display()
                )))
            }
            (true, true) => {}
        }

        let index: IndexFile = bincode::deserialize(&fs::read(&self.index_file)?)
            .map_err(|e| FaceLockError::ModelCorrupt(format!("unreadable index: {}", e)))?;
        if index.version != INDEX_VERSION {
            return Err(FaceLockError::ModelCorrupt(format!(
                "index version {} is not supported (expected {})", index.version, INDEX_VERSION
            )));
        }
        if index.sample_counts.len() != index.identities.len() {
            return Err(FaceLockError::ModelCorrupt("index sample counts do not match identities".into()));
        }

        let model_bytes = fs::read(&self.model_file)?;
        let digest: [u8; 32] = Sha256::digest(&model_bytes).into();
        if digest != index.model_digest {
            return Err(FaceLockError::ModelCorrupt(
                "model does not match its index (interrupted or mixed training run)".into(),
            ));
        }

        let model: M = bincode::deserialize(&model_bytes)
            .map_err(|e| FaceLockError::ModelCorrupt(format!("unreadable model: {}", e)))?;

        Ok(TrainedModel {
            model,
            index: IdentityIndex::from_ordered(index.identities)?,
            trained_at: index.trained_at,
            sample_counts: index.sample_counts,
        })
    }

    fn stage(&self, bytes: &[u8]) -> Result<NamedTempFile> {
        let mut temp = tempfile::Builder::new()
            .prefix(".model-")
            .tempfile_in(&self.models_dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        Ok(temp)
    }

    pub fn model_file(&self) -> &Path {
        &self.model_file
    }

    pub fn index_file(&self) -> &Path {
        &self.index_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained(names: &[&str], model: Vec<u8>) -> TrainedModel<Vec<u8>> {
        let identities = names.iter().map(|n| Identity::new(*n).unwrap()).collect();
        TrainedModel {
            model,
            index: IdentityIndex::from_ordered(identities).unwrap(),
            trained_at: Utc::now(),
            sample_counts: vec![10; names.len()],
        }
    }

    #[test]
    fn missing_pair_is_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(&DataLayout::new(dir.path()));
        assert!(!store.exists());
        assert!(matches!(store.load::<Vec<u8>>(), Err(FaceLockError::ModelNotTrained)));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(&DataLayout::new(dir.path()));
        let original = trained(&["alice", "bob"], vec![1, 2, 3]);
        store.save(&original).unwrap();

        let loaded: TrainedModel<Vec<u8>> = store.load().unwrap();
        assert_eq!(loaded.model, vec![1, 2, 3]);
        assert_eq!(loaded.index, original.index);
        assert_eq!(loaded.sample_counts, vec![10, 10]);
        assert_eq!(loaded.trained_at, original.trained_at);
    }

    #[test]
    fn model_from_another_run_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(&DataLayout::new(dir.path()));
        store.save(&trained(&["alice"], vec![1])).unwrap();
        let first_model = fs::read(store.model_file()).unwrap();

        store.save(&trained(&["alice", "bob"], vec![2, 2])).unwrap();
        fs::write(store.model_file(), first_model).unwrap();

        assert!(matches!(store.load::<Vec<u8>>(), Err(FaceLockError::ModelCorrupt(_))));
    }

    #[test]
    fn half_a_pair_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(&DataLayout::new(dir.path()));
        store.save(&trained(&["alice"], vec![9])).unwrap();
        fs::remove_file(store.index_file()).unwrap();

        assert!(store.exists());
        assert!(matches!(store.load::<Vec<u8>>(), Err(FaceLockError::ModelCorrupt(_))));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let store = ModelStore::new(&layout);
        store.save(&trained(&["alice"], vec![4])).unwrap();

        let mut names: Vec<String> = fs::read_dir(layout.models_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["index.map", "model.bin"]);
    }
}
