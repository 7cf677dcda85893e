use crate::common::{Config, DataLayout, FaceLockError, Result};
use crate::core::identity::Identity;
use image::{DynamicImage, GrayImage, ImageOutputFormat};
use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

const SAMPLE_EXTENSION: &str = "png";

/// A stored, normalized sample. Immutable once written.
#[derive(Debug, Clone)]
pub struct Sample {
    pub identity: Identity,
    pub index: u32,
    pub image: GrayImage,
}

/// Append-only, per-identity store of normalized samples.
///
/// An identity exists in the store iff at least one sample file exists in
/// its directory; the directory is created on the first `store`.
pub struct SampleStore {
    samples_dir: PathBuf,
    width: u32,
    height: u32,
}

impl SampleStore {
    pub fn new(layout: &DataLayout, config: &Config) -> Self {
        Self::with_size(layout.samples_dir(), config.sample.width, config.sample.height)
    }

    pub fn with_size(samples_dir: PathBuf, width: u32, height: u32) -> Self {
        Self { samples_dir, width, height }
    }

    pub fn sample_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn identity_dir(&self, identity: &Identity) -> PathBuf {
        self.samples_dir.join(identity.as_str())
    }

    /// Append a sample for `identity`, returning its index. Existing samples
    /// are never overwritten.
    pub fn store(&self, identity: &Identity, image: &GrayImage) -> Result<u32> {
        if image.dimensions() != (self.width, self.height) {
            return Err(FaceLockError::InvalidSample(format!(
                "expected {}x{}, got {}x{}",
                self.width, self.height, image.width(), image.height()
            )));
        }

        let dir = self.identity_dir(identity);
        fs::create_dir_all(&dir)?;

        let mut encoded = Vec::new();
        DynamicImage::ImageLuma8(image.clone())
            .write_to(&mut Cursor::new(&mut encoded), ImageOutputFormat::Png)?;

        loop {
            let index = sample_indices(&dir)?.last().map_or(0, |last| last + 1);
            let target = dir.join(format!("{}.{}", index, SAMPLE_EXTENSION));

            let mut temp = tempfile::Builder::new()
                .prefix(".sample-")
                .tempfile_in(&dir)?;
            temp.write_all(&encoded)?;
            temp.as_file().sync_all()?;

            match temp.persist_noclobber(&target) {
                Ok(_) => {
                    tracing::debug!("Stored sample {} for {}", index, identity);
                    return Ok(index);
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.error.into()),
            }
        }
    }

    /// All samples of `identity` in index order; empty if none were stored.
    pub fn list(&self, identity: &Identity) -> Result<Vec<Sample>> {
        let dir = self.identity_dir(identity);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut samples = Vec::new();
        for index in sample_indices(&dir)? {
            let path = dir.join(format!("{}.{}", index, SAMPLE_EXTENSION));
            let image = image::open(&path)?.to_luma8();
            if image.dimensions() != (self.width, self.height) {
                return Err(FaceLockError::InvalidSample(format!(
                    "{} is {}x{}, expected {}x{}",
                    path.display(), image.width(), image.height(), self.width, self.height
                )));
            }
            samples.push(Sample { identity: identity.clone(), index, image });
        }
        Ok(samples)
    }

    pub fn count(&self, identity: &Identity) -> Result<usize> {
        let dir = self.identity_dir(identity);
        if !dir.is_dir() {
            return Ok(0);
        }
        Ok(sample_indices(&dir)?.len())
    }

    /// Identities with at least one stored sample, in lexicographic order.
    pub fn list_identities(&self) -> Result<BTreeSet<Identity>> {
        let mut identities = BTreeSet::new();
        if !self.samples_dir.is_dir() {
            return Ok(identities);
        }

        for entry in fs::read_dir(&self.samples_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::warn!("Skipping non UTF-8 sample directory {:?}", entry.path());
                continue;
            };
            let identity = match Identity::new(name) {
                Ok(identity) => identity,
                Err(e) => {
                    tracing::warn!("Skipping sample directory {:?}: {}", entry.path(), e);
                    continue;
                }
            };
            if !sample_indices(&entry.path())?.is_empty() {
                identities.insert(identity);
            }
        }
        Ok(identities)
    }
}

/// Sorted indices of `<n>.png` files in `dir`. Anything else is ignored.
fn sample_indices(dir: &Path) -> Result<Vec<u32>> {
    let mut indices = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SAMPLE_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        // Only the canonical spelling counts: `07.png` is not sample 7.
        match stem.parse::<u32>() {
            Ok(index) if index.to_string() == stem => indices.push(index),
            _ => {}
        }
    }
    indices.sort_unstable();
    Ok(indices)
}
