use crate::common::{FaceLockError, Result};
use crate::core::classifier::RawFrame;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "pgm", "tif", "tiff"];

/// Live sample acquisition.
///
/// `next_sample` may block until a frame is ready. `Ok(None)` means no frame
/// is available for this attempt; `Err` means the source itself failed.
pub trait SampleSource {
    fn next_sample(&mut self) -> Result<Option<RawFrame>>;
}

/// Replays the image files of a directory, in file-name order. Once the
/// files are used up every call reports unavailability.
pub struct ImageDirSource {
    frames: VecDeque<PathBuf>,
}

impl ImageDirSource {
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(FaceLockError::Capture(format!(
                "frame directory not found: {}", dir.display()
            )));
        }

        let mut frames = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_frame = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_frame && path.is_file() {
                frames.push(path);
            }
        }
        frames.sort();

        tracing::debug!("Found {} frames in {}", frames.len(), dir.display());
        Ok(Self::from_paths(frames))
    }

    pub fn from_paths(frames: Vec<PathBuf>) -> Self {
        Self { frames: frames.into() }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl SampleSource for ImageDirSource {
    fn next_sample(&mut self) -> Result<Option<RawFrame>> {
        let Some(path) = self.frames.pop_front() else {
            return Ok(None);
        };

        match image::open(&path) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => {
                tracing::warn!("Skipping unreadable frame {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}
