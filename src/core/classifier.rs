//! Capability seams for the biometric side of the pipeline.
//!
//! The region detector and the classifier are injected. The control logic
//! in the trainer and the authenticator only relies on the contracts below,
//! so deterministic fakes can stand in for the real algorithms in tests.

use image::{DynamicImage, GrayImage};
use serde::{de::DeserializeOwned, Serialize};
use crate::common::Result;
use crate::core::identity::Label;

/// A raw frame as delivered by a sample source.
pub type RawFrame = DynamicImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A detected biometric region, already normalized to the sample size.
#[derive(Debug, Clone)]
pub struct Region {
    pub bounds: RegionBounds,
    pub image: GrayImage,
}

pub trait RegionDetector {
    /// Zero or more normalized regions found in `frame`.
    fn detect_regions(&self, frame: &RawFrame) -> Result<Vec<Region>>;
}

/// Result of scoring one region: the closest label and its distance.
/// Lower distance means higher confidence; the scale is unbounded above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub label: Label,
    pub distance: f64,
}

pub trait Classifier {
    /// Trained artifact. Persisted by the model store, opaque to everything else.
    type Model: Serialize + DeserializeOwned;

    /// Train on `samples[i]` tagged with `labels[i]`.
    fn train(&self, samples: &[GrayImage], labels: &[Label]) -> Result<Self::Model>;

    fn score(&self, region: &GrayImage, model: &Self::Model) -> Result<Score>;
}
