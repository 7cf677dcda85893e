//! Deterministic stand-ins for the injected capabilities.

use crate::camera::SampleSource;
use crate::common::{FaceLockError, Result};
use crate::core::classifier::{Classifier, RawFrame, Region, RegionBounds, RegionDetector, Score};
use crate::core::identity::Label;
use image::{DynamicImage, GrayImage, Luma};
use std::cell::Cell;
use std::collections::VecDeque;

pub const SIDE: u32 = 16;

/// Uniform patch whose intensity stands for a "class".
pub fn patch(value: u8) -> GrayImage {
    GrayImage::from_pixel(SIDE, SIDE, Luma([value]))
}

pub fn frame(value: u8) -> RawFrame {
    DynamicImage::ImageLuma8(patch(value))
}

fn mean(image: &GrayImage) -> f64 {
    let sum: u64 = image.pixels().map(|p| p[0] as u64).sum();
    sum as f64 / (image.width() * image.height()).max(1) as f64
}

/// Nearest class centroid by mean intensity; distance is the absolute
/// difference in intensity.
pub struct MeanClassifier;

impl Classifier for MeanClassifier {
    type Model = Vec<(Label, f64)>;

    fn train(&self, samples: &[GrayImage], labels: &[Label]) -> Result<Self::Model> {
        let mut sums: Vec<(Label, f64, usize)> = Vec::new();
        for (sample, &label) in samples.iter().zip(labels) {
            match sums.iter_mut().find(|(l, _, _)| *l == label) {
                Some(entry) => {
                    entry.1 += mean(sample);
                    entry.2 += 1;
                }
                None => sums.push((label, mean(sample), 1)),
            }
        }
        Ok(sums.into_iter().map(|(l, s, n)| (l, s / n as f64)).collect())
    }

    fn score(&self, region: &GrayImage, model: &Self::Model) -> Result<Score> {
        let value = mean(region);
        model
            .iter()
            .map(|&(label, centroid)| Score { label, distance: (value - centroid).abs() })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .ok_or_else(|| FaceLockError::Classifier("empty model".into()))
    }
}

/// Every frame is one region, used as-is.
pub struct PassthroughDetector;

impl RegionDetector for PassthroughDetector {
    fn detect_regions(&self, frame: &RawFrame) -> Result<Vec<Region>> {
        let image = frame.to_luma8();
        let bounds = RegionBounds { x: 0, y: 0, width: image.width(), height: image.height() };
        Ok(vec![Region { bounds, image }])
    }
}

/// Plays back a fixed script, then either repeats a frame forever or reports
/// unavailability. Counts every pull.
pub struct ScriptedSource {
    script: VecDeque<Option<RawFrame>>,
    repeat: Option<RawFrame>,
    pub pulls: Cell<u32>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Option<RawFrame>>) -> Self {
        Self { script: script.into(), repeat: None, pulls: Cell::new(0) }
    }

    pub fn endless(frame: RawFrame) -> Self {
        Self { script: VecDeque::new(), repeat: Some(frame), pulls: Cell::new(0) }
    }
}

impl SampleSource for ScriptedSource {
    fn next_sample(&mut self) -> Result<Option<RawFrame>> {
        self.pulls.set(self.pulls.get() + 1);
        match self.script.pop_front() {
            Some(step) => Ok(step),
            None => Ok(self.repeat.clone()),
        }
    }
}
