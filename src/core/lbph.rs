//! Local binary pattern histogram (LBPH) classifier.
//!
//! Each sample is reduced to a spatial histogram of 8-neighbour LBP codes
//! over a `grid_x` x `grid_y` grid, one 256-bin histogram per cell,
//! normalized to sum 1. Scoring is nearest-neighbour over every training
//! histogram under the chi-square distance, so the distance is 0 for an
//! identical sample and grows without a fixed upper bound on the
//! configured scale.

use image::GrayImage;
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use crate::common::{Config, FaceLockError, Result};
use crate::core::classifier::{Classifier, Score};
use crate::core::identity::Label;

const PATTERNS: usize = 256;

// Clockwise from the top-left neighbour.
const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1), (0, -1), (1, -1), (1, 0),
    (1, 1), (0, 1), (-1, 1), (-1, 0),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbphModel {
    pub grid_x: u32,
    pub grid_y: u32,
    pub width: u32,
    pub height: u32,
    histograms: Vec<Vec<f32>>,
    labels: Vec<Label>,
}

impl LbphModel {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LbphClassifier {
    grid_x: u32,
    grid_y: u32,
}

impl LbphClassifier {
    pub fn new(config: &Config) -> Self {
        Self::with_grid(config.classifier.grid_x, config.classifier.grid_y)
    }

    pub fn with_grid(grid_x: u32, grid_y: u32) -> Self {
        Self { grid_x, grid_y }
    }

    fn check_geometry(&self, image: &GrayImage) -> Result<()> {
        let (w, h) = image.dimensions();
        if w < self.grid_x + 2 || h < self.grid_y + 2 {
            return Err(FaceLockError::Classifier(format!(
                "{}x{} sample is too small for a {}x{} grid",
                w, h, self.grid_x, self.grid_y
            )));
        }
        Ok(())
    }

    fn histogram(&self, image: &GrayImage) -> Result<Vec<f32>> {
        self.check_geometry(image)?;
        let codes = lbp_codes(image);
        Ok(spatial_histogram(&codes, self.grid_x as usize, self.grid_y as usize))
    }
}

impl Classifier for LbphClassifier {
    type Model = LbphModel;

    fn train(&self, samples: &[GrayImage], labels: &[Label]) -> Result<LbphModel> {
        if samples.len() != labels.len() {
            return Err(FaceLockError::Classifier(format!(
                "{} samples but {} labels", samples.len(), labels.len()
            )));
        }
        let first = samples
            .first()
            .ok_or_else(|| FaceLockError::Classifier("cannot train on zero samples".into()))?;
        let (width, height) = first.dimensions();

        let mut histograms = Vec::with_capacity(samples.len());
        for sample in samples {
            if sample.dimensions() != (width, height) {
                return Err(FaceLockError::InvalidSample(format!(
                    "expected {}x{}, got {}x{}",
                    width, height, sample.width(), sample.height()
                )));
            }
            histograms.push(self.histogram(sample)?);
        }

        Ok(LbphModel {
            grid_x: self.grid_x,
            grid_y: self.grid_y,
            width,
            height,
            histograms,
            labels: labels.to_vec(),
        })
    }

    fn score(&self, region: &GrayImage, model: &LbphModel) -> Result<Score> {
        if model.is_empty() {
            return Err(FaceLockError::Classifier("model has no training histograms".into()));
        }
        if (model.grid_x, model.grid_y) != (self.grid_x, self.grid_y) {
            return Err(FaceLockError::Classifier(format!(
                "model grid {}x{} does not match classifier grid {}x{}",
                model.grid_x, model.grid_y, self.grid_x, self.grid_y
            )));
        }
        if region.dimensions() != (model.width, model.height) {
            return Err(FaceLockError::InvalidSample(format!(
                "expected {}x{}, got {}x{}",
                model.width, model.height, region.width(), region.height()
            )));
        }

        let query = self.histogram(region)?;
        let mut best = Score { label: model.labels[0], distance: f64::INFINITY };
        for (histogram, &label) in model.histograms.iter().zip(&model.labels) {
            let distance = chi_square(&query, histogram);
            if distance < best.distance {
                best = Score { label, distance };
            }
        }
        Ok(best)
    }
}

fn lbp_codes(image: &GrayImage) -> Array2<u8> {
    let (w, h) = image.dimensions();
    let rows = (h - 2) as usize;
    let cols = (w - 2) as usize;

    Array2::from_shape_fn((rows, cols), |(y, x)| {
        let cx = x as i64 + 1;
        let cy = y as i64 + 1;
        let center = image.get_pixel(cx as u32, cy as u32)[0];

        NEIGHBOURS.iter().enumerate().fold(0u8, |code, (bit, (dx, dy))| {
            let n = image.get_pixel((cx + dx) as u32, (cy + dy) as u32)[0];
            if n >= center { code | (1 << bit) } else { code }
        })
    })
}

fn spatial_histogram(codes: &Array2<u8>, grid_x: usize, grid_y: usize) -> Vec<f32> {
    let (rows, cols) = codes.dim();
    let cell_w = cols / grid_x;
    let cell_h = rows / grid_y;
    let mut histogram = vec![0.0f32; grid_x * grid_y * PATTERNS];

    for gy in 0..grid_y {
        for gx in 0..grid_x {
            let cell = codes.slice(s![
                gy * cell_h..(gy + 1) * cell_h,
                gx * cell_w..(gx + 1) * cell_w
            ]);
            let offset = (gy * grid_x + gx) * PATTERNS;
            let bins = &mut histogram[offset..offset + PATTERNS];
            for &code in cell.iter() {
                bins[code as usize] += 1.0;
            }
            let total = cell.len() as f32;
            if total > 0.0 {
                bins.iter_mut().for_each(|b| *b /= total);
            }
        }
    }

    histogram
}

/// Symmetric chi-square distance: `2 * sum((a - b)^2 / (a + b))`.
fn chi_square(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(x, y)| **x + **y > 0.0)
        .map(|(&x, &y)| {
            let (x, y) = (x as f64, y as f64);
            (x - y) * (x - y) / (x + y)
        })
        .sum::<f64>()
        * 2.0
}
