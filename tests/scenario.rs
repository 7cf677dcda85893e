//! End-to-end workflow over the public API, with deterministic capabilities
//! standing in for the face detector and classifier.

use facelock::{
    AuthOutcome, Classifier, Config, DataLayout, FaceLock, FaceLockError, FailureKind, Identity,
    RawFrame, Region, RegionBounds, RegionDetector, SampleSource, Score, XChaChaCipher,
};
use image::{DynamicImage, GrayImage, Luma};
use std::fs;

const SIDE: u32 = 16;
const CLASS_X: u8 = 60;
const CLASS_Y: u8 = 190;

/// Nearest class by mean intensity.
struct MeanClassifier;

fn mean(image: &GrayImage) -> f64 {
    let sum: u64 = image.pixels().map(|p| p[0] as u64).sum();
    sum as f64 / (image.width() * image.height()) as f64
}

impl Classifier for MeanClassifier {
    type Model = Vec<(u32, f64)>;

    fn train(&self, samples: &[GrayImage], labels: &[u32]) -> facelock::Result<Self::Model> {
        let classes = labels.iter().copied().max().map_or(0, |m| m as usize + 1);
        let mut sums = vec![(0.0, 0usize); classes];
        for (sample, &label) in samples.iter().zip(labels) {
            sums[label as usize].0 += mean(sample);
            sums[label as usize].1 += 1;
        }
        Ok(sums
            .into_iter()
            .enumerate()
            .map(|(label, (sum, n))| (label as u32, sum / n.max(1) as f64))
            .collect())
    }

    fn score(&self, region: &GrayImage, model: &Self::Model) -> facelock::Result<Score> {
        let value = mean(region);
        model
            .iter()
            .map(|&(label, centroid)| Score { label, distance: (value - centroid).abs() })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .ok_or_else(|| FaceLockError::Classifier("empty model".into()))
    }
}

struct WholeImage;

impl RegionDetector for WholeImage {
    fn detect_regions(&self, frame: &RawFrame) -> facelock::Result<Vec<Region>> {
        let image = frame.to_luma8();
        let bounds = RegionBounds { x: 0, y: 0, width: image.width(), height: image.height() };
        Ok(vec![Region { bounds, image }])
    }
}

/// Yields slightly varying frames of one class, forever.
struct ClassStream {
    value: u8,
    step: u8,
}

impl SampleSource for ClassStream {
    fn next_sample(&mut self) -> facelock::Result<Option<RawFrame>> {
        self.step = (self.step + 1) % 5;
        let image = GrayImage::from_pixel(SIDE, SIDE, Luma([self.value + self.step]));
        Ok(Some(DynamicImage::ImageLuma8(image)))
    }
}

fn stream(value: u8) -> ClassStream {
    ClassStream { value, step: 0 }
}

fn config() -> Config {
    let mut config = Config::default();
    config.sample.width = SIDE;
    config.sample.height = SIDE;
    config.enrollment.target_samples = 15;
    config.enrollment.min_quality = 0.0;
    config.auth.distance_threshold = 20.0;
    config.auth.max_attempts = 10;
    config
}

type TestLock = FaceLock<MeanClassifier, WholeImage, XChaChaCipher>;

fn open(data: &std::path::Path) -> TestLock {
    FaceLock::with_capabilities(config(), DataLayout::new(data), MeanClassifier, WholeImage, XChaChaCipher)
        .unwrap()
}

fn enrolled_and_trained(data: &std::path::Path) -> TestLock {
    let mut lock = open(data);
    for (name, value) in [("alice", CLASS_X), ("bob", CLASS_Y)] {
        let report = lock.enroll(&Identity::new(name).unwrap(), &mut stream(value)).unwrap();
        assert_eq!(report.captured, 15);
    }
    let training = lock.train().unwrap();
    assert_eq!(training.total_samples, 30);
    lock
}

#[test]
fn alice_protects_and_restores_a_file() {
    let data = tempfile::tempdir().unwrap();
    let mut lock = enrolled_and_trained(data.path());

    let outcome = lock.authenticate(&mut stream(CLASS_X)).unwrap();
    match &outcome {
        AuthOutcome::Matched(m) => assert_eq!(m.identity.as_str(), "alice"),
        other => panic!("expected alice, got {:?}", other),
    }

    let work = tempfile::tempdir().unwrap();
    let file = work.path().join("f.txt");
    let original = b"quarterly numbers, do not share".to_vec();
    fs::write(&file, &original).unwrap();

    let protected = lock.protect(&file).unwrap();
    assert!(protected.is_complete());
    assert_ne!(fs::read(&file).unwrap(), original);

    let restored = lock.unprotect(&file).unwrap();
    assert_eq!(restored.success_count(), 1);
    assert_eq!(fs::read(&file).unwrap(), original);
}

#[test]
fn bob_cannot_read_alices_files() {
    let data = tempfile::tempdir().unwrap();
    let mut lock = enrolled_and_trained(data.path());
    let work = tempfile::tempdir().unwrap();
    fs::write(work.path().join("alice.txt"), b"alice").unwrap();

    lock.authenticate(&mut stream(CLASS_X)).unwrap();
    lock.protect(work.path()).unwrap();
    let sealed = fs::read(work.path().join("alice.txt")).unwrap();

    // bob needs a key before unprotect reaches the cipher
    fs::write(work.path().join("bob.txt"), b"bob").unwrap();
    let outcome = lock.authenticate(&mut stream(CLASS_Y)).unwrap();
    assert_eq!(outcome.identity().unwrap().as_str(), "bob");
    lock.protect(&work.path().join("bob.txt")).unwrap();

    let report = lock.unprotect(work.path()).unwrap();
    assert_eq!(report.success_count(), 1);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.failed[0].path, work.path().join("alice.txt"));
    assert_eq!(report.failed[0].kind, FailureKind::Authenticity);
    assert_eq!(fs::read(work.path().join("alice.txt")).unwrap(), sealed);
    assert_eq!(fs::read(work.path().join("bob.txt")).unwrap(), b"bob");
}

#[test]
fn stranger_is_unmatched_within_budget() {
    let data = tempfile::tempdir().unwrap();
    let mut lock = enrolled_and_trained(data.path());

    let outcome = lock.authenticate(&mut stream(125)).unwrap();
    assert!(matches!(outcome, AuthOutcome::Unmatched { attempts: 10, .. }));
    assert!(lock.current_identity().is_none());
}

#[test]
fn retraining_unchanged_store_keeps_decisions() {
    let data = tempfile::tempdir().unwrap();
    let mut lock = enrolled_and_trained(data.path());
    let first = lock.authenticate(&mut stream(CLASS_Y)).unwrap();

    lock.train().unwrap();
    let second = lock.authenticate(&mut stream(CLASS_Y)).unwrap();
    assert_eq!(first.identity(), second.identity());

    // A fresh session over the same directory sees the persisted model.
    let mut reopened = open(data.path());
    let third = reopened.authenticate(&mut stream(CLASS_Y)).unwrap();
    assert_eq!(third.identity().unwrap().as_str(), "bob");
}

#[test]
fn corrupt_model_is_detected() {
    let data = tempfile::tempdir().unwrap();
    enrolled_and_trained(data.path());
    let layout = DataLayout::new(data.path());
    fs::write(layout.model_file(), b"garbage").unwrap();

    let mut lock = open(data.path());
    assert!(matches!(
        lock.authenticate(&mut stream(CLASS_X)),
        Err(FaceLockError::ModelCorrupt(_))
    ));
}
