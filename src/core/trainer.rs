use crate::common::{FaceLockError, Result};
use crate::core::classifier::Classifier;
use crate::core::identity::{Identity, IdentityIndex, Label};
use crate::storage::{ModelStore, SampleStore, TrainedModel};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct IdentitySamples {
    pub identity: Identity,
    pub label: Label,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub identities: Vec<IdentitySamples>,
    pub total_samples: usize,
    pub trained_at: DateTime<Utc>,
}

/// Builds a model from every stored sample and persists it with a freshly
/// built identity index.
///
/// Labels are assigned densely in lexicographic identity order, so training
/// twice on the same store yields the same index.
pub struct ModelTrainer<'a, C: Classifier> {
    classifier: &'a C,
    samples: &'a SampleStore,
    models: &'a ModelStore,
}

impl<'a, C: Classifier> ModelTrainer<'a, C> {
    pub fn new(classifier: &'a C, samples: &'a SampleStore, models: &'a ModelStore) -> Self {
        Self { classifier, samples, models }
    }

    pub fn train(&self) -> Result<TrainingReport> {
        let mut ordered = Vec::new();
        let mut images = Vec::new();
        let mut labels = Vec::new();
        let mut summary = Vec::new();

        for identity in self.samples.list_identities()? {
            let stored = self.samples.list(&identity)?;
            if stored.is_empty() {
                continue;
            }

            let label = ordered.len() as Label;
            summary.push(IdentitySamples {
                identity: identity.clone(),
                label,
                samples: stored.len(),
            });
            for sample in stored {
                images.push(sample.image);
                labels.push(label);
            }
            ordered.push(identity);
        }

        if images.is_empty() {
            tracing::warn!("Training requested with no enrolled samples");
            return Err(FaceLockError::InsufficientData);
        }

        tracing::info!(
            "Training on {} samples from {} identities",
            images.len(), ordered.len()
        );
        let model = self.classifier.train(&images, &labels)?;

        let trained = TrainedModel {
            model,
            index: IdentityIndex::from_ordered(ordered)?,
            trained_at: Utc::now(),
            sample_counts: summary.iter().map(|s| s.samples as u32).collect(),
        };
        self.models.save(&trained)?;

        Ok(TrainingReport {
            identities: summary,
            total_samples: images.len(),
            trained_at: trained.trained_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::DataLayout;
    use crate::core::classifier::Score;
    use image::{GrayImage, Luma};
    use std::cell::RefCell;

    /// Records what it was trained on; the model is the label list.
    #[derive(Default)]
    struct RecordingClassifier {
        calls: RefCell<usize>,
    }

    impl Classifier for RecordingClassifier {
        type Model = Vec<Label>;

        fn train(&self, samples: &[GrayImage], labels: &[Label]) -> Result<Vec<Label>> {
            assert_eq!(samples.len(), labels.len());
            *self.calls.borrow_mut() += 1;
            Ok(labels.to_vec())
        }

        fn score(&self, _region: &GrayImage, model: &Vec<Label>) -> Result<Score> {
            Ok(Score { label: model[0], distance: 0.0 })
        }
    }

    fn setup(dir: &std::path::Path) -> (DataLayout, SampleStore, ModelStore) {
        let layout = DataLayout::new(dir);
        let samples = SampleStore::with_size(layout.samples_dir(), 16, 16);
        let models = ModelStore::new(&layout);
        (layout, samples, models)
    }

    #[test]
    fn empty_store_is_insufficient_data() {
        let dir = tempfile::tempdir().unwrap();
        let (_layout, samples, models) = setup(dir.path());
        let classifier = RecordingClassifier::default();

        let err = ModelTrainer::new(&classifier, &samples, &models).train().unwrap_err();
        assert!(matches!(err, FaceLockError::InsufficientData));
        assert_eq!(*classifier.calls.borrow(), 0);
        assert!(!models.exists());
    }

    #[test]
    fn labels_follow_lexicographic_order() {
        let dir = tempfile::tempdir().unwrap();
        let (_layout, samples, models) = setup(dir.path());
        let patch = GrayImage::from_pixel(16, 16, Luma([90]));
        for (name, count) in [("zoe", 1), ("alice", 2), ("mallory", 3)] {
            let identity = Identity::new(name).unwrap();
            for _ in 0..count {
                samples.store(&identity, &patch).unwrap();
            }
        }

        let classifier = RecordingClassifier::default();
        let report = ModelTrainer::new(&classifier, &samples, &models).train().unwrap();
        assert_eq!(report.total_samples, 6);
        let names: Vec<&str> = report.identities.iter().map(|i| i.identity.as_str()).collect();
        assert_eq!(names, ["alice", "mallory", "zoe"]);

        let trained: TrainedModel<Vec<Label>> = models.load().unwrap();
        assert_eq!(trained.model, vec![0, 0, 1, 1, 1, 2]);
        assert_eq!(trained.index.identity(2).unwrap().as_str(), "zoe");
        assert_eq!(trained.sample_counts, vec![2, 3, 1]);
    }

    #[test]
    fn retraining_rebuilds_index() {
        let dir = tempfile::tempdir().unwrap();
        let (_layout, samples, models) = setup(dir.path());
        let patch = GrayImage::from_pixel(16, 16, Luma([10]));
        samples.store(&Identity::new("bob").unwrap(), &patch).unwrap();

        let classifier = RecordingClassifier::default();
        let trainer = ModelTrainer::new(&classifier, &samples, &models);
        trainer.train().unwrap();
        let first: TrainedModel<Vec<Label>> = models.load().unwrap();
        assert_eq!(first.index.label(&Identity::new("bob").unwrap()), Some(0));

        samples.store(&Identity::new("alice").unwrap(), &patch).unwrap();
        trainer.train().unwrap();
        let second: TrainedModel<Vec<Label>> = models.load().unwrap();
        assert_eq!(second.index.label(&Identity::new("alice").unwrap()), Some(0));
        assert_eq!(second.index.label(&Identity::new("bob").unwrap()), Some(1));
    }
}
