use crate::camera::SampleSource;
use crate::common::{config::AuthConfig, FaceLockError, Result};
use crate::core::classifier::{Classifier, RegionDetector};
use crate::core::identity::Identity;
use crate::storage::TrainedModel;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct AuthMatch {
    pub identity: Identity,
    pub distance: f64,
    pub attempts: u32,
}

/// Terminal state of one authentication run. `Unmatched` is an expected
/// outcome, not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthOutcome {
    Matched(AuthMatch),
    Unmatched {
        attempts: u32,
        best_distance: Option<f64>,
        cancelled: bool,
    },
}

impl AuthOutcome {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthOutcome::Matched(m) => Some(&m.identity),
            AuthOutcome::Unmatched { .. } => None,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, AuthOutcome::Matched(_))
    }
}

/// Read-only decision procedure over a trained model.
///
/// Each attempt pulls one sample from the source and scores every detected
/// region; the first region strictly below `distance_threshold` wins. The
/// loop runs at most `max_attempts` times, and a cancel flag, if set, is
/// checked once per attempt.
pub struct Authenticator<'a, C: Classifier, D: RegionDetector> {
    classifier: &'a C,
    detector: &'a D,
    trained: &'a TrainedModel<C::Model>,
    settings: AuthConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, C: Classifier, D: RegionDetector> Authenticator<'a, C, D> {
    pub fn new(
        classifier: &'a C,
        detector: &'a D,
        trained: &'a TrainedModel<C::Model>,
        settings: &AuthConfig,
    ) -> Self {
        Self {
            classifier,
            detector,
            trained,
            settings: settings.clone(),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |c| c.load(Ordering::Relaxed))
    }

    pub fn authenticate(&self, source: &mut dyn SampleSource) -> Result<AuthOutcome> {
        let threshold = self.settings.distance_threshold;
        let mut best_distance: Option<f64> = None;

        tracing::info!(
            "Starting authentication (threshold {:.2}, up to {} attempts)",
            threshold, self.settings.max_attempts
        );

        for attempt in 1..=self.settings.max_attempts {
            if self.cancelled() {
                tracing::info!("Authentication cancelled after {} attempts", attempt - 1);
                return Ok(AuthOutcome::Unmatched {
                    attempts: attempt - 1,
                    best_distance,
                    cancelled: true,
                });
            }

            let Some(frame) = source.next_sample()? else {
                tracing::debug!("Attempt {}: no sample available", attempt);
                continue;
            };

            let regions = match self.detector.detect_regions(&frame) {
                Ok(regions) => regions,
                Err(e) => {
                    tracing::warn!("Attempt {}: detection error: {}", attempt, e);
                    continue;
                }
            };

            for region in regions {
                let score = self.classifier.score(&region.image, &self.trained.model)?;
                let identity = self.trained.index.identity(score.label).ok_or_else(|| {
                    FaceLockError::ModelCorrupt(format!(
                        "classifier returned label {} outside the identity index", score.label
                    ))
                })?;

                if score.distance < threshold {
                    tracing::info!(
                        "Authenticated {} (distance {:.2}) after {} attempts",
                        identity, score.distance, attempt
                    );
                    return Ok(AuthOutcome::Matched(AuthMatch {
                        identity: identity.clone(),
                        distance: score.distance,
                        attempts: attempt,
                    }));
                }

                tracing::debug!(
                    "Attempt {}: rejected region (closest {}, distance {:.2})",
                    attempt, identity, score.distance
                );
                if best_distance.map_or(true, |best| score.distance < best) {
                    best_distance = Some(score.distance);
                }
            }
        }

        tracing::info!(
            "No match after {} attempts (best distance {:?})",
            self.settings.max_attempts, best_distance
        );
        Ok(AuthOutcome::Unmatched {
            attempts: self.settings.max_attempts,
            best_distance,
            cancelled: false,
        })
    }
}
