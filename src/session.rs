use crate::camera::SampleSource;
use crate::cipher::{Cipher, CipherEngine, Operation, Report, XChaChaCipher};
use crate::common::{Config, DataLayout, FaceLockError, Result};
use crate::core::auth::{AuthOutcome, Authenticator};
use crate::core::classifier::{Classifier, RegionDetector};
use crate::core::identity::Identity;
use crate::core::lbph::LbphClassifier;
use crate::core::detector::WholeFrameDetector;
use crate::core::quality::QualityMetrics;
use crate::core::trainer::{ModelTrainer, TrainingReport};
use crate::storage::{ModelStore, SampleStore, TrainedModel};
use crate::vault::KeyVault;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct EnrollReport {
    pub identity: Identity,
    pub captured: u32,
    pub target: u32,
    pub rejected: u32,
    pub frames: u32,
}

impl EnrollReport {
    pub fn is_complete(&self) -> bool {
        self.captured >= self.target
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityStatus {
    pub identity: Identity,
    pub samples: usize,
    pub has_key: bool,
}

/// The session with the built-in capabilities.
pub type DefaultFaceLock = FaceLock<LbphClassifier, WholeFrameDetector, XChaChaCipher>;

/// One workflow over the persisted state: enroll, train, authenticate, then
/// protect or unprotect as the authenticated identity.
///
/// The trained model is loaded on the first authentication and dropped when
/// the session retrains. The current identity is set only by a matched
/// authentication and cleared by any other outcome or by `logout`.
pub struct FaceLock<C: Classifier, D: RegionDetector, K: Cipher> {
    config: Config,
    layout: DataLayout,
    classifier: C,
    detector: D,
    samples: SampleStore,
    models: ModelStore,
    vault: KeyVault,
    engine: CipherEngine<K>,
    model: Option<TrainedModel<C::Model>>,
    current: Option<Identity>,
    cancel: Option<Arc<AtomicBool>>,
}

impl DefaultFaceLock {
    pub fn open(config: Config, layout: DataLayout) -> Result<Self> {
        let classifier = LbphClassifier::new(&config);
        let detector = WholeFrameDetector::new(&config);
        Self::with_capabilities(config, layout, classifier, detector, XChaChaCipher)
    }
}

impl<C: Classifier, D: RegionDetector, K: Cipher> FaceLock<C, D, K> {
    pub fn with_capabilities(
        config: Config,
        layout: DataLayout,
        classifier: C,
        detector: D,
        cipher: K,
    ) -> Result<Self> {
        config.validate()?;
        layout.ensure()?;
        tracing::debug!("Using data directory {}", layout.root().display());

        Ok(Self {
            samples: SampleStore::new(&layout, &config),
            models: ModelStore::new(&layout),
            vault: KeyVault::new(&layout),
            engine: CipherEngine::new(cipher).excluding(layout.root())?,
            config,
            layout,
            classifier,
            detector,
            model: None,
            current: None,
            cancel: None,
        })
    }

    /// Checked once per authentication attempt and once per enrollment frame.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn current_identity(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    pub fn logout(&mut self) {
        if let Some(identity) = self.current.take() {
            tracing::info!("Logged out {}", identity);
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |c| c.load(Ordering::Relaxed))
    }

    /// Capture samples for `identity` until the configured target is stored
    /// or the frame budget is spent. Frames without a region, or whose region
    /// fails the quality gate, are counted as rejected.
    pub fn enroll(&self, identity: &Identity, source: &mut dyn SampleSource) -> Result<EnrollReport> {
        let settings = &self.config.enrollment;
        let mut report = EnrollReport {
            identity: identity.clone(),
            captured: 0,
            target: settings.target_samples,
            rejected: 0,
            frames: 0,
        };

        tracing::info!(
            "Enrolling {} (target {} samples, up to {} frames)",
            identity, settings.target_samples, settings.max_frames
        );

        while report.captured < settings.target_samples && report.frames < settings.max_frames {
            if self.cancelled() {
                tracing::info!("Enrollment of {} cancelled", identity);
                break;
            }
            report.frames += 1;

            let Some(frame) = source.next_sample()? else {
                continue;
            };

            let region = match self.detector.detect_regions(&frame) {
                Ok(regions) => regions.into_iter().next(),
                Err(e) => {
                    tracing::warn!("Detection error on frame {}: {}", report.frames, e);
                    None
                }
            };
            let Some(region) = region else {
                tracing::debug!("Frame {}: no region", report.frames);
                report.rejected += 1;
                continue;
            };

            let quality = QualityMetrics::calculate(&region.image);
            if !quality.meets_minimum_requirements(settings.min_quality) {
                tracing::debug!("Frame {}: rejected, {}", report.frames, quality.get_quality_assessment());
                report.rejected += 1;
                continue;
            }

            let index = self.samples.store(identity, &region.image)?;
            report.captured += 1;
            tracing::debug!(
                "Captured sample {} for {} ({}/{})",
                index, identity, report.captured, settings.target_samples
            );
        }

        if report.captured == 0 {
            return Err(FaceLockError::Capture("no usable samples".into()));
        }
        if !report.is_complete() {
            tracing::warn!(
                "Enrolled only {}/{} samples for {}",
                report.captured, report.target, identity
            );
        } else {
            tracing::info!("Enrolled {} samples for {}", report.captured, identity);
        }
        Ok(report)
    }

    /// Retrain on the whole sample store. Drops any cached model.
    pub fn train(&mut self) -> Result<TrainingReport> {
        self.model = None;
        ModelTrainer::new(&self.classifier, &self.samples, &self.models).train()
    }

    pub fn authenticate(&mut self, source: &mut dyn SampleSource) -> Result<AuthOutcome> {
        self.current = None;

        if self.model.is_none() {
            self.model = Some(self.models.load()?);
        }
        let Some(trained) = self.model.as_ref() else {
            return Err(FaceLockError::ModelNotTrained);
        };

        let mut authenticator =
            Authenticator::new(&self.classifier, &self.detector, trained, &self.config.auth);
        if let Some(cancel) = &self.cancel {
            authenticator = authenticator.with_cancel(Arc::clone(cancel));
        }

        let outcome = authenticator.authenticate(source)?;
        self.current = outcome.identity().cloned();
        Ok(outcome)
    }

    fn require_identity(&self) -> Result<&Identity> {
        self.current.as_ref().ok_or(FaceLockError::NotAuthenticated)
    }

    /// Encrypt `path` in place with the current identity's key, creating the
    /// key on first use.
    pub fn protect(&self, path: &Path) -> Result<Report> {
        let identity = self.require_identity()?;
        let key = self.vault.unlock_or_create(identity)?;
        self.engine.protect(path, &key)
    }

    /// Decrypt `path` in place with the current identity's existing key.
    pub fn unprotect(&self, path: &Path) -> Result<Report> {
        let identity = self.require_identity()?;
        match self.vault.unlock(identity) {
            Ok(key) => self.engine.unprotect(path, &key),
            Err(e @ FaceLockError::KeyNotFound(_)) if is_directory(path) => {
                tracing::warn!("No key for {}, nothing under {} can be unprotected", identity, path.display());
                self.engine.fail_all(Operation::Unprotect, path, &e)
            }
            Err(e) => Err(e),
        }
    }

    /// Enrolled identities in label order.
    pub fn identities(&self) -> Result<Vec<IdentityStatus>> {
        self.samples
            .list_identities()?
            .into_iter()
            .map(|identity| {
                Ok(IdentityStatus {
                    samples: self.samples.count(&identity)?,
                    has_key: self.vault.has_key(&identity),
                    identity,
                })
            })
            .collect()
    }
}

fn is_directory(path: &Path) -> bool {
    fs::symlink_metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}
