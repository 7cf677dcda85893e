// Core modules
pub mod common;
pub mod core;
pub mod storage;
pub mod vault;
pub mod cipher;
pub mod camera;
pub mod session;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use common::{Config, DataLayout, FaceLockError, Result, RunMode};
pub use core::{
    AuthMatch, AuthOutcome, Classifier, Identity, LbphClassifier, RawFrame, Region,
    RegionBounds, RegionDetector, Score, TrainingReport, WholeFrameDetector,
};
pub use camera::{ImageDirSource, SampleSource};
#[cfg(feature = "camera")]
pub use camera::CameraSource;
pub use cipher::{Cipher, FailureKind, Report, XChaChaCipher};
pub use vault::{KeyHandle, KeyVault};
pub use session::{DefaultFaceLock, EnrollReport, FaceLock, IdentityStatus};
