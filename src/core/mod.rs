pub mod auth;
pub mod classifier;
pub mod detector;
pub mod identity;
pub mod lbph;
pub mod quality;
pub mod trainer;

pub use auth::{AuthMatch, AuthOutcome, Authenticator};
pub use classifier::{Classifier, RawFrame, Region, RegionBounds, RegionDetector, Score};
pub use detector::WholeFrameDetector;
pub use identity::{Identity, IdentityIndex, Label};
pub use lbph::{LbphClassifier, LbphModel};
pub use quality::QualityMetrics;
pub use trainer::{ModelTrainer, TrainingReport};
