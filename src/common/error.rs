use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceLockError {
    #[error("No enrolled samples to train on - enroll at least one identity first")]
    InsufficientData,

    #[error("No trained model found - run training first")]
    ModelNotTrained,

    #[error("Model is corrupt: {0}")]
    ModelCorrupt(String),

    #[error("No key exists for identity: {0}")]
    KeyNotFound(String),

    #[error("Key for identity {identity} is corrupt: {reason}")]
    KeyCorrupt { identity: String, reason: String },

    #[error("Authenticity check failed (wrong key, corrupted or not protected)")]
    Authenticity,

    #[error("No authenticated identity - authenticate first")]
    NotAuthenticated,

    #[error("Invalid identity name: {0}")]
    InvalidIdentity(String),

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FaceLockError>;
