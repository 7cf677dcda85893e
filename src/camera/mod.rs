pub mod source;
#[cfg(feature = "camera")]
pub mod v4l2;

pub use source::{ImageDirSource, SampleSource};
#[cfg(feature = "camera")]
pub use v4l2::CameraSource;
