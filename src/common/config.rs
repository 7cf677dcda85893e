use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::common::error::{FaceLockError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "configs/facelock.toml";

/// Lower bound on enrollment captures; fewer samples visibly hurt separation.
pub const MIN_TARGET_SAMPLES: u32 = 10;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sample: SampleConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf { PathBuf::from("data") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SampleConfig {
    #[serde(default = "default_sample_side")]
    pub width: u32,
    #[serde(default = "default_sample_side")]
    pub height: u32,
}

fn default_sample_side() -> u32 { 200 }

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            width: default_sample_side(),
            height: default_sample_side(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_true")]
    pub equalize: bool,
    #[serde(default = "default_min_region_size")]
    pub min_region_size: u32,
}

fn default_true() -> bool { true }
fn default_min_region_size() -> u32 { 32 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            equalize: default_true(),
            min_region_size: default_min_region_size(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_grid")]
    pub grid_x: u32,
    #[serde(default = "default_grid")]
    pub grid_y: u32,
}

fn default_grid() -> u32 { 8 }

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            grid_x: default_grid(),
            grid_y: default_grid(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EnrollmentConfig {
    #[serde(default = "default_target_samples")]
    pub target_samples: u32,
    #[serde(default = "default_max_frames")]
    pub max_frames: u32,
    #[serde(default = "default_min_quality")]
    pub min_quality: f32,
}

fn default_target_samples() -> u32 { 15 }
fn default_max_frames() -> u32 { 300 }
fn default_min_quality() -> f32 { 0.25 }

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            target_samples: default_target_samples(),
            max_frames: default_max_frames(),
            min_quality: default_min_quality(),
        }
    }
}

/// Decision policy for live authentication.
///
/// `distance_threshold` is on the classifier's distance scale: a region is
/// accepted only when its distance is strictly below it. Raising it trades
/// fewer false rejects for more false accepts.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_distance_threshold() -> f64 { 50.0 }
fn default_max_attempts() -> u32 { 30 }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            distance_threshold: default_distance_threshold(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub device_index: u32,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    #[serde(default = "default_warmup_delay")]
    pub warmup_delay_ms: u64,
}

fn default_camera_width() -> u32 { 640 }
fn default_camera_height() -> u32 { 480 }
fn default_warmup_frames() -> u32 { 2 }
fn default_warmup_delay() -> u64 { 50 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
            warmup_frames: default_warmup_frames(),
            warmup_delay_ms: default_warmup_delay(),
        }
    }
}

impl Config {
    /// Load the default config file, or built-in defaults if it is absent.
    pub fn load() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            Self::load_from_path(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceLockError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| FaceLockError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample.width < 16 || self.sample.width > 1024 {
            return Err(FaceLockError::Config(format!(
                "Sample width must be between 16 and 1024, got {}", self.sample.width
            )));
        }
        if self.sample.height < 16 || self.sample.height > 1024 {
            return Err(FaceLockError::Config(format!(
                "Sample height must be between 16 and 1024, got {}", self.sample.height
            )));
        }

        if self.classifier.grid_x == 0 || self.classifier.grid_x + 2 > self.sample.width {
            return Err(FaceLockError::Config(format!(
                "Classifier grid_x must be between 1 and the sample width minus 2, got {}",
                self.classifier.grid_x
            )));
        }
        if self.classifier.grid_y == 0 || self.classifier.grid_y + 2 > self.sample.height {
            return Err(FaceLockError::Config(format!(
                "Classifier grid_y must be between 1 and the sample height minus 2, got {}",
                self.classifier.grid_y
            )));
        }

        if self.enrollment.target_samples < MIN_TARGET_SAMPLES {
            return Err(FaceLockError::Config(format!(
                "Enrollment target must be at least {} samples, got {}",
                MIN_TARGET_SAMPLES, self.enrollment.target_samples
            )));
        }
        if self.enrollment.max_frames < self.enrollment.target_samples {
            return Err(FaceLockError::Config(format!(
                "Enrollment frame budget ({}) is smaller than the sample target ({})",
                self.enrollment.max_frames, self.enrollment.target_samples
            )));
        }
        if !(0.0..=1.0).contains(&self.enrollment.min_quality) {
            return Err(FaceLockError::Config(format!(
                "Minimum enrollment quality must be between 0.0 and 1.0, got {}",
                self.enrollment.min_quality
            )));
        }

        if !(self.auth.distance_threshold.is_finite() && self.auth.distance_threshold > 0.0) {
            return Err(FaceLockError::Config(format!(
                "Distance threshold must be a positive number, got {}",
                self.auth.distance_threshold
            )));
        }
        if self.auth.max_attempts == 0 || self.auth.max_attempts > 1000 {
            return Err(FaceLockError::Config(format!(
                "Max attempts must be between 1 and 1000, got {}", self.auth.max_attempts
            )));
        }

        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(FaceLockError::Config(format!(
                "Camera width must be between 1 and 4096, got {}", self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(FaceLockError::Config(format!(
                "Camera height must be between 1 and 4096, got {}", self.camera.height
            )));
        }

        Ok(())
    }
}
