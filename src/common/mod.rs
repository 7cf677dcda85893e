pub mod config;
pub mod error;
pub mod paths;

pub use config::Config;
pub use error::{FaceLockError, Result};
pub use paths::{DataLayout, RunMode};
