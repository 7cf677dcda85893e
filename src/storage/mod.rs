pub mod model_store;
pub mod sample_store;

pub use model_store::{ModelStore, TrainedModel};
pub use sample_store::{Sample, SampleStore};
