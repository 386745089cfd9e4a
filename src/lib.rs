//! Minibatch feeder for acoustic scene classification.
//!
//! Loads precomputed features from a Parquet feature store, matches them
//! against train / validation metadata, and yields normalized batches with
//! one-hot targets.

pub mod config;
pub mod data;
pub mod error;
pub mod feeder;

pub use config::FeederConfig;
pub use data::model::{Batch, FeatureTable, LabelVocabulary};
pub use data::scaler::{scale, sparse_to_categorical, Scaler};
pub use error::{FeederError, Result};
pub use feeder::{Feeder, Split, TrainBatches, ValidateBatches};
