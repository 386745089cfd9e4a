//! Feeder configuration, loaded from JSON.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{FeederError, Result};

fn default_seed() -> u64 {
    1234
}

/// Everything needed to build a [`crate::Feeder`] from disk.
#[derive(Debug, Clone, Deserialize)]
pub struct FeederConfig {
    /// Parquet feature store.
    pub feature_path: PathBuf,
    pub train_csv: PathBuf,
    pub validate_csv: PathBuf,
    /// JSON file with `mean` and `std` arrays.
    pub scalar_path: PathBuf,
    /// Scene labels in class-index order.
    pub labels: Vec<String>,
    /// Width of the one-hot targets. Defaults to `labels.len()`.
    #[serde(default)]
    pub classes_num: Option<usize>,
    pub batch_size: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl FeederConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: FeederConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn classes_num(&self) -> usize {
        self.classes_num.unwrap_or(self.labels.len())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(FeederError::Config("batch_size must be positive".into()));
        }
        if self.labels.is_empty() {
            return Err(FeederError::Config("labels must not be empty".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(FeederError::Config(format!("duplicate label '{dup}'")));
        }
        if self.classes_num() < self.labels.len() {
            return Err(FeederError::Config(format!(
                "classes_num {} is smaller than the {} labels",
                self.classes_num(),
                self.labels.len()
            )));
        }
        Ok(())
    }
}
