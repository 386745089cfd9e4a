use std::path::Path;

use ndarray::{Array1, Array2, ArrayD, ArrayViewD};
use serde::Deserialize;

use crate::error::{FeederError, Result};

// ---------------------------------------------------------------------------
// Scaler – per-bin normalization parameters
// ---------------------------------------------------------------------------

/// Mean and standard deviation per feature bin (the last feature axis).
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    mean: Array1<f32>,
    std: Array1<f32>,
}

#[derive(Deserialize)]
struct ScalerFile {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Scaler {
    pub fn new(mean: Array1<f32>, std: Array1<f32>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(FeederError::ShapeMismatch(format!(
                "mean has {} bins but std has {}",
                mean.len(),
                std.len()
            )));
        }
        Ok(Self { mean, std })
    }

    /// Zero mean, unit std: leaves features untouched.
    pub fn identity(dim: usize) -> Self {
        Self {
            mean: Array1::zeros(dim),
            std: Array1::ones(dim),
        }
    }

    /// Read `{"mean": [...], "std": [...]}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let file: ScalerFile = serde_json::from_str(&text)?;
        Self::new(Array1::from(file.mean), Array1::from(file.std))
    }

    pub fn mean(&self) -> &Array1<f32> {
        &self.mean
    }

    pub fn std(&self) -> &Array1<f32> {
        &self.std
    }

    /// Number of bins.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Normalize `x` along its last axis.
    pub fn transform(&self, x: &ArrayViewD<f32>) -> Result<ArrayD<f32>> {
        scale(x, &self.mean, &self.std)
    }

    /// Undo [`Scaler::transform`].
    pub fn inverse(&self, x: &ArrayViewD<f32>) -> Result<ArrayD<f32>> {
        check_last_axis(x, self.dim())?;
        let scaled = x * &self.std;
        Ok(&scaled + &self.mean)
    }

    /// Transform without re-checking shapes; callers guarantee the last axis
    /// already matches.
    pub(crate) fn apply(&self, x: &ArrayViewD<f32>) -> ArrayD<f32> {
        let centered = x - &self.mean;
        &centered / &self.std
    }
}

/// `(x - mean) / std`, broadcast over every axis but the last.
pub fn scale(x: &ArrayViewD<f32>, mean: &Array1<f32>, std: &Array1<f32>) -> Result<ArrayD<f32>> {
    if mean.len() != std.len() {
        return Err(FeederError::ShapeMismatch(format!(
            "mean has {} bins but std has {}",
            mean.len(),
            std.len()
        )));
    }
    check_last_axis(x, mean.len())?;
    let centered = x - mean;
    Ok(&centered / std)
}

fn check_last_axis(x: &ArrayViewD<f32>, dim: usize) -> Result<()> {
    match x.shape().last() {
        Some(&d) if d == dim => Ok(()),
        _ => Err(FeederError::ShapeMismatch(format!(
            "cannot normalize shape {:?} with {dim} bins",
            x.shape()
        ))),
    }
}

// ---------------------------------------------------------------------------
// One-hot targets
// ---------------------------------------------------------------------------

/// Expand class indices into a `[targets.len(), classes_num]` one-hot matrix.
pub fn sparse_to_categorical(targets: &[usize], classes_num: usize) -> Result<Array2<f32>> {
    if let Some(&bad) = targets.iter().find(|&&t| t >= classes_num) {
        return Err(FeederError::ShapeMismatch(format!(
            "class index {bad} out of range for {classes_num} classes"
        )));
    }
    Ok(one_hot(targets, classes_num))
}

pub(crate) fn one_hot(targets: &[usize], classes_num: usize) -> Array2<f32> {
    let mut out = Array2::zeros((targets.len(), classes_num));
    for (row, &class) in targets.iter().enumerate() {
        out[[row, class]] = 1.0;
    }
    out
}
