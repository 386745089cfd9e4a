use std::collections::HashMap;

use ndarray::{Array2, ArrayD, Axis};

use crate::error::{FeederError, Result};

// ---------------------------------------------------------------------------
// LabelVocabulary – scene label ↔ dense class index
// ---------------------------------------------------------------------------

/// Bidirectional mapping between scene label strings and class indices
/// `0..len()`, in the order the labels were given.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVocabulary {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelVocabulary {
    /// Build a vocabulary from an ordered label list. Duplicates are rejected.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if index.insert(label.clone(), i).is_some() {
                return Err(FeederError::Config(format!("duplicate label '{label}'")));
            }
        }
        Ok(Self { labels, index })
    }

    /// Class index of `label`.
    pub fn index_of(&self, label: &str) -> Result<usize> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| FeederError::UnknownLabel(label.to_string()))
    }

    /// Label string of class `index`.
    pub fn label_of(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

// ---------------------------------------------------------------------------
// FeatureTable – the whole feature store held in memory
// ---------------------------------------------------------------------------

/// Every row of the feature store, column by column.
///
/// Row `i` of `features` (axis 0) belongs to `audio_names[i]`, and likewise
/// for each optional column. The table is never mutated once built.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub audio_names: Vec<String>,
    /// Shape `[N, ..., D]`: one feature row per audio clip, normalized along
    /// the last axis.
    pub features: ArrayD<f32>,
    /// Class index per row, present when the store carries scene labels.
    pub targets: Option<Vec<usize>>,
    pub identifiers: Option<Vec<String>>,
    /// Recording device / provenance tag per row.
    pub source_labels: Option<Vec<String>>,
}

impl FeatureTable {
    /// Assemble a table, checking that every present column has one entry
    /// per feature row.
    pub fn new(
        audio_names: Vec<String>,
        features: ArrayD<f32>,
        targets: Option<Vec<usize>>,
        identifiers: Option<Vec<String>>,
        source_labels: Option<Vec<String>>,
    ) -> Result<Self> {
        if features.ndim() < 2 {
            return Err(FeederError::ShapeMismatch(format!(
                "features need at least 2 axes, got shape {:?}",
                features.shape()
            )));
        }
        let n = features.len_of(Axis(0));
        check_len("audio_name", audio_names.len(), n)?;
        if let Some(t) = &targets {
            check_len("scene_label", t.len(), n)?;
        }
        if let Some(ids) = &identifiers {
            check_len("identifier", ids.len(), n)?;
        }
        if let Some(src) = &source_labels {
            check_len("source_label", src.len(), n)?;
        }

        Ok(Self {
            audio_names,
            features,
            targets,
            identifiers,
            source_labels,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.audio_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audio_names.is_empty()
    }

    /// Length of the last feature axis.
    pub fn feature_dim(&self) -> usize {
        self.features.shape().last().copied().unwrap_or(0)
    }

    /// Shape of a single feature row (everything after axis 0).
    pub fn row_shape(&self) -> &[usize] {
        &self.features.shape()[1..]
    }

    /// Map each audio name to the first row carrying it.
    pub fn row_lookup(&self) -> HashMap<&str, usize> {
        let mut lookup = HashMap::with_capacity(self.audio_names.len());
        for (row, name) in self.audio_names.iter().enumerate() {
            lookup.entry(name.as_str()).or_insert(row);
        }
        lookup
    }
}

fn check_len(column: &str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        return Err(FeederError::ShapeMismatch(format!(
            "column '{column}' has {found} rows but features have {expected}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Batch – one minibatch handed to the trainer
// ---------------------------------------------------------------------------

/// A minibatch. Owned by the caller once yielded.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub audio_names: Vec<String>,
    /// Normalized features, shape `[batch, ..., D]`.
    pub features: ArrayD<f32>,
    /// One-hot targets, shape `[batch, classes_num]`. `None` for unlabelled
    /// feature stores.
    pub target: Option<Array2<f32>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.audio_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audio_names.is_empty()
    }
}
