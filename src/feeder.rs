//! Minibatch production over a loaded feature table.
//!
//! A [`Feeder`] owns the feature table and the train / validate index sets.
//! Batches come out of two iterators that borrow it:
//!
//! * [`TrainBatches`] – endless, reshuffled at every epoch boundary
//! * [`ValidateBatches`] – one ordered pass, optionally source-filtered and
//!   capped at a number of batches

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use log::{debug, info, warn};
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::FeederConfig;
use crate::data::filter::{audio_indexes, source_indexes};
use crate::data::loader::{load_feature_store, read_metadata, SOURCE_LABEL};
use crate::data::model::{Batch, FeatureTable, LabelVocabulary};
use crate::data::scaler::{one_hot, Scaler};
use crate::error::{FeederError, Result};

// ---------------------------------------------------------------------------
// Split – which index set a validation pass walks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// The training index set, unfiltered.
    Train,
    /// The validation index set, filtered by source label.
    Validate,
}

impl FromStr for Split {
    type Err = FeederError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Split::Train),
            "validate" => Ok(Split::Validate),
            other => Err(FeederError::InvalidArgument(format!(
                "data type must be 'train' or 'validate', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Validate => write!(f, "validate"),
        }
    }
}

// ---------------------------------------------------------------------------
// Feeder
// ---------------------------------------------------------------------------

pub struct Feeder {
    table: FeatureTable,
    train_indexes: Vec<usize>,
    validate_indexes: Vec<usize>,
    scaler: Scaler,
    classes_num: usize,
    batch_size: usize,
    /// Seeds each training stream.
    random_state: Mutex<StdRng>,
}

impl Feeder {
    /// Load the feature store and both metadata files named by `config`.
    pub fn new(config: &FeederConfig, scaler: Scaler) -> Result<Self> {
        config.validate()?;
        let load_time = Instant::now();

        let vocab = LabelVocabulary::new(config.labels.iter().cloned())?;
        let table = load_feature_store(&config.feature_path, &vocab)?;
        let train_names = read_metadata(&config.train_csv)?;
        let validate_names = read_metadata(&config.validate_csv)?;

        let feeder = Self::assemble(
            table,
            &train_names,
            &validate_names,
            config.classes_num(),
            scaler,
            config.batch_size,
            config.seed,
        )?;
        info!("Load data time: {:.3} s", load_time.elapsed().as_secs_f64());
        feeder.log_set_sizes();
        Ok(feeder)
    }

    /// Build a feeder over an already loaded table.
    pub fn from_table<S: AsRef<str>>(
        table: FeatureTable,
        train_names: &[S],
        validate_names: &[S],
        classes_num: usize,
        scaler: Scaler,
        batch_size: usize,
        seed: u64,
    ) -> Result<Self> {
        let feeder = Self::assemble(
            table,
            train_names,
            validate_names,
            classes_num,
            scaler,
            batch_size,
            seed,
        )?;
        feeder.log_set_sizes();
        Ok(feeder)
    }

    fn assemble<S: AsRef<str>>(
        table: FeatureTable,
        train_names: &[S],
        validate_names: &[S],
        classes_num: usize,
        scaler: Scaler,
        batch_size: usize,
        seed: u64,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(FeederError::Config("batch_size must be positive".into()));
        }
        if !table.is_empty() && scaler.dim() != table.feature_dim() {
            return Err(FeederError::ShapeMismatch(format!(
                "scaler has {} bins but features have {}",
                scaler.dim(),
                table.feature_dim()
            )));
        }
        if let Some(&bad) = table
            .targets
            .as_deref()
            .and_then(|t| t.iter().find(|&&c| c >= classes_num))
        {
            return Err(FeederError::ShapeMismatch(format!(
                "class index {bad} out of range for {classes_num} classes"
            )));
        }

        let (train_indexes, validate_indexes) = {
            let lookup = table.row_lookup();
            (
                audio_indexes(train_names, &lookup),
                audio_indexes(validate_names, &lookup),
            )
        };
        report_matches("train", train_names.len(), train_indexes.len());
        report_matches("validate", validate_names.len(), validate_indexes.len());

        Ok(Self {
            table,
            train_indexes,
            validate_indexes,
            scaler,
            classes_num,
            batch_size,
            random_state: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }

    fn log_set_sizes(&self) {
        info!("Training audio num: {}", self.train_indexes.len());
        info!("Validation audio num: {}", self.validate_indexes.len());
    }

    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    pub fn train_indexes(&self) -> &[usize] {
        &self.train_indexes
    }

    pub fn validate_indexes(&self) -> &[usize] {
        &self.validate_indexes
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn classes_num(&self) -> usize {
        self.classes_num
    }

    /// Endless stream of shuffled training batches.
    ///
    /// Every epoch is a fresh permutation of the train index set; the last
    /// batch of an epoch is short when the set size is not a multiple of the
    /// batch size.
    pub fn generate_train(&self) -> Result<TrainBatches<'_>> {
        if self.train_indexes.is_empty() {
            return Err(FeederError::EmptyIndexSet("train"));
        }
        let seed: u64 = self
            .random_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut indexes = self.train_indexes.clone();
        indexes.shuffle(&mut rng);
        debug!("Training stream over {} rows", indexes.len());

        Ok(TrainBatches {
            feeder: self,
            indexes,
            pointer: 0,
            rng,
        })
    }

    /// One ordered pass over `split`, at most `max_iteration` batches.
    ///
    /// For [`Split::Validate`] only rows whose source label is in `sources`
    /// are kept; `sources` is ignored for [`Split::Train`].
    pub fn generate_validate<S: AsRef<str>>(
        &self,
        split: Split,
        sources: &[S],
        max_iteration: Option<usize>,
    ) -> Result<ValidateBatches<'_>> {
        let indexes = match split {
            Split::Train => self.train_indexes.clone(),
            Split::Validate => {
                let labels = self
                    .table
                    .source_labels
                    .as_deref()
                    .ok_or_else(|| FeederError::MissingColumn(SOURCE_LABEL.to_string()))?;
                source_indexes(&self.validate_indexes, labels, sources)
            }
        };
        debug!("{split} pass over {} rows", indexes.len());

        Ok(ValidateBatches {
            feeder: self,
            indexes,
            pointer: 0,
            iteration: 0,
            max_iteration,
        })
    }

    /// Gather, normalize and one-hot the rows at `indexes`.
    fn batch(&self, indexes: &[usize]) -> Batch {
        let audio_names = indexes
            .iter()
            .map(|&i| self.table.audio_names[i].clone())
            .collect();
        let rows = self.table.features.select(Axis(0), indexes);
        let features = self.scaler.apply(&rows.view());
        let target = self.table.targets.as_ref().map(|targets| {
            let sparse: Vec<usize> = indexes.iter().map(|&i| targets[i]).collect();
            one_hot(&sparse, self.classes_num)
        });

        Batch {
            audio_names,
            features,
            target,
        }
    }
}

fn report_matches(set: &str, listed: usize, matched: usize) {
    if matched < listed {
        warn!(
            "{} of {listed} {set} metadata names have no row in the feature store",
            listed - matched
        );
    }
}

impl fmt::Debug for Feeder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feeder")
            .field("rows", &self.table.len())
            .field("train", &self.train_indexes.len())
            .field("validate", &self.validate_indexes.len())
            .field("classes_num", &self.classes_num)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// Endless training stream. Never returns `None`.
pub struct TrainBatches<'a> {
    feeder: &'a Feeder,
    indexes: Vec<usize>,
    pointer: usize,
    rng: StdRng,
}

impl Iterator for TrainBatches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.pointer >= self.indexes.len() {
            self.pointer = 0;
            self.indexes.shuffle(&mut self.rng);
        }

        let end = (self.pointer + self.feeder.batch_size).min(self.indexes.len());
        let batch = self.feeder.batch(&self.indexes[self.pointer..end]);
        self.pointer += self.feeder.batch_size;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

/// Finite, ordered stream over one index set.
pub struct ValidateBatches<'a> {
    feeder: &'a Feeder,
    indexes: Vec<usize>,
    pointer: usize,
    iteration: usize,
    max_iteration: Option<usize>,
}

impl ValidateBatches<'_> {
    /// Rows this pass walks, after filtering.
    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }

    fn remaining(&self) -> usize {
        let rows_left = self.indexes.len().saturating_sub(self.pointer);
        let batches_left = rows_left.div_ceil(self.feeder.batch_size);
        match self.max_iteration {
            Some(max) => batches_left.min(max.saturating_sub(self.iteration)),
            None => batches_left,
        }
    }
}

impl Iterator for ValidateBatches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.max_iteration == Some(self.iteration) || self.pointer >= self.indexes.len() {
            return None;
        }

        let end = (self.pointer + self.feeder.batch_size).min(self.indexes.len());
        let batch = self.feeder.batch(&self.indexes[self.pointer..end]);
        self.pointer += self.feeder.batch_size;
        self.iteration += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for ValidateBatches<'_> {}
