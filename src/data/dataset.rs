// Data set contract
// Indexable collections of (payload, sfreq, label) triples with a mutable label collection

use thiserror::Error;

use crate::data::types::{Example, FeatureVector, Label, Payload, Signal};

#[derive(Debug, Error)]
pub enum DataSetError {
    #[error("Index {index} out of range for data set of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Expected {expected} payload at index {index}, found {found}")]
    PayloadMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read WAV file: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid data set: {0}")]
    Invalid(String),
}

/// Data set adapter consumed by the experiment
///
/// `get` yields the example triple for a position. `labels` is the ordered
/// label collection; it starts index-aligned with the examples and shrinks
/// when examples are dropped during feature generation.
pub trait DataSet: Send + Sync {
    /// Number of examples
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the example at `index`
    fn get(&self, index: usize) -> Result<Example, DataSetError>;

    /// Current label collection
    fn labels(&self) -> &[Label];

    /// Delete the label at `index`, returning it
    fn remove_label(&mut self, index: usize) -> Result<Label, DataSetError>;
}

/// Data set held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSet {
    items: Vec<(Payload, f64, Label)>,
    labels: Vec<Label>,
}

impl InMemoryDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one example
    pub fn push(&mut self, payload: Payload, sfreq: f64, label: Label) {
        self.items.push((payload, sfreq, label));
        self.labels.push(label);
    }

    pub fn from_examples(examples: Vec<Example>) -> Self {
        let mut data_set = Self::new();
        for example in examples {
            data_set.push(example.payload, example.sfreq, example.label);
        }
        data_set
    }

    /// Build a data set of signals sharing one sampling frequency
    pub fn from_signals(
        signals: Vec<Signal>,
        sfreq: f64,
        labels: Vec<Label>,
    ) -> Result<Self, DataSetError> {
        if signals.len() != labels.len() {
            return Err(DataSetError::Invalid(format!(
                "{} signals but {} labels",
                signals.len(),
                labels.len()
            )));
        }

        let mut data_set = Self::new();
        for (signal, label) in signals.into_iter().zip(labels) {
            data_set.push(Payload::Signal(signal), sfreq, label);
        }
        Ok(data_set)
    }

    /// Build a data set of precomputed feature vectors
    pub fn from_features(
        features: Vec<FeatureVector>,
        sfreq: f64,
        labels: Vec<Label>,
    ) -> Result<Self, DataSetError> {
        if features.len() != labels.len() {
            return Err(DataSetError::Invalid(format!(
                "{} feature vectors but {} labels",
                features.len(),
                labels.len()
            )));
        }

        let mut data_set = Self::new();
        for (vector, label) in features.into_iter().zip(labels) {
            data_set.push(Payload::Features(vector), sfreq, label);
        }
        Ok(data_set)
    }
}

impl DataSet for InMemoryDataSet {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Result<Example, DataSetError> {
        let (payload, sfreq, label) =
            self.items
                .get(index)
                .ok_or(DataSetError::IndexOutOfRange {
                    index,
                    len: self.items.len(),
                })?;

        Ok(Example {
            payload: payload.clone(),
            sfreq: *sfreq,
            label: *label,
        })
    }

    fn labels(&self) -> &[Label] {
        &self.labels
    }

    fn remove_label(&mut self, index: usize) -> Result<Label, DataSetError> {
        if index >= self.labels.len() {
            return Err(DataSetError::IndexOutOfRange {
                index,
                len: self.labels.len(),
            });
        }
        Ok(self.labels.remove(index))
    }
}
