// Data types
// Signals, named feature vectors, and the (payload, sfreq, label) example triple

use serde::{Deserialize, Serialize};

/// Class label of one example
pub type Label = u32;

/// Multi-channel signal with one sample vector per channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Channel names (e.g., "Fp1", "ch0")
    pub channels: Vec<String>,

    /// Samples per channel, index-aligned with `channels`
    pub data: Vec<Vec<f32>>,
}

impl Signal {
    pub fn new(channels: Vec<String>, data: Vec<Vec<f32>>) -> Self {
        Signal { channels, data }
    }

    /// Create a signal whose channels are named ch0, ch1, ...
    pub fn from_channels(data: Vec<Vec<f32>>) -> Self {
        let channels = (0..data.len()).map(|i| format!("ch{}", i)).collect();
        Signal { channels, data }
    }

    pub fn n_channels(&self) -> usize {
        self.data.len()
    }

    /// Number of samples in the shortest channel
    pub fn n_samples(&self) -> usize {
        self.data.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples() == 0
    }
}

/// Numeric feature vector with named columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Column names, index-aligned with `values`
    pub names: Vec<String>,

    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Self {
        FeatureVector { names, values }
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Split into (column names, values)
    pub fn into_parts(self) -> (Vec<String>, Vec<f64>) {
        (self.names, self.values)
    }
}

/// Payload of one data set item
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw or already cleaned signal
    Signal(Signal),

    /// Precomputed feature vector
    Features(FeatureVector),
}

impl Payload {
    /// Short name of the payload kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Signal(_) => "signal",
            Payload::Features(_) => "features",
        }
    }
}

/// One data set item
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub payload: Payload,

    /// Sampling frequency in Hz
    pub sfreq: f64,

    pub label: Label,
}

/// A feature vector paired with its label
/// Rows are filtered as a unit so values and labels cannot drift apart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub values: Vec<f64>,
    pub label: Label,
}

impl FeatureRow {
    pub fn new(values: Vec<f64>, label: Label) -> Self {
        FeatureRow { values, label }
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }
}

/// Split rows into a feature matrix and a label vector
pub fn unzip_rows(rows: &[FeatureRow]) -> (Vec<Vec<f64>>, Vec<Label>) {
    rows.iter().map(|row| (row.values.clone(), row.label)).unzip()
}
