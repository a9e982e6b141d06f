// Experiment state
// Per-split records, stage names, and the timing registry

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::analysis::LabeledTable;
use crate::data::{DataSet, FeatureRow, Signal};
use crate::decoding::FoldInfo;

/// Data split; devel always runs before eval
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Devel,
    Eval,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Devel => "devel",
            Split::Eval => "eval",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timed pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Cleaning,
    Loading,
    FeatureGeneration,
    Validation,
    FinalEvaluation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Cleaning => "cleaning",
            Stage::Loading => "loading",
            Stage::FeatureGeneration => "feature generation",
            Stage::Validation => "validation",
            Stage::FinalEvaluation => "final evaluation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an experiment instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Constructed, configuration not yet checked
    Unvalidated,
    /// Configuration checks passed, stages running
    Checked,
    /// `run()` returned successfully
    Done,
    /// `run()` aborted with an error
    Failed,
}

/// Auxiliary metadata collected for one split
#[derive(Debug, Clone, Default)]
pub struct SplitInfo {
    /// Sampling frequency of the split, recorded once
    pub sfreq: Option<f64>,

    /// Per-fold (or per-repetition) decoding info
    pub folds: Vec<FoldInfo>,

    /// PCA components of all folds with feature names (+ "id") as columns
    pub pca_components: Option<LabeledTable>,

    /// Classifier importances of all folds with feature names as columns
    pub feature_importances: Option<LabeledTable>,
}

/// Everything the experiment tracks for one split
pub struct SplitState {
    pub data_set: Box<dyn DataSet>,

    /// Cleaned signals, index-aligned with the data set's examples
    pub clean: Vec<Signal>,

    /// Feature vectors paired with their labels
    pub features: Vec<FeatureRow>,

    pub info: SplitInfo,
}

impl SplitState {
    pub fn new(data_set: Box<dyn DataSet>) -> Self {
        SplitState {
            data_set,
            clean: Vec::new(),
            features: Vec::new(),
            info: SplitInfo::default(),
        }
    }
}

/// Elapsed wall-clock time per stage and split
#[derive(Debug, Clone, Default)]
pub struct Timings {
    entries: BTreeMap<Stage, BTreeMap<Split, Duration>>,
}

impl Timings {
    pub fn record(&mut self, stage: Stage, split: Split, elapsed: Duration) {
        self.entries.entry(stage).or_default().insert(split, elapsed);
    }

    pub fn get(&self, stage: Stage, split: Split) -> Option<Duration> {
        self.entries.get(&stage)?.get(&split).copied()
    }

    /// All stages that recorded at least one split
    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.entries.keys().copied()
    }

    pub fn total(&self) -> Duration {
        self.entries.values().flat_map(|splits| splits.values()).sum()
    }
}
