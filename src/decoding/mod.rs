// Decoding module
// Cross-validation and final evaluation of a classifier on feature matrices

pub mod cross_validation;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::data::Label;
use crate::models::{Classifier, ModelError, PcaThreshold, Scaler};

pub use cross_validation::{kfold_indices, CrossValidator};

#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("Need at least {required} examples for {splits} splits, got {available}")]
    TooFewExamples {
        required: usize,
        splits: usize,
        available: usize,
    },

    #[error("Got {features} feature vectors but {labels} labels")]
    LabelCountMismatch { features: usize, labels: usize },

    #[error("Model error in fold {fold}: {source}")]
    Model {
        fold: usize,
        #[source]
        source: ModelError,
    },
}

/// Role of a prediction record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Predictions on the data the classifier was fit on
    Train,

    /// Held-out fold predictions during cross-validation
    Valid,

    /// Evaluation set predictions during final evaluation
    Test,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Train => "train",
            Role::Valid => "valid",
            Role::Test => "test",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True and predicted labels of one fold or repetition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Fold (validation) or repetition (final evaluation) index
    pub fold: usize,
    pub y_true: Vec<Label>,
    pub y_pred: Vec<Label>,
}

/// Auxiliary information about one fitted fold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoldInfo {
    pub fold: usize,

    /// Name of the fitted classifier
    pub classifier: String,

    /// Kept PCA components, one row per component; the last column is the fold id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pca_components: Option<Vec<Vec<f64>>>,

    /// Classifier feature importances, one per input feature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importances: Option<Vec<f64>>,
}

/// Result of a validation or final evaluation run
#[derive(Debug, Clone, Default)]
pub struct DecodingOutput {
    pub predictions: BTreeMap<Role, Vec<Prediction>>,
    pub info: Vec<FoldInfo>,
}

/// Models and settings shared by every fold
pub struct DecodingSetup<'a> {
    pub classifier: &'a dyn Classifier,
    pub scaler: Option<&'a dyn Scaler>,
    pub pca_thresh: Option<PcaThreshold>,
    pub n_splits_or_repetitions: usize,
    pub shuffle: bool,
}

/// Validation / final evaluation capability
pub trait Decoder: Send + Sync {
    /// Cross-validate on the development split, yielding `train` and `valid` predictions
    fn validate(
        &self,
        features: &[Vec<f64>],
        labels: &[Label],
        setup: &DecodingSetup<'_>,
    ) -> Result<DecodingOutput, DecodingError>;

    /// Train on devel and test on eval, yielding `train` and `test` predictions
    fn final_evaluate(
        &self,
        devel_features: &[Vec<f64>],
        devel_labels: &[Label],
        eval_features: &[Vec<f64>],
        eval_labels: &[Label],
        setup: &DecodingSetup<'_>,
    ) -> Result<DecodingOutput, DecodingError>;
}
