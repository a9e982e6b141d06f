// Experiment settings file
// Serializable subset of the configuration, converted into an ExperimentConfig

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::metric_by_name;
use crate::decoding::CrossValidator;
use crate::experiment::config::ExperimentConfig;
use crate::models::{Classifier, KnnClassifier, ModelError, NearestCentroid, PcaThreshold, StandardScaler};
use crate::procedures::{default_feature_generation_params, BandPowerFeatures, ClipAndDemean};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("Invalid classifier settings: {0}")]
    Classifier(#[from] ModelError),
}

/// Built-in classifier selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    Knn,
    NearestCentroid,
}

/// Experiment settings as stored in a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentSettings {
    /// `null` disables prediction
    pub classifier: Option<ClassifierKind>,

    /// Neighbours for the k-NN classifier
    pub knn_k: usize,

    /// Built-in metric names ("accuracy", "balanced_accuracy")
    pub metrics: Vec<String>,

    pub n_jobs: i32,

    /// Apply the built-in clip-and-demean cleaning
    pub clean: bool,
    pub cleaning_params: Option<Value>,

    /// Apply the built-in band power feature generation
    pub generate_features: bool,
    pub feature_generation_params: Option<Value>,

    pub n_splits_or_repetitions: usize,
    pub shuffle_splits: bool,

    /// Seed for shuffled splits
    pub seed: u64,

    pub pca_thresh: Option<PcaThreshold>,

    /// Standardize features before PCA and classification
    pub scale: bool,

    pub verbosity: String,
    pub trace_path: Option<PathBuf>,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        ExperimentSettings {
            classifier: Some(ClassifierKind::Knn),
            knn_k: 5,
            metrics: vec!["accuracy".to_string()],
            n_jobs: 1,
            clean: false,
            cleaning_params: None,
            generate_features: true,
            feature_generation_params: Some(default_feature_generation_params()),
            n_splits_or_repetitions: 5,
            shuffle_splits: false,
            seed: crate::decoding::cross_validation::DEFAULT_SEED,
            pca_thresh: None,
            scale: true,
            verbosity: "INFO".to_string(),
            trace_path: None,
        }
    }
}

impl ExperimentSettings {
    /// Load settings from a JSON file; missing keys take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Build the configuration, instantiating the built-in plug-ins
    pub fn into_config(self) -> Result<ExperimentConfig, SettingsError> {
        let classifier: Option<Box<dyn Classifier>> = match self.classifier {
            Some(ClassifierKind::Knn) => Some(Box::new(KnnClassifier::new(self.knn_k)?)),
            Some(ClassifierKind::NearestCentroid) => Some(Box::new(NearestCentroid::new())),
            None => None,
        };

        let metrics = self
            .metrics
            .iter()
            .map(|name| metric_by_name(name).ok_or_else(|| SettingsError::UnknownMetric(name.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ExperimentConfig {
            classifier,
            metrics,
            n_jobs: self.n_jobs,
            cleaning_procedure: if self.clean {
                Some(Box::new(ClipAndDemean))
            } else {
                None
            },
            cleaning_params: self.cleaning_params,
            feature_generation_procedure: if self.generate_features {
                Some(Box::new(BandPowerFeatures))
            } else {
                None
            },
            feature_generation_params: self.feature_generation_params,
            n_splits_or_repetitions: self.n_splits_or_repetitions,
            shuffle_splits: self.shuffle_splits,
            pca_thresh: self.pca_thresh,
            scaler: if self.scale {
                Some(Box::new(StandardScaler::new()))
            } else {
                None
            },
            feature_vector_modifier: None,
            decoder: Box::new(CrossValidator::with_seed(self.seed)),
            verbosity: self.verbosity,
            trace_path: self.trace_path,
        })
    }
}
