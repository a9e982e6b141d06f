// Experiment configuration
// Settings, plug-ins, verbosity, and the fail-fast configuration checks

use log::LevelFilter;
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::analysis::{accuracy, Metric};
use crate::data::DataSet;
use crate::decoding::{CrossValidator, Decoder};
use crate::experiment::state::Split;
use crate::models::{Classifier, KnnClassifier, PcaThreshold, Scaler, StandardScaler};
use crate::procedures::{
    default_feature_generation_params, BandPowerFeatures, CleaningProcedure,
    FeatureGenerationProcedure, FeatureVectorModifier, Params, ProcedureError,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("please specify what to do: no cleaning procedure, feature generation procedure, or classifier")]
    NothingToDo,

    #[error("unknown verbosity level '{0}'")]
    UnknownVerbosity(String),

    #[error("{which} has to be a key-value mapping")]
    ParamsNotMapping { which: &'static str },

    #[error("{which} rejected by the procedure: {source}")]
    InvalidParams {
        which: &'static str,
        #[source]
        source: ProcedureError,
    },

    #[error("{split} data set does not follow the (example, sfreq, label) contract: {reason}")]
    DataSetContract { split: Split, reason: String },

    #[error("n_splits_or_repetitions has to be an integer larger than 0")]
    InvalidSplitCount,

    #[error("need at least two splits for cross-validation, got {0}")]
    TooFewSplits(usize),

    #[error("n_jobs has to be -1 or an integer larger than 0, got {0}")]
    InvalidNJobs(i32),

    #[error("invalid pca threshold: {0}")]
    InvalidPcaThreshold(String),
}

/// Logging verbosity of an experiment run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Numeric level 0: everything
    NotSet,
    Debug,
    Info,
    Warning,
    Error,
}

impl Verbosity {
    pub fn level_filter(&self) -> LevelFilter {
        match self {
            Verbosity::NotSet => LevelFilter::Trace,
            Verbosity::Debug => LevelFilter::Debug,
            Verbosity::Info => LevelFilter::Info,
            Verbosity::Warning => LevelFilter::Warn,
            Verbosity::Error => LevelFilter::Error,
        }
    }
}

impl FromStr for Verbosity {
    type Err = ConfigError;

    /// Accepts level names or their numeric codes (0, 10, 20, 30, 40)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(Verbosity::NotSet),
            "DEBUG" | "10" => Ok(Verbosity::Debug),
            "INFO" | "20" => Ok(Verbosity::Info),
            "WARNING" | "30" => Ok(Verbosity::Warning),
            "ERROR" | "40" => Ok(Verbosity::Error),
            other => Err(ConfigError::UnknownVerbosity(other.to_string())),
        }
    }
}

/// Full configuration of one experiment
pub struct ExperimentConfig {
    /// Classifier; `None` skips validation/final evaluation
    pub classifier: Option<Box<dyn Classifier>>,

    /// Metrics applied to every prediction record; empty skips performance analysis
    pub metrics: Vec<Box<dyn Metric>>,

    /// Worker threads for cleaning and feature generation (-1 = all cores)
    pub n_jobs: i32,

    pub cleaning_procedure: Option<Box<dyn CleaningProcedure>>,

    /// Keyword parameters for the cleaning procedure (JSON object)
    pub cleaning_params: Option<Value>,

    pub feature_generation_procedure: Option<Box<dyn FeatureGenerationProcedure>>,

    /// Keyword parameters for the feature generation procedure (JSON object)
    pub feature_generation_params: Option<Value>,

    /// Cross-validation folds, or final evaluation repetitions
    pub n_splits_or_repetitions: usize,

    pub shuffle_splits: bool,

    pub pca_thresh: Option<PcaThreshold>,

    pub scaler: Option<Box<dyn Scaler>>,

    pub feature_vector_modifier: Option<Box<dyn FeatureVectorModifier>>,

    /// Validation / final evaluation capability
    pub decoder: Box<dyn Decoder>,

    /// "DEBUG", "INFO", "WARNING", "ERROR" or 0/10/20/30/40
    pub verbosity: String,

    /// Append stage progress to this JSONL file
    pub trace_path: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            classifier: Some(Box::new(KnnClassifier::default())),
            metrics: vec![accuracy()],
            n_jobs: 1,
            cleaning_procedure: None,
            cleaning_params: None,
            feature_generation_procedure: Some(Box::new(BandPowerFeatures)),
            feature_generation_params: Some(default_feature_generation_params()),
            n_splits_or_repetitions: 5,
            shuffle_splits: false,
            pca_thresh: None,
            scaler: Some(Box::new(StandardScaler::new())),
            feature_vector_modifier: None,
            decoder: Box::new(CrossValidator::new()),
            verbosity: "INFO".to_string(),
            trace_path: None,
        }
    }
}

impl ExperimentConfig {
    /// Use a single metric
    pub fn with_metric(mut self, metric: Box<dyn Metric>) -> Self {
        self.metrics = vec![metric];
        self
    }
}

/// Values derived while checking the configuration
#[derive(Debug, Clone)]
pub struct CheckedConfig {
    pub verbosity: Verbosity,
    pub cleaning_params: Params,
    pub feature_generation_params: Params,
}

fn params_object(value: &Option<Value>, which: &'static str) -> Result<Params, ConfigError> {
    match value {
        None | Some(Value::Null) => Ok(Params::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(ConfigError::ParamsNotMapping { which }),
    }
}

fn check_data_set(split: Split, data_set: &dyn DataSet) -> Result<(), ConfigError> {
    let contract = |reason: String| ConfigError::DataSetContract { split, reason };

    if data_set.is_empty() {
        return Err(contract("data set is empty".to_string()));
    }
    data_set
        .get(0)
        .map_err(|e| contract(format!("first example cannot be resolved: {}", e)))?;
    if data_set.labels().len() != data_set.len() {
        return Err(contract(format!(
            "{} examples but {} labels",
            data_set.len(),
            data_set.labels().len()
        )));
    }

    Ok(())
}

/// Check the configuration before any expensive work
///
/// Also applies its side effects: the classifier receives `n_jobs`, and
/// using PCA without a scaler logs a warning. Callable and capability
/// checks are enforced by the plug-in traits at compile time.
pub fn check_config(
    config: &mut ExperimentConfig,
    devel: &dyn DataSet,
    eval: Option<&dyn DataSet>,
) -> Result<CheckedConfig, ConfigError> {
    if config.cleaning_procedure.is_none()
        && config.feature_generation_procedure.is_none()
        && config.classifier.is_none()
    {
        return Err(ConfigError::NothingToDo);
    }

    let verbosity = Verbosity::from_str(&config.verbosity)?;
    let cleaning_params = params_object(&config.cleaning_params, "cleaning_params")?;
    let feature_generation_params =
        params_object(&config.feature_generation_params, "feature_generation_params")?;
    if let Some(procedure) = &config.cleaning_procedure {
        procedure
            .check_params(&cleaning_params)
            .map_err(|source| ConfigError::InvalidParams {
                which: "cleaning_params",
                source,
            })?;
    }
    if let Some(procedure) = &config.feature_generation_procedure {
        procedure
            .check_params(&feature_generation_params)
            .map_err(|source| ConfigError::InvalidParams {
                which: "feature_generation_params",
                source,
            })?;
    }

    check_data_set(Split::Devel, devel)?;
    if let Some(eval) = eval {
        check_data_set(Split::Eval, eval)?;
    }

    if config.n_splits_or_repetitions == 0 {
        return Err(ConfigError::InvalidSplitCount);
    }
    if eval.is_none() && config.n_splits_or_repetitions < 2 {
        return Err(ConfigError::TooFewSplits(config.n_splits_or_repetitions));
    }

    if config.n_jobs < -1 || config.n_jobs == 0 {
        return Err(ConfigError::InvalidNJobs(config.n_jobs));
    }

    if let Some(classifier) = config.classifier.as_mut() {
        if classifier.n_jobs().is_some() {
            classifier.set_n_jobs(config.n_jobs);
        }
    }

    if let Some(threshold) = config.pca_thresh {
        threshold
            .validate()
            .map_err(|e| ConfigError::InvalidPcaThreshold(e.to_string()))?;
        if config.scaler.is_none() {
            log::warn!("using pca on unscaled features");
        }
    }

    Ok(CheckedConfig {
        verbosity,
        cleaning_params,
        feature_generation_params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InMemoryDataSet, Signal};
    use serde_json::json;

    fn devel(n: usize) -> InMemoryDataSet {
        let signals = (0..n)
            .map(|i| Signal::from_channels(vec![vec![i as f32; 16]]))
            .collect();
        let labels = (0..n).map(|i| (i % 2) as u32).collect();
        InMemoryDataSet::from_signals(signals, 100.0, labels).unwrap()
    }

    #[test]
    fn test_verbosity_names_and_codes() {
        assert_eq!("INFO".parse::<Verbosity>().unwrap(), Verbosity::Info);
        assert_eq!("30".parse::<Verbosity>().unwrap(), Verbosity::Warning);
        assert_eq!("0".parse::<Verbosity>().unwrap(), Verbosity::NotSet);
        assert!("LOUD".parse::<Verbosity>().is_err());
        assert_eq!(Verbosity::Error.level_filter(), LevelFilter::Error);
    }

    #[test]
    fn test_default_config_passes() {
        let mut config = ExperimentConfig::default();
        let checked = check_config(&mut config, &devel(10), None).unwrap();
        assert_eq!(checked.verbosity, Verbosity::Info);
        assert_eq!(checked.feature_generation_params["max_freq"], json!(45.0));
    }

    #[test]
    fn test_nothing_to_do() {
        let mut config = ExperimentConfig {
            classifier: None,
            feature_generation_procedure: None,
            cleaning_procedure: None,
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            check_config(&mut config, &devel(4), None),
            Err(ConfigError::NothingToDo)
        ));
    }

    #[test]
    fn test_params_must_be_mapping() {
        let mut config = ExperimentConfig {
            cleaning_params: Some(json!([1, 2, 3])),
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            check_config(&mut config, &devel(4), None),
            Err(ConfigError::ParamsNotMapping { which: "cleaning_params" })
        ));
    }

    #[test]
    fn test_malformed_procedure_params_rejected() {
        let mut config = ExperimentConfig {
            feature_generation_params: Some(json!({"max_freq": "forty"})),
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            check_config(&mut config, &devel(4), None),
            Err(ConfigError::InvalidParams { which: "feature_generation_params", .. })
        ));

        let mut cleaning = ExperimentConfig {
            cleaning_procedure: Some(Box::new(crate::procedures::ClipAndDemean)),
            cleaning_params: Some(json!({"clip_value": -1.0})),
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            check_config(&mut cleaning, &devel(4), None),
            Err(ConfigError::InvalidParams { which: "cleaning_params", .. })
        ));
    }

    #[test]
    fn test_split_count_rules() {
        let mut zero = ExperimentConfig {
            n_splits_or_repetitions: 0,
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            check_config(&mut zero, &devel(4), None),
            Err(ConfigError::InvalidSplitCount)
        ));

        let mut one = ExperimentConfig {
            n_splits_or_repetitions: 1,
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            check_config(&mut one, &devel(4), None),
            Err(ConfigError::TooFewSplits(1))
        ));

        let eval = devel(2);
        let mut one_with_eval = ExperimentConfig {
            n_splits_or_repetitions: 1,
            ..ExperimentConfig::default()
        };
        assert!(check_config(&mut one_with_eval, &devel(4), Some(&eval)).is_ok());
    }

    #[test]
    fn test_n_jobs_rules() {
        for n_jobs in [-2, 0] {
            let mut config = ExperimentConfig {
                n_jobs,
                ..ExperimentConfig::default()
            };
            assert!(matches!(
                check_config(&mut config, &devel(4), None),
                Err(ConfigError::InvalidNJobs(_))
            ));
        }

        let mut all_cores = ExperimentConfig {
            n_jobs: -1,
            ..ExperimentConfig::default()
        };
        check_config(&mut all_cores, &devel(4), None).unwrap();
        let classifier = all_cores.classifier.as_ref().unwrap();
        assert_eq!(classifier.n_jobs(), Some(-1));
    }

    #[test]
    fn test_empty_data_set_rejected() {
        let mut config = ExperimentConfig::default();
        assert!(matches!(
            check_config(&mut config, &InMemoryDataSet::new(), None),
            Err(ConfigError::DataSetContract { split: Split::Devel, .. })
        ));
    }

    #[test]
    fn test_invalid_pca_threshold() {
        let mut config = ExperimentConfig {
            pca_thresh: Some(PcaThreshold::ExplainedVariance(2.0)),
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            check_config(&mut config, &devel(4), None),
            Err(ConfigError::InvalidPcaThreshold(_))
        ));
    }
}
