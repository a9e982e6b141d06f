// Experiment errors
// Fatal failures of run(): configuration, collaborator, and consistency errors

use thiserror::Error;

use crate::data::DataSetError;
use crate::decoding::DecodingError;
use crate::experiment::config::ConfigError;
use crate::experiment::state::Split;
use crate::pipeline::TraceError;
use crate::procedures::ProcedureError;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Data set error ({split}): {source}")]
    DataSet {
        split: Split,
        #[source]
        source: DataSetError,
    },

    #[error("Cleaning failed for example {index} ({split}): {source}")]
    Cleaning {
        split: Split,
        index: usize,
        #[source]
        source: ProcedureError,
    },

    #[error("Feature vector modifier failed ({split}): {source}")]
    Modifier {
        split: Split,
        #[source]
        source: ProcedureError,
    },

    #[error("Decoding failed: {0}")]
    Decoding(#[from] DecodingError),

    #[error("Number of feature vectors ({features}) does not match number of labels ({labels}) ({split})")]
    LabelCountMismatch {
        split: Split,
        features: usize,
        labels: usize,
    },

    #[error("Removed all feature vectors ({split})")]
    EmptyFeatureStore { split: Split },

    #[error("Number of features ({found}) and feature labels ({expected}) does not match ({split})")]
    FeatureWidthMismatch {
        split: Split,
        expected: usize,
        found: usize,
    },

    #[error("No data set registered for split {split}")]
    MissingSplit { split: Split },

    #[error("No sampling frequency recorded ({split})")]
    MissingSamplingFrequency { split: Split },

    #[error("Worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("Experiment already ran; create a new experiment to run again")]
    AlreadyRun,
}

impl ExperimentError {
    pub(crate) fn data_set(split: Split) -> impl FnOnce(DataSetError) -> Self {
        move |source| ExperimentError::DataSet { split, source }
    }
}
