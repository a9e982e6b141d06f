// Procedures module
// Cleaning, feature generation, and feature vector modification plug-ins

pub mod cleaning;
pub mod spectral;

use serde_json::Value;
use thiserror::Error;

use crate::data::{DataSet, FeatureRow, FeatureVector, Signal};

pub use cleaning::{clip_and_demean, ClipAndDemean};
pub use spectral::{
    band_power_features, default_feature_generation_params, BandPowerFeatures, BandPowerParams,
};

/// Keyword parameters handed to a procedure alongside each example
pub type Params = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("Procedure failed: {0}")]
    Failed(String),
}

/// Cleaning procedure: (signal, sfreq, params) -> (cleaned signal, sfreq)
pub trait CleaningProcedure: Send + Sync {
    /// Reject malformed params before any example is cleaned
    fn check_params(&self, _params: &Params) -> Result<(), ProcedureError> {
        Ok(())
    }

    fn clean(
        &self,
        signal: &Signal,
        sfreq: f64,
        params: &Params,
    ) -> Result<(Signal, f64), ProcedureError>;
}

impl<F> CleaningProcedure for F
where
    F: Fn(&Signal, f64, &Params) -> Result<(Signal, f64), ProcedureError> + Send + Sync,
{
    fn clean(
        &self,
        signal: &Signal,
        sfreq: f64,
        params: &Params,
    ) -> Result<(Signal, f64), ProcedureError> {
        self(signal, sfreq, params)
    }
}

/// Feature generation procedure: (clean signal, sfreq, params) -> named feature vector
/// `None` marks a failed example; it is dropped together with its label.
pub trait FeatureGenerationProcedure: Send + Sync {
    /// Reject malformed params before any example is processed
    ///
    /// A procedure that reads params must report bad ones here rather than
    /// returning `None` from `generate`, which drops the example.
    fn check_params(&self, _params: &Params) -> Result<(), ProcedureError> {
        Ok(())
    }

    fn generate(&self, signal: &Signal, sfreq: f64, params: &Params) -> Option<FeatureVector>;
}

impl<F> FeatureGenerationProcedure for F
where
    F: Fn(&Signal, f64, &Params) -> Option<FeatureVector> + Send + Sync,
{
    fn generate(&self, signal: &Signal, sfreq: f64, params: &Params) -> Option<FeatureVector> {
        self(signal, sfreq, params)
    }
}

/// Post-processing hook over a whole split's feature store
/// Returns the replacement rows and the replacement feature names.
pub trait FeatureVectorModifier: Send + Sync {
    fn modify(
        &self,
        data_set: &dyn DataSet,
        rows: Vec<FeatureRow>,
        feature_names: Vec<String>,
    ) -> Result<(Vec<FeatureRow>, Vec<String>), ProcedureError>;
}

impl<F> FeatureVectorModifier for F
where
    F: Fn(
            &dyn DataSet,
            Vec<FeatureRow>,
            Vec<String>,
        ) -> Result<(Vec<FeatureRow>, Vec<String>), ProcedureError>
        + Send
        + Sync,
{
    fn modify(
        &self,
        data_set: &dyn DataSet,
        rows: Vec<FeatureRow>,
        feature_names: Vec<String>,
    ) -> Result<(Vec<FeatureRow>, Vec<String>), ProcedureError> {
        self(data_set, rows, feature_names)
    }
}

/// Read a numeric parameter, falling back to `default` when absent
pub fn param_f64(params: &Params, name: &str, default: f64) -> Result<f64, ProcedureError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value.as_f64().ok_or_else(|| ProcedureError::InvalidParam {
            name: name.to_string(),
            reason: format!("expected a number, got {}", value),
        }),
    }
}

/// Read a non-negative integer parameter, falling back to `default` when absent
pub fn param_usize(params: &Params, name: &str, default: usize) -> Result<usize, ProcedureError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| ProcedureError::InvalidParam {
                name: name.to_string(),
                reason: format!("expected a non-negative integer, got {}", value),
            }),
    }
}
