// Models module
// Classifier and scaler capabilities, plus built-in implementations

pub mod centroid;
pub mod knn;
pub mod pca;
pub mod scaler;

use thiserror::Error;

use crate::data::Label;

pub use centroid::NearestCentroid;
pub use knn::KnnClassifier;
pub use pca::{Pca, PcaThreshold};
pub use scaler::StandardScaler;

/// Errors raised by classifiers, scalers, and PCA
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model used before fit")]
    NotFitted,

    #[error("Empty input")]
    EmptyInput,

    #[error("Shape mismatch: expected {expected} columns, got {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("Got {features} feature vectors but {labels} labels")]
    LabelCountMismatch { features: usize, labels: usize },

    #[error("Invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),

    #[error("Failed to build prediction pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Classifier capability: fit on labeled feature vectors, predict labels
pub trait Classifier: Send + Sync {
    /// Short name used in logs and fold info
    fn name(&self) -> &str;

    fn fit(&mut self, features: &[Vec<f64>], labels: &[Label]) -> Result<(), ModelError>;

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>, ModelError>;

    /// Parallelism setting, if the classifier exposes one
    fn n_jobs(&self) -> Option<i32> {
        None
    }

    /// Apply the experiment's parallelism setting; ignored by default
    fn set_n_jobs(&mut self, _n_jobs: i32) {}

    /// Per-feature importances of a fitted model, if the model has them
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }

    /// Unfitted copy with the same hyperparameters
    fn clone_unfitted(&self) -> Box<dyn Classifier>;
}

/// Scaler capability: fit-transform on training data, transform on the rest
pub trait Scaler: Send + Sync {
    fn fit_transform(&mut self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError>;

    fn transform(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError>;

    /// Unfitted copy with the same settings
    fn clone_unfitted(&self) -> Box<dyn Scaler>;
}

/// Column count shared by every row, or an error for ragged/empty input
pub(crate) fn matrix_width(features: &[Vec<f64>]) -> Result<usize, ModelError> {
    let width = features.first().map(Vec::len).ok_or(ModelError::EmptyInput)?;

    for row in features {
        if row.len() != width {
            return Err(ModelError::ShapeMismatch {
                expected: width,
                found: row.len(),
            });
        }
    }

    Ok(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_width() {
        assert_eq!(matrix_width(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap(), 2);
        assert!(matches!(matrix_width(&[]), Err(ModelError::EmptyInput)));
        assert!(matches!(
            matrix_width(&[vec![1.0, 2.0], vec![3.0]]),
            Err(ModelError::ShapeMismatch { expected: 2, found: 1 })
        ));
    }
}
