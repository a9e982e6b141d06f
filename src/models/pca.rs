// Principal component analysis
// Eigendecomposition of the feature covariance matrix, keeping components by count or explained variance

use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::models::{matrix_width, ModelError};

/// How many principal components to keep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PcaThreshold {
    /// Keep exactly this many components (capped at the feature count)
    Components(usize),

    /// Keep the fewest components whose cumulative explained variance reaches this fraction
    ExplainedVariance(f64),
}

impl PcaThreshold {
    pub fn validate(&self) -> Result<(), ModelError> {
        match *self {
            PcaThreshold::Components(0) => Err(ModelError::InvalidHyperparameter(
                "pca threshold has to keep at least one component".to_string(),
            )),
            PcaThreshold::ExplainedVariance(f) if !(f > 0.0 && f <= 1.0) => {
                Err(ModelError::InvalidHyperparameter(format!(
                    "explained variance threshold has to be in (0, 1], got {}",
                    f
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Fitted principal component analysis
#[derive(Debug, Clone)]
pub struct Pca {
    threshold: PcaThreshold,
    mean: Vec<f64>,
    components: Vec<Vec<f64>>,
    explained_variance_ratio: Vec<f64>,
}

impl Pca {
    pub fn new(threshold: PcaThreshold) -> Self {
        Pca {
            threshold,
            mean: Vec::new(),
            components: Vec::new(),
            explained_variance_ratio: Vec::new(),
        }
    }

    /// Kept components, one row per component, one column per input feature
    pub fn components(&self) -> &[Vec<f64>] {
        &self.components
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    pub fn explained_variance_ratio(&self) -> &[f64] {
        &self.explained_variance_ratio
    }

    pub fn fit(&mut self, features: &[Vec<f64>]) -> Result<(), ModelError> {
        self.threshold.validate()?;
        let width = matrix_width(features)?;
        let n = features.len();

        let mut mean = vec![0.0; width];
        for row in features {
            for (m, value) in mean.iter_mut().zip(row) {
                *m += value / n as f64;
            }
        }

        let centered = DMatrix::from_fn(n, width, |i, j| features[i][j] - mean[j]);
        let denominator = if n > 1 { (n - 1) as f64 } else { 1.0 };
        let covariance = (centered.transpose() * &centered) / denominator;

        let eigen = SymmetricEigen::new(covariance);

        // nalgebra does not order eigenvalues
        let mut order: Vec<usize> = (0..width).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        let variances: Vec<f64> = order
            .iter()
            .map(|&i| eigen.eigenvalues[i].max(0.0))
            .collect();
        let total: f64 = variances.iter().sum();
        let ratios: Vec<f64> = variances
            .iter()
            .map(|v| if total > 0.0 { v / total } else { 0.0 })
            .collect();

        let keep = match self.threshold {
            PcaThreshold::Components(k) => k.min(width),
            PcaThreshold::ExplainedVariance(f) => {
                let mut cumulative = 0.0;
                let mut keep = width;
                for (i, ratio) in ratios.iter().enumerate() {
                    cumulative += ratio;
                    if cumulative >= f - 1e-12 {
                        keep = i + 1;
                        break;
                    }
                }
                keep
            }
        };

        self.components = order[..keep]
            .iter()
            .map(|&i| eigen.eigenvectors.column(i).iter().copied().collect())
            .collect();
        self.explained_variance_ratio = ratios[..keep].to_vec();
        self.mean = mean;

        Ok(())
    }

    pub fn transform(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        if self.components.is_empty() {
            return Err(ModelError::NotFitted);
        }

        features
            .iter()
            .map(|row| {
                if row.len() != self.mean.len() {
                    return Err(ModelError::ShapeMismatch {
                        expected: self.mean.len(),
                        found: row.len(),
                    });
                }
                Ok(self
                    .components
                    .iter()
                    .map(|component| {
                        row.iter()
                            .zip(&self.mean)
                            .zip(component)
                            .map(|((x, m), c)| (x - m) * c)
                            .sum()
                    })
                    .collect())
            })
            .collect()
    }

    pub fn fit_transform(&mut self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        self.fit(features)?;
        self.transform(features)
    }
}
