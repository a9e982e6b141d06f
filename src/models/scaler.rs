// Standard scaler
// Zero mean, unit variance per feature column

use crate::models::{matrix_width, ModelError, Scaler};

#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}

impl Scaler for StandardScaler {
    fn fit_transform(&mut self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        let width = matrix_width(features)?;
        let n = features.len() as f64;

        let mut means = vec![0.0; width];
        for row in features {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value / n;
            }
        }

        let mut variances = vec![0.0; width];
        for row in features {
            for ((var, value), mean) in variances.iter_mut().zip(row).zip(&means) {
                *var += (value - mean) * (value - mean) / n;
            }
        }

        // Constant columns keep a scale of 1
        self.scales = variances
            .into_iter()
            .map(|v| if v > f64::EPSILON { v.sqrt() } else { 1.0 })
            .collect();
        self.means = means;

        self.transform(features)
    }

    fn transform(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        if self.means.is_empty() {
            return Err(ModelError::NotFitted);
        }

        features
            .iter()
            .map(|row| {
                if row.len() != self.means.len() {
                    return Err(ModelError::ShapeMismatch {
                        expected: self.means.len(),
                        found: row.len(),
                    });
                }
                Ok(row
                    .iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(value, (mean, scale))| (value - mean) / scale)
                    .collect())
            })
            .collect()
    }

    fn clone_unfitted(&self) -> Box<dyn Scaler> {
        Box::new(StandardScaler::new())
    }
}
