// Nearest centroid classifier
// Assigns each vector to the class with the closest mean; exposes feature importances

use std::collections::BTreeMap;

use crate::data::Label;
use crate::models::{matrix_width, Classifier, ModelError};

/// Nearest centroid classifier
#[derive(Debug, Clone, Default)]
pub struct NearestCentroid {
    centroids: Vec<(Label, Vec<f64>)>,
}

impl NearestCentroid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitted class centroids ordered by label
    pub fn centroids(&self) -> &[(Label, Vec<f64>)] {
        &self.centroids
    }
}

impl Classifier for NearestCentroid {
    fn name(&self) -> &str {
        "nearest_centroid"
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[Label]) -> Result<(), ModelError> {
        let width = matrix_width(features)?;
        if features.len() != labels.len() {
            return Err(ModelError::LabelCountMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }

        let mut sums: BTreeMap<Label, (Vec<f64>, usize)> = BTreeMap::new();
        for (row, &label) in features.iter().zip(labels) {
            let entry = sums.entry(label).or_insert_with(|| (vec![0.0; width], 0));
            for (acc, value) in entry.0.iter_mut().zip(row) {
                *acc += value;
            }
            entry.1 += 1;
        }

        self.centroids = sums
            .into_iter()
            .map(|(label, (sum, count))| {
                (label, sum.into_iter().map(|v| v / count as f64).collect())
            })
            .collect();

        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>, ModelError> {
        let width = match self.centroids.first() {
            Some((_, centroid)) => centroid.len(),
            None => return Err(ModelError::NotFitted),
        };

        features
            .iter()
            .map(|row| {
                if row.len() != width {
                    return Err(ModelError::ShapeMismatch {
                        expected: width,
                        found: row.len(),
                    });
                }

                let nearest = self
                    .centroids
                    .iter()
                    .map(|(label, centroid)| {
                        let distance: f64 = row
                            .iter()
                            .zip(centroid)
                            .map(|(x, c)| (x - c) * (x - c))
                            .sum();
                        (*label, distance)
                    })
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(label, _)| label)
                    .unwrap_or_default();

                Ok(nearest)
            })
            .collect()
    }

    /// Spread (max - min) of the class centroids per feature, normalized to sum to 1
    fn feature_importances(&self) -> Option<Vec<f64>> {
        let width = self.centroids.first()?.1.len();

        let spreads: Vec<f64> = (0..width)
            .map(|j| {
                let column = self.centroids.iter().map(|(_, c)| c[j]);
                let max = column.clone().fold(f64::NEG_INFINITY, f64::max);
                let min = column.fold(f64::INFINITY, f64::min);
                max - min
            })
            .collect();

        let total: f64 = spreads.iter().sum();
        if total > 0.0 {
            Some(spreads.into_iter().map(|s| s / total).collect())
        } else {
            Some(vec![0.0; width])
        }
    }

    fn clone_unfitted(&self) -> Box<dyn Classifier> {
        Box::new(NearestCentroid::new())
    }
}
