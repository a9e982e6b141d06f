// Feature analysis summary
// Averaged importances, PCA loadings, and feature correlations per feature name

use serde::{Deserialize, Serialize};

use crate::analysis::performance::LabeledTable;

/// Per-feature summary of a development run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub feature_names: Vec<String>,

    /// Classifier importances averaged over folds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_importances: Option<Vec<f64>>,

    /// Absolute PCA loadings averaged over all kept components of all folds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_abs_loadings: Option<Vec<f64>>,
}

impl FeatureSummary {
    /// Feature names ordered by descending importance
    pub fn ranked_by_importance(&self) -> Option<Vec<(String, f64)>> {
        let importances = self.mean_importances.as_ref()?;
        let mut ranked: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Some(ranked)
    }
}

/// Summarize importance and component tables whose columns are feature names
/// PCA tables may carry a trailing "id" column, which is ignored.
pub fn summarize_features(
    feature_names: &[String],
    importances: Option<&LabeledTable>,
    pca_components: Option<&LabeledTable>,
) -> FeatureSummary {
    let column_means = |table: &LabeledTable, abs: bool| -> Vec<f64> {
        feature_names
            .iter()
            .map(|name| {
                let column = table.column(name).unwrap_or_default();
                if column.is_empty() {
                    return 0.0;
                }
                let sum: f64 = column.iter().map(|v| if abs { v.abs() } else { *v }).sum();
                sum / column.len() as f64
            })
            .collect()
    };

    FeatureSummary {
        feature_names: feature_names.to_vec(),
        mean_importances: importances.map(|t| column_means(t, false)),
        mean_abs_loadings: pca_components.map(|t| column_means(t, true)),
    }
}

/// Pearson correlation matrix between feature columns
pub fn feature_correlations(features: &[Vec<f64>], feature_names: &[String]) -> LabeledTable {
    let width = feature_names.len();
    let n = features.len() as f64;

    let means: Vec<f64> = (0..width)
        .map(|j| features.iter().map(|row| row[j]).sum::<f64>() / n)
        .collect();
    let stds: Vec<f64> = (0..width)
        .map(|j| {
            (features
                .iter()
                .map(|row| (row[j] - means[j]).powi(2))
                .sum::<f64>()
                / n)
                .sqrt()
        })
        .collect();

    let rows = (0..width)
        .map(|a| {
            (0..width)
                .map(|b| {
                    if stds[a] == 0.0 || stds[b] == 0.0 {
                        return 0.0;
                    }
                    let covariance = features
                        .iter()
                        .map(|row| (row[a] - means[a]) * (row[b] - means[b]))
                        .sum::<f64>()
                        / n;
                    covariance / (stds[a] * stds[b])
                })
                .collect()
        })
        .collect();

    LabeledTable {
        columns: feature_names.to_vec(),
        rows,
    }
}
