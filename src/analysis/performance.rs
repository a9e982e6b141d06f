// Performance analysis
// Metric tables over prediction records, and tables with labeled columns

use serde::{Deserialize, Serialize};

use crate::analysis::metrics::Metric;
use crate::decoding::Prediction;

/// Numeric table with named columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl LabeledTable {
    /// Build a table, or `None` when a row width disagrees with the column count
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Option<Self> {
        if rows.iter().any(|row| row.len() != columns.len()) {
            return None;
        }
        Some(LabeledTable { columns, rows })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Column-wise average
    pub fn mean(&self) -> Vec<(String, f64)> {
        let n = self.rows.len();
        self.columns
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let mean = if n == 0 {
                    f64::NAN
                } else {
                    self.rows.iter().map(|row| row[j]).sum::<f64>() / n as f64
                };
                (name.clone(), mean)
            })
            .collect()
    }

    /// Values of one named column
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[j]).collect())
    }
}

/// Metric scores per fold: rows are folds/repetitions, columns are metric names
pub type PerformanceTable = LabeledTable;

/// Apply every metric to every prediction record
pub fn analyze_quality_of_predictions(
    predictions: &[Prediction],
    metrics: &[Box<dyn Metric>],
) -> PerformanceTable {
    let columns = metrics.iter().map(|m| m.name().to_string()).collect();
    let rows = predictions
        .iter()
        .map(|prediction| {
            metrics
                .iter()
                .map(|metric| metric.score(&prediction.y_true, &prediction.y_pred))
                .collect()
        })
        .collect();

    LabeledTable { columns, rows }
}

/// Render column means as "name: value" lines for logging
pub fn format_means(table: &LabeledTable) -> String {
    table
        .mean()
        .iter()
        .map(|(name, value)| format!("{:<20} {:.6}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}
