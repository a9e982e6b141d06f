// Analysis module
// Metrics, per-role performance tables, and feature summaries

pub mod metrics;
pub mod performance;
pub mod summary;

pub use metrics::{
    accuracy, accuracy_score, balanced_accuracy, balanced_accuracy_score, metric_by_name,
    FnMetric, Metric,
};
pub use performance::{analyze_quality_of_predictions, format_means, LabeledTable, PerformanceTable};
pub use summary::{feature_correlations, summarize_features, FeatureSummary};
