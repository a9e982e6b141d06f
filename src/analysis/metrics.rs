// Classification metrics
// Named scoring functions over true and predicted labels

use std::collections::BTreeMap;

use crate::data::Label;

/// Metric capability: (true labels, predicted labels) -> score
pub trait Metric: Send + Sync {
    /// Column name in performance tables
    fn name(&self) -> &str;

    fn score(&self, y_true: &[Label], y_pred: &[Label]) -> f64;
}

/// Metric built from a name and a plain function
pub struct FnMetric<F> {
    name: String,
    func: F,
}

impl<F> FnMetric<F>
where
    F: Fn(&[Label], &[Label]) -> f64 + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        FnMetric {
            name: name.into(),
            func,
        }
    }
}

impl<F> Metric for FnMetric<F>
where
    F: Fn(&[Label], &[Label]) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, y_true: &[Label], y_pred: &[Label]) -> f64 {
        (self.func)(y_true, y_pred)
    }
}

/// Fraction of correct predictions
pub fn accuracy_score(y_true: &[Label], y_pred: &[Label]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();

    correct as f64 / y_true.len() as f64
}

/// Mean per-class recall
pub fn balanced_accuracy_score(y_true: &[Label], y_pred: &[Label]) -> f64 {
    let mut per_class: BTreeMap<Label, (usize, usize)> = BTreeMap::new();
    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        let entry = per_class.entry(*t).or_insert((0, 0));
        entry.1 += 1;
        if t == p {
            entry.0 += 1;
        }
    }

    if per_class.is_empty() {
        return 0.0;
    }

    let recall_sum: f64 = per_class
        .values()
        .map(|(hits, total)| *hits as f64 / *total as f64)
        .sum();

    recall_sum / per_class.len() as f64
}

/// Boxed accuracy metric
pub fn accuracy() -> Box<dyn Metric> {
    Box::new(FnMetric::new("accuracy", accuracy_score))
}

/// Boxed balanced accuracy metric
pub fn balanced_accuracy() -> Box<dyn Metric> {
    Box::new(FnMetric::new("balanced_accuracy", balanced_accuracy_score))
}

/// Look up a built-in metric by name
pub fn metric_by_name(name: &str) -> Option<Box<dyn Metric>> {
    match name {
        "accuracy" => Some(accuracy()),
        "balanced_accuracy" => Some(balanced_accuracy()),
        _ => None,
    }
}
