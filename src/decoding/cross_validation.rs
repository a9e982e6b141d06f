// K-fold cross-validation and repeated final evaluation
// Fits scaler, optional PCA, and a fresh classifier per fold

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::data::Label;
use crate::decoding::{
    Decoder, DecodingError, DecodingOutput, DecodingSetup, FoldInfo, Prediction, Role,
};
use crate::models::{ModelError, Pca};

/// Default seed for shuffled splits
pub const DEFAULT_SEED: u64 = 42;

/// Built-in validation capability
#[derive(Debug, Clone)]
pub struct CrossValidator {
    seed: u64,
}

impl CrossValidator {
    pub fn new() -> Self {
        CrossValidator { seed: DEFAULT_SEED }
    }

    /// Seed used when shuffling examples before splitting
    pub fn with_seed(seed: u64) -> Self {
        CrossValidator { seed }
    }
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// (train indices, test indices) for each of `k` contiguous folds
///
/// The first `n % k` folds hold one extra example. When `shuffle` is set the
/// example order is permuted with a seeded RNG before folding.
pub fn kfold_indices(
    n: usize,
    k: usize,
    shuffle: bool,
    seed: u64,
) -> Result<Vec<(Vec<usize>, Vec<usize>)>, DecodingError> {
    if k < 2 || n < k {
        return Err(DecodingError::TooFewExamples {
            required: k.max(2),
            splits: k,
            available: n,
        });
    }

    let mut order: Vec<usize> = (0..n).collect();
    if shuffle {
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);
    }

    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = n / k + usize::from(fold < n % k);
        let test: Vec<usize> = order[start..start + size].to_vec();
        let train: Vec<usize> = order[..start]
            .iter()
            .chain(order[start + size..].iter())
            .copied()
            .collect();
        folds.push((train, test));
        start += size;
    }

    Ok(folds)
}

fn select<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

/// Fit preprocessing and a fresh classifier on the training part of one fold
/// Returns (train predictions, test predictions, fold info).
fn fit_fold(
    setup: &DecodingSetup<'_>,
    fold: usize,
    train_features: &[Vec<f64>],
    train_labels: &[Label],
    test_features: &[Vec<f64>],
) -> Result<(Vec<Label>, Vec<Label>, FoldInfo), ModelError> {
    let (mut train_x, mut test_x) = match setup.scaler {
        Some(template) => {
            let mut scaler = template.clone_unfitted();
            let train_x = scaler.fit_transform(train_features)?;
            let test_x = scaler.transform(test_features)?;
            (train_x, test_x)
        }
        None => (train_features.to_vec(), test_features.to_vec()),
    };

    let mut info = FoldInfo {
        fold,
        classifier: setup.classifier.name().to_string(),
        ..FoldInfo::default()
    };

    if let Some(threshold) = setup.pca_thresh {
        let mut pca = Pca::new(threshold);
        train_x = pca.fit_transform(&train_x)?;
        test_x = pca.transform(&test_x)?;

        log::debug!(
            "Fold {}: kept {} principal components",
            fold,
            pca.n_components()
        );

        info.pca_components = Some(
            pca.components()
                .iter()
                .map(|component| {
                    let mut row = component.clone();
                    row.push(fold as f64);
                    row
                })
                .collect(),
        );
    }

    let mut classifier = setup.classifier.clone_unfitted();
    classifier.fit(&train_x, train_labels)?;
    let train_pred = classifier.predict(&train_x)?;
    let test_pred = classifier.predict(&test_x)?;

    if info.pca_components.is_none() {
        info.feature_importances = classifier.feature_importances();
    }

    Ok((train_pred, test_pred, info))
}

impl Decoder for CrossValidator {
    fn validate(
        &self,
        features: &[Vec<f64>],
        labels: &[Label],
        setup: &DecodingSetup<'_>,
    ) -> Result<DecodingOutput, DecodingError> {
        if features.len() != labels.len() {
            return Err(DecodingError::LabelCountMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }

        let folds = kfold_indices(
            features.len(),
            setup.n_splits_or_repetitions,
            setup.shuffle,
            self.seed,
        )?;

        let mut output = DecodingOutput::default();
        for (fold, (train_idx, test_idx)) in folds.iter().enumerate() {
            let train_x = select(features, train_idx);
            let train_y = select(labels, train_idx);
            let test_x = select(features, test_idx);
            let test_y = select(labels, test_idx);

            let (train_pred, test_pred, info) =
                fit_fold(setup, fold, &train_x, &train_y, &test_x)
                    .map_err(|source| DecodingError::Model { fold, source })?;

            push_prediction(&mut output.predictions, Role::Train, fold, train_y, train_pred);
            push_prediction(&mut output.predictions, Role::Valid, fold, test_y, test_pred);
            output.info.push(info);
        }

        Ok(output)
    }

    fn final_evaluate(
        &self,
        devel_features: &[Vec<f64>],
        devel_labels: &[Label],
        eval_features: &[Vec<f64>],
        eval_labels: &[Label],
        setup: &DecodingSetup<'_>,
    ) -> Result<DecodingOutput, DecodingError> {
        if devel_features.len() != devel_labels.len() {
            return Err(DecodingError::LabelCountMismatch {
                features: devel_features.len(),
                labels: devel_labels.len(),
            });
        }
        if eval_features.len() != eval_labels.len() {
            return Err(DecodingError::LabelCountMismatch {
                features: eval_features.len(),
                labels: eval_labels.len(),
            });
        }

        let mut output = DecodingOutput::default();
        for repetition in 0..setup.n_splits_or_repetitions {
            let (train_pred, eval_pred, info) = fit_fold(
                setup,
                repetition,
                devel_features,
                devel_labels,
                eval_features,
            )
            .map_err(|source| DecodingError::Model {
                fold: repetition,
                source,
            })?;

            push_prediction(
                &mut output.predictions,
                Role::Train,
                repetition,
                devel_labels.to_vec(),
                train_pred,
            );
            push_prediction(
                &mut output.predictions,
                Role::Test,
                repetition,
                eval_labels.to_vec(),
                eval_pred,
            );
            output.info.push(info);
        }

        Ok(output)
    }
}

fn push_prediction(
    predictions: &mut BTreeMap<Role, Vec<Prediction>>,
    role: Role,
    fold: usize,
    y_true: Vec<Label>,
    y_pred: Vec<Label>,
) {
    predictions.entry(role).or_default().push(Prediction {
        fold,
        y_true,
        y_pred,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KnnClassifier, NearestCentroid, PcaThreshold, StandardScaler};

    fn two_clusters(n_per_class: usize) -> (Vec<Vec<f64>>, Vec<Label>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_per_class {
            let jitter = i as f64 * 0.01;
            features.push(vec![0.0 + jitter, 1.0 - jitter]);
            labels.push(0);
            features.push(vec![3.0 + jitter, -2.0 - jitter]);
            labels.push(1);
        }
        (features, labels)
    }

    #[test]
    fn test_kfold_partitions_all_examples() {
        let folds = kfold_indices(10, 3, false, 0).unwrap();
        assert_eq!(folds.len(), 3);

        let sizes: Vec<usize> = folds.iter().map(|(_, test)| test.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);

        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, test)| test.clone()).collect();
        seen.sort();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());

        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 10);
            assert!(test.iter().all(|i| !train.contains(i)));
        }
    }

    #[test]
    fn test_kfold_shuffle_is_seeded() {
        let a = kfold_indices(20, 4, true, 7).unwrap();
        let b = kfold_indices(20, 4, true, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kfold_rejects_too_few_examples() {
        assert!(kfold_indices(3, 5, false, 0).is_err());
        assert!(kfold_indices(3, 1, false, 0).is_err());
    }

    #[test]
    fn test_validate_produces_train_and_valid() {
        let (x, y) = two_clusters(5);
        let knn = KnnClassifier::new(1).unwrap();
        let scaler = StandardScaler::new();
        let setup = DecodingSetup {
            classifier: &knn,
            scaler: Some(&scaler),
            pca_thresh: None,
            n_splits_or_repetitions: 5,
            shuffle: false,
        };

        let output = CrossValidator::new().validate(&x, &y, &setup).unwrap();
        assert_eq!(output.predictions[&Role::Train].len(), 5);
        assert_eq!(output.predictions[&Role::Valid].len(), 5);
        assert_eq!(output.info.len(), 5);

        let valid_total: usize = output.predictions[&Role::Valid]
            .iter()
            .map(|p| p.y_true.len())
            .sum();
        assert_eq!(valid_total, 10);

        for prediction in &output.predictions[&Role::Valid] {
            assert_eq!(prediction.y_true, prediction.y_pred);
        }
    }

    #[test]
    fn test_pca_components_carry_fold_id() {
        let (x, y) = two_clusters(4);
        let clf = NearestCentroid::new();
        let setup = DecodingSetup {
            classifier: &clf,
            scaler: None,
            pca_thresh: Some(PcaThreshold::Components(1)),
            n_splits_or_repetitions: 2,
            shuffle: true,
        };

        let output = CrossValidator::new().validate(&x, &y, &setup).unwrap();
        let components = output.info[1].pca_components.as_ref().unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].len(), 3);
        assert_eq!(components[0][2], 1.0);
        assert!(output.info[1].feature_importances.is_none());
    }

    #[test]
    fn test_importances_without_pca() {
        let (x, y) = two_clusters(4);
        let clf = NearestCentroid::new();
        let setup = DecodingSetup {
            classifier: &clf,
            scaler: None,
            pca_thresh: None,
            n_splits_or_repetitions: 2,
            shuffle: false,
        };

        let output = CrossValidator::new().validate(&x, &y, &setup).unwrap();
        assert_eq!(output.info[0].feature_importances.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_final_evaluate_repetitions() {
        let (x, y) = two_clusters(5);
        let (eval_x, eval_y) = two_clusters(2);
        let knn = KnnClassifier::new(3).unwrap();
        let setup = DecodingSetup {
            classifier: &knn,
            scaler: None,
            pca_thresh: None,
            n_splits_or_repetitions: 3,
            shuffle: false,
        };

        let output = CrossValidator::new()
            .final_evaluate(&x, &y, &eval_x, &eval_y, &setup)
            .unwrap();

        assert_eq!(output.predictions[&Role::Train].len(), 3);
        assert_eq!(output.predictions[&Role::Test].len(), 3);
        assert!(!output.predictions.contains_key(&Role::Valid));
        assert_eq!(output.predictions[&Role::Test][2].y_pred, eval_y);
    }
}
