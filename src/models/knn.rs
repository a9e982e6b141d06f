// K-nearest-neighbours classifier
// Majority vote among the k closest training vectors (Euclidean distance)

use std::collections::HashMap;

use crate::data::Label;
use crate::models::{matrix_width, Classifier, ModelError};
use crate::pipeline::WorkerPool;

/// K-Nearest Neighbors classifier
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    k: usize,
    n_jobs: i32,
    train_features: Vec<Vec<f64>>,
    train_labels: Vec<Label>,
}

impl KnnClassifier {
    /// k: number of nearest neighbors to consider
    pub fn new(k: usize) -> Result<Self, ModelError> {
        if k == 0 {
            return Err(ModelError::InvalidHyperparameter(
                "k has to be at least 1".to_string(),
            ));
        }

        Ok(KnnClassifier {
            k,
            n_jobs: 1,
            train_features: Vec::new(),
            train_labels: Vec::new(),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Pool of `n_jobs` threads; `None` predicts on the calling thread
    fn prediction_pool(&self) -> Result<Option<WorkerPool>, ModelError> {
        if self.n_jobs == 1 {
            return Ok(None);
        }
        Ok(Some(WorkerPool::new(self.n_jobs)?))
    }

    fn classify(&self, features: &[f64]) -> Label {
        let mut distances: Vec<(f64, Label)> = self
            .train_features
            .iter()
            .zip(self.train_labels.iter())
            .map(|(row, &label)| (euclidean(features, row), label))
            .collect();

        distances.sort_by(|a, b| a.0.total_cmp(&b.0));

        let k_nearest = &distances[..self.k.min(distances.len())];

        // Votes per class, remembering the rank of each class's nearest neighbour
        let mut votes: HashMap<Label, (usize, usize)> = HashMap::new();
        for (rank, (_, label)) in k_nearest.iter().enumerate() {
            votes.entry(*label).or_insert((0, rank)).0 += 1;
        }

        // Most votes wins; ties go to the class with the nearest neighbour
        votes
            .into_iter()
            .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
            .map(|(label, _)| label)
            .unwrap_or_default()
    }
}

impl Default for KnnClassifier {
    fn default() -> Self {
        KnnClassifier {
            k: 5,
            n_jobs: 1,
            train_features: Vec::new(),
            train_labels: Vec::new(),
        }
    }
}

impl Classifier for KnnClassifier {
    fn name(&self) -> &str {
        "knn"
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[Label]) -> Result<(), ModelError> {
        matrix_width(features)?;
        if features.len() != labels.len() {
            return Err(ModelError::LabelCountMismatch {
                features: features.len(),
                labels: labels.len(),
            });
        }

        self.train_features = features.to_vec();
        self.train_labels = labels.to_vec();
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<Label>, ModelError> {
        let width = match self.train_features.first() {
            Some(row) => row.len(),
            None => return Err(ModelError::NotFitted),
        };

        if let Some(row) = features.iter().find(|row| row.len() != width) {
            return Err(ModelError::ShapeMismatch {
                expected: width,
                found: row.len(),
            });
        }

        let predictions = match self.prediction_pool()? {
            Some(pool) => pool.map_ordered(features, |_, row| self.classify(row)),
            None => features.iter().map(|row| self.classify(row)).collect(),
        };

        Ok(predictions)
    }

    fn n_jobs(&self) -> Option<i32> {
        Some(self.n_jobs)
    }

    fn set_n_jobs(&mut self, n_jobs: i32) {
        self.n_jobs = n_jobs;
    }

    fn clone_unfitted(&self) -> Box<dyn Classifier> {
        Box::new(KnnClassifier {
            k: self.k,
            n_jobs: self.n_jobs,
            train_features: Vec::new(),
            train_labels: Vec::new(),
        })
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clusters() -> (Vec<Vec<f64>>, Vec<Label>) {
        let features = vec![
            vec![0.0, 0.1],
            vec![0.1, 0.0],
            vec![0.2, 0.1],
            vec![5.0, 5.1],
            vec![5.1, 5.0],
            vec![4.9, 5.2],
        ];
        (features, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_knn_classification() {
        let (x, y) = clusters();
        let mut knn = KnnClassifier::new(3).unwrap();
        knn.fit(&x, &y).unwrap();

        let predictions = knn.predict(&[vec![0.05, 0.05], vec![5.0, 5.0]]).unwrap();
        assert_eq!(predictions, vec![0, 1]);
    }

    #[test]
    fn test_parallel_predict_matches_sequential() {
        let (x, y) = clusters();
        let mut knn = KnnClassifier::new(3).unwrap();
        knn.fit(&x, &y).unwrap();
        let sequential = knn.predict(&x).unwrap();

        knn.set_n_jobs(-1);
        assert_eq!(knn.n_jobs(), Some(-1));
        assert_eq!(knn.predict(&x).unwrap(), sequential);
    }

    #[test]
    fn test_prediction_pool_sized_by_n_jobs() {
        let mut knn = KnnClassifier::new(3).unwrap();
        assert!(knn.prediction_pool().unwrap().is_none());

        knn.set_n_jobs(2);
        assert_eq!(knn.prediction_pool().unwrap().unwrap().threads(), 2);

        let (x, y) = clusters();
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_tie_goes_to_nearest() {
        let mut knn = KnnClassifier::new(2).unwrap();
        knn.fit(&[vec![0.0], vec![1.0]], &[7, 3]).unwrap();

        assert_eq!(knn.predict(&[vec![0.9]]).unwrap(), vec![3]);
        assert_eq!(knn.predict(&[vec![0.1]]).unwrap(), vec![7]);
    }

    #[test]
    fn test_predict_before_fit() {
        let knn = KnnClassifier::default();
        assert!(matches!(knn.predict(&[vec![1.0]]), Err(ModelError::NotFitted)));
    }

    #[test]
    fn test_zero_k_rejected() {
        assert!(KnnClassifier::new(0).is_err());
    }

    #[test]
    fn test_clone_unfitted_keeps_hyperparameters() {
        let (x, y) = clusters();
        let mut knn = KnnClassifier::new(1).unwrap();
        knn.fit(&x, &y).unwrap();

        let fresh = knn.clone_unfitted();
        assert_eq!(fresh.name(), "knn");
        assert!(fresh.predict(&x).is_err());
    }
}
