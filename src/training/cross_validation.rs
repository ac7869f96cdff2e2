//! Cross-validation splitters and R² fold scoring

use crate::error::{TrainerError, Result};
use super::models::Regressor;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Contiguous, unshuffled K-fold splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossValidator {
    n_splits: usize,
}

impl CrossValidator {
    pub fn k_fold(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate train/test splits
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        let n_splits = self.n_splits;
        if n_splits < 2 {
            return Err(TrainerError::ConfigError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(TrainerError::DataError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        // The first n_samples % n_splits folds take one extra sample
        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = (current..current + fold_size).collect();
            let train_indices = (0..current).chain(current + fold_size..n_samples).collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }
}

/// Cross-validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds.max(1) as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>()
            / n_folds.max(1) as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

/// Fit a fresh clone of `estimator` on each training fold and score R² on the held-out fold
pub fn cross_val_score<R>(
    estimator: &R,
    x: &Array2<f64>,
    y: &Array1<f64>,
    cv: &CrossValidator,
) -> Result<CVResults>
where
    R: Regressor + Clone,
{
    let splits = cv.split(x.nrows())?;
    let scores = splits
        .iter()
        .map(|split| {
            let mut model = estimator.clone();
            model.fit(
                &x.select(Axis(0), &split.train_indices),
                &y.select(Axis(0), &split.train_indices),
            )?;
            model.score(
                &x.select(Axis(0), &split.test_indices),
                &y.select(Axis(0), &split.test_indices),
            )
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(CVResults::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::linear_models::LinearRegression;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::k_fold(5);
        let splits = cv.split(100).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_unshuffled_folds_are_contiguous_and_front_loaded() {
        let splits = CrossValidator::k_fold(3).split(10).unwrap();
        assert_eq!(splits[0].test_indices, vec![0, 1, 2, 3]);
        assert_eq!(splits[1].test_indices, vec![4, 5, 6]);
        assert_eq!(splits[2].test_indices, vec![7, 8, 9]);
    }

    #[test]
    fn test_too_few_samples() {
        assert!(CrossValidator::k_fold(3).split(2).is_err());
        assert!(CrossValidator::k_fold(1).split(10).is_err());
    }

    #[test]
    fn test_cross_val_score_linear() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| (i as f64) * (j as f64 + 1.0) + (i % 4) as f64);
        let y: Array1<f64> = x.rows().into_iter().map(|r| 3.0 * r[0] - r[1] + 2.0).collect();

        let results = cross_val_score(&LinearRegression::new(), &x, &y, &CrossValidator::k_fold(3)).unwrap();
        assert_eq!(results.n_folds, 3);
        assert!(results.mean_score > 0.999);
        assert!(results.std_score < 1e-6);
    }
}
