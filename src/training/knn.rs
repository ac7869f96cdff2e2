//! K-nearest neighbours regression
//!
//! Stores the training set and predicts the (optionally distance-weighted)
//! mean target of the `k` closest rows.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{TrainerError, Result};
use super::models::{check_fit_shapes, check_n_features, Regressor};
use super::params::{invalid, unknown, ParamSet};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Euclidean
    }
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

impl Default for WeightScheme {
    fn default() -> Self {
        Self::Uniform
    }
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Default for KNNRegressor {
    fn default() -> Self {
        Self::new(KNNConfig::default())
    }
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.config.weights = weights;
        self
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.config.metric = metric;
        self
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }
}

impl Regressor for KNNRegressor {
    fn name(&self) -> &str {
        "KNNRegressor"
    }

    /// Stores the training data; `k` is clamped to the training size at predict time
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;
        if self.config.n_neighbors == 0 {
            return Err(TrainerError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Predict target values (parallelized over test samples)
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x_train), Some(y_train)) => (x_train, y_train),
            _ => return Err(TrainerError::ModelNotFitted),
        };
        check_n_features(x_train.ncols(), x)?;

        let k = self.config.n_neighbors.min(x_train.nrows());
        let metric = self.config.metric;
        let weights = self.config.weights;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let neighbors = find_k_nearest(x.row(i), x_train, y_train, k, metric);
                weighted_mean_from(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            match name.as_str() {
                "n_neighbors" => {
                    let k = value.as_usize(name)?;
                    if k == 0 {
                        return Err(invalid(name, value, "must be at least 1"));
                    }
                    self.config.n_neighbors = k;
                }
                "weights" => {
                    self.config.weights = match value.as_str(name)? {
                        "uniform" => WeightScheme::Uniform,
                        "distance" => WeightScheme::Distance,
                        _ => return Err(invalid(name, value, "expected 'uniform' or 'distance'")),
                    }
                }
                "p" => {
                    let p = value.as_positive_f64(name)?;
                    self.config.metric = match p {
                        p if p == 1.0 => DistanceMetric::Manhattan,
                        p if p == 2.0 => DistanceMetric::Euclidean,
                        p => DistanceMetric::Minkowski(p),
                    };
                }
                _ => return Err(unknown(name, value, "KNeighbors")),
            }
        }
        Ok(())
    }
}

/// Max-heap entry keeping the k smallest distances; ties go to the earlier row
struct Neighbor {
    dist: f64,
    index: usize,
    target: f64,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then(self.index.cmp(&other.index))
    }
}

/// Find k nearest neighbors using a max-heap in O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (index, row) in x_train.rows().into_iter().enumerate() {
        let candidate = Neighbor {
            dist: compute_distance(point, row, metric),
            index,
            target: y_train[index],
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(top) = heap.peek() {
            if candidate < *top {
                heap.pop();
                heap.push(candidate);
            }
        }
    }

    heap.into_iter().map(|n| (n.dist, n.target)).collect()
}

fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    let pairs = a.iter().zip(b.iter());
    match metric {
        DistanceMetric::Euclidean => pairs.map(|(ai, bi)| (ai - bi).powi(2)).sum::<f64>().sqrt(),
        DistanceMetric::Manhattan => pairs.map(|(ai, bi)| (ai - bi).abs()).sum(),
        DistanceMetric::Minkowski(p) => pairs
            .map(|(ai, bi)| (ai - bi).abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p),
    }
}

/// Mean of the neighbour targets; exact matches dominate under distance weighting
fn weighted_mean_from(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    if neighbors.is_empty() {
        return 0.0;
    }
    match weights {
        WeightScheme::Uniform => {
            neighbors.iter().map(|&(_, t)| t).sum::<f64>() / neighbors.len() as f64
        }
        WeightScheme::Distance => {
            let exact: Vec<f64> = neighbors
                .iter()
                .filter(|&&(d, _)| d == 0.0)
                .map(|&(_, t)| t)
                .collect();
            if !exact.is_empty() {
                return exact.iter().sum::<f64>() / exact.len() as f64;
            }
            let (num, den) = neighbors
                .iter()
                .fold((0.0, 0.0), |(num, den), &(d, t)| (num + t / d, den + 1.0 / d));
            num / den
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_knn_regressor() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];

        let mut knn = KNNRegressor::with_k(2);
        knn.fit(&x, &y).unwrap();

        // 1.4 is closest to 1.0 and 2.0
        let pred = knn.predict(&array![[1.4]]).unwrap();
        assert!((pred[0] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let x = array![[0.0], [10.0]];
        let y = array![2.0, 4.0];

        let mut knn = KNNRegressor::default();
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&array![[3.0]]).unwrap()[0], 3.0);
    }

    #[test]
    fn test_distance_weighting_exact_match() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![10.0, 20.0, 30.0];

        let mut knn = KNNRegressor::with_k(3).with_weights(WeightScheme::Distance);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&array![[1.0]]).unwrap()[0], 20.0);
    }

    #[test]
    fn test_set_params() {
        let mut knn = KNNRegressor::default();
        knn.set_params(&ParamSet::new().with("n_neighbors", 3).with("weights", "distance"))
            .unwrap();
        assert_eq!(knn.config().n_neighbors, 3);
        assert_eq!(knn.config().weights, WeightScheme::Distance);

        assert!(knn.set_params(&ParamSet::new().with("n_neighbors", 0)).is_err());
        assert!(knn.set_params(&ParamSet::new().with("leaf_size", 30)).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let knn = KNNRegressor::default();
        assert!(matches!(knn.predict(&array![[1.0]]), Err(TrainerError::ModelNotFitted)));
    }
}
