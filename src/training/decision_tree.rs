//! CART regression tree

use crate::error::{TrainerError, Result};
use super::models::{check_fit_shapes, check_n_features, Regressor};
use super::params::{unknown, ParamSet};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Best split candidate for a node
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Regression tree minimising squared error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    root: Option<TreeNode>,
    /// Maximum depth (unbounded when `None`)
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features sampled per split (all when `None`)
    pub max_features: Option<usize>,
    /// Seed for feature sampling; `None` draws from entropy
    pub random_state: Option<u64>,
    n_features: usize,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Consider only a random subset of features at each split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit on a weighted sample; weights default to 1
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: Option<&Array1<f64>>,
    ) -> Result<()> {
        check_fit_shapes(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let weights = match sample_weight {
            Some(w) if w.len() != n_samples => {
                return Err(TrainerError::ShapeError {
                    expected: format!("{} sample weights", n_samples),
                    actual: format!("{} sample weights", w.len()),
                });
            }
            Some(w) => w.clone(),
            None => Array1::ones(n_samples),
        };

        self.n_features = n_features;
        let mut builder = TreeBuilder {
            x,
            y,
            w: &weights,
            params: self,
            rng: match self.random_state {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            },
        };

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(builder.build(&indices, 0));
        Ok(())
    }

    /// Depth of the fitted tree (a lone leaf has depth 0)
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::n_leaves)
    }
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    w: &'a Array1<f64>,
    params: &'a DecisionTreeRegressor,
    rng: ChaCha8Rng,
}

impl TreeBuilder<'_> {
    fn node_stats(&self, indices: &[usize]) -> (f64, f64, f64) {
        indices.iter().fold((0.0, 0.0, 0.0), |(w, s, sq), &i| {
            let (wi, yi) = (self.w[i], self.y[i]);
            (w + wi, s + wi * yi, sq + wi * yi * yi)
        })
    }

    fn build(&mut self, indices: &[usize], depth: usize) -> TreeNode {
        let n_samples = indices.len();
        let (w_sum, sum, sq_sum) = self.node_stats(indices);
        let value = if w_sum > 0.0 { sum / w_sum } else { 0.0 };
        // Weighted sum of squared deviations
        let sse = (sq_sum - sum * sum / w_sum.max(f64::MIN_POSITIVE)).max(0.0);

        let p = self.params;
        let should_stop = n_samples < p.min_samples_split
            || n_samples < 2 * p.min_samples_leaf
            || p.max_depth.map_or(false, |d| depth >= d)
            || sse <= 1e-12 * w_sum.max(1.0);

        if should_stop {
            return TreeNode::Leaf { value, n_samples };
        }

        let Some(split) = self.find_best_split(indices, sse) else {
            return TreeNode::Leaf { value, n_samples };
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[[i, split.feature_idx]] <= split.threshold);

        if left_idx.len() < p.min_samples_leaf || right_idx.len() < p.min_samples_leaf {
            return TreeNode::Leaf { value, n_samples };
        }

        let left = Box::new(self.build(&left_idx, depth + 1));
        let right = Box::new(self.build(&right_idx, depth + 1));

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples,
            impurity: sse / w_sum.max(f64::MIN_POSITIVE),
        }
    }

    /// Scan each candidate feature in sorted order, keeping running sums
    fn find_best_split(&mut self, indices: &[usize], parent_sse: f64) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        let mut features: Vec<usize> = (0..n_features).collect();
        if let Some(k) = self.params.max_features {
            if k < n_features {
                features.shuffle(&mut self.rng);
                features.truncate(k);
                features.sort_unstable();
            }
        }

        let min_leaf = self.params.min_samples_leaf;
        let (w_total, s_total, sq_total) = self.node_stats(indices);
        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();

        for &f in &features {
            sorted.sort_by(|&a, &b| self.x[[a, f]].total_cmp(&self.x[[b, f]]));

            let (mut w_left, mut s_left, mut sq_left) = (0.0, 0.0, 0.0);
            for pos in 0..sorted.len() - 1 {
                let i = sorted[pos];
                let (wi, yi) = (self.w[i], self.y[i]);
                w_left += wi;
                s_left += wi * yi;
                sq_left += wi * yi * yi;

                let n_left = pos + 1;
                let n_right = sorted.len() - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let current = self.x[[i, f]];
                let next = self.x[[sorted[pos + 1], f]];
                if next - current <= 1e-12 {
                    continue;
                }

                let w_right = w_total - w_left;
                if w_left <= 0.0 || w_right <= 0.0 {
                    continue;
                }
                let s_right = s_total - s_left;
                let sq_right = sq_total - sq_left;
                let sse_left = sq_left - s_left * s_left / w_left;
                let sse_right = sq_right - s_right * s_right / w_right;
                let gain = parent_sse - sse_left - sse_right;

                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx: f,
                        threshold: (current + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

impl Regressor for DecisionTreeRegressor {
    fn name(&self) -> &str {
        "DecisionTreeRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_weighted(x, y, None)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(TrainerError::ModelNotFitted)?;
        check_n_features(self.n_features, x)?;
        Ok(x.rows().into_iter().map(|row| root.predict(row)).collect())
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            match name.as_str() {
                "max_depth" => self.max_depth = value.as_opt_usize(name)?,
                "min_samples_split" => self.min_samples_split = value.as_usize(name)?.max(2),
                "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?.max(1),
                "max_features" => self.max_features = value.as_opt_usize(name)?,
                "random_state" => self.random_state = value.as_opt_usize(name)?.map(|s| s as u64),
                _ => return Err(unknown(name, value, "DecisionTree")),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 1e-10, "unbounded tree should memorise: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0], [5.0, 1.0], [6.0, 0.0]];
        let y = array![0.0, 1.0, 4.0, 9.0, 16.0, 25.0];

        let mut tree = DecisionTreeRegressor::new().with_max_depth(2);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 2);
        assert!(tree.get_n_leaves() <= 4);
    }

    #[test]
    fn test_constant_target_gives_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![4.0, 4.0, 4.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.get_n_leaves(), 1);
        assert_eq!(tree.predict(&array![[10.0]]).unwrap()[0], 4.0);
    }

    #[test]
    fn test_weighted_fit_leans_to_heavy_samples() {
        let x = array![[0.0], [0.0]];
        let y = array![0.0, 10.0];
        let w = array![1.0, 3.0];

        let mut tree = DecisionTreeRegressor::new();
        tree.fit_weighted(&x, &y, Some(&w)).unwrap();
        assert!((tree.predict(&array![[0.0]]).unwrap()[0] - 7.5).abs() < 1e-12);
    }

    #[test]
    fn test_set_params_and_feature_check() {
        let mut tree = DecisionTreeRegressor::new();
        tree.set_params(
            &ParamSet::new()
                .with("max_depth", Some(3))
                .with("min_samples_leaf", 2),
        )
        .unwrap();
        assert_eq!(tree.max_depth, Some(3));
        assert_eq!(tree.min_samples_leaf, 2);
        assert!(tree.set_params(&ParamSet::new().with("criterion", "gini")).is_err());

        tree.fit(&array![[1.0], [2.0], [3.0], [4.0]], &array![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(tree.predict(&array![[1.0, 2.0]]).is_err());
    }
}
