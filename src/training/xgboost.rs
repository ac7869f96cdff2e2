//! XGBoost-style gradient boosting with second-order approximation
//!
//! Key differences from plain gradient boosting:
//! - Uses both gradient and hessian of the loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Minimum child weight constraint

use crate::error::{TrainerError, Result};
use super::models::{check_fit_shapes, check_n_features, Regressor};
use super::params::{invalid, unknown, ParamSet};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }
}

/// Gradient statistics shared by every node of one boosting round
struct GradStats<'a> {
    x: &'a Array2<f64>,
    grad: &'a Array1<f64>,
    hess: &'a Array1<f64>,
    config: &'a XGBoostConfig,
}

impl GradStats<'_> {
    /// Build a tree using exact greedy split finding
    fn build(&self, indices: &[usize], features: &[usize], depth: usize) -> XGBNode {
        let g_sum: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h_sum: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let cfg = self.config;
        let weight = compute_leaf_weight(g_sum, h_sum, cfg.reg_lambda, cfg.reg_alpha);

        if depth >= cfg.max_depth || indices.len() < 2 || h_sum < cfg.min_child_weight {
            return XGBNode::Leaf { weight };
        }

        // Per-feature search runs in parallel; the lowest feature index wins ties
        let candidates: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .map(|&f| self.best_split_for_feature(indices, f))
            .collect();
        let best = candidates
            .into_iter()
            .flatten()
            .fold(None, |best: Option<(usize, f64, f64)>, c| match best {
                Some(b) if b.2 >= c.2 => Some(b),
                _ => Some(c),
            });

        match best {
            Some((feature, threshold, gain)) if gain > cfg.gamma => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| self.x[[i, feature]] <= threshold);

                if left_idx.is_empty() || right_idx.is_empty() {
                    return XGBNode::Leaf { weight };
                }

                XGBNode::Split {
                    feature,
                    threshold,
                    left: Box::new(self.build(&left_idx, features, depth + 1)),
                    right: Box::new(self.build(&right_idx, features, depth + 1)),
                }
            }
            _ => XGBNode::Leaf { weight },
        }
    }

    fn best_split_for_feature(&self, indices: &[usize], feature: usize) -> Option<(usize, f64, f64)> {
        let x = self.x;
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let g_total: f64 = sorted.iter().map(|&i| self.grad[i]).sum();
        let h_total: f64 = sorted.iter().map(|&i| self.hess[i]).sum();
        let lambda = self.config.reg_lambda;
        let parent = g_total * g_total / (h_total + lambda);

        let (mut g_left, mut h_left) = (0.0, 0.0);
        let mut best: Option<(usize, f64, f64)> = None;

        for pos in 0..sorted.len() - 1 {
            let (idx, next) = (sorted[pos], sorted[pos + 1]);
            g_left += self.grad[idx];
            h_left += self.hess[idx];

            if x[[next, feature]] - x[[idx, feature]] < 1e-12 {
                continue;
            }

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < self.config.min_child_weight || h_right < self.config.min_child_weight {
                continue;
            }

            let gain = 0.5
                * (g_left * g_left / (h_left + lambda) + g_right * g_right / (h_right + lambda)
                    - parent);

            if best.map_or(true, |b| gain > b.2) {
                let threshold = (x[[idx, feature]] + x[[next, feature]]) / 2.0;
                best = Some((feature, threshold, gain));
            }
        }

        best
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if alpha > 0.0 {
        if g_sum > alpha {
            g_sum - alpha
        } else if g_sum < -alpha {
            g_sum + alpha
        } else {
            return 0.0;
        }
    } else {
        g_sum
    };
    -g_adj / (h_sum + lambda)
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 || n == 0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).clamp(1, n);
    let mut indices = rand::seq::index::sample(rng, n, k).into_vec();
    indices.sort_unstable();
    indices
}

/// XGBoost Regressor (squared error loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
    is_fitted: bool,
}

impl Default for XGBoostRegressor {
    fn default() -> Self {
        Self::new(XGBoostConfig::default())
    }
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }
}

impl Regressor for XGBoostRegressor {
    fn name(&self) -> &str {
        "XGBoostRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;

        self.base_score = y.mean().unwrap_or(0.0);
        let mut preds = Array1::from_elem(n_samples, self.base_score);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        // Squared error: hessian is constant
        let hess = Array1::from_elem(n_samples, 1.0);

        for _ in 0..self.config.n_estimators {
            let grad: Array1<f64> = &preds - y;

            let rows = subsample(&mut rng, n_samples, self.config.subsample);
            let cols = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let stats = GradStats { x, grad: &grad, hess: &hess, config: &self.config };
            let tree = stats.build(&rows, &cols, 0);

            for (i, row) in x.rows().into_iter().enumerate() {
                preds[i] += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }

        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let lr = self.config.learning_rate;
        let preds: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                self.base_score + self.trees.iter().map(|t| lr * t.predict(row)).sum::<f64>()
            })
            .collect();
        Ok(Array1::from_vec(preds))
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            match name.as_str() {
                "n_estimators" => self.config.n_estimators = value.as_usize(name)?,
                "learning_rate" => self.config.learning_rate = value.as_positive_f64(name)?,
                "max_depth" => {
                    self.config.max_depth = value
                        .as_opt_usize(name)?
                        .ok_or_else(|| invalid(name, value, "boosted trees need a finite depth"))?
                }
                "min_child_weight" => self.config.min_child_weight = value.as_f64(name)?.max(0.0),
                "reg_lambda" => self.config.reg_lambda = value.as_f64(name)?.max(0.0),
                "reg_alpha" => self.config.reg_alpha = value.as_f64(name)?.max(0.0),
                "gamma" => self.config.gamma = value.as_f64(name)?.max(0.0),
                "subsample" => self.config.subsample = value.as_fraction(name)?,
                "colsample_bytree" => self.config.colsample_bytree = value.as_fraction(name)?,
                "random_state" => {
                    self.config.random_state = value.as_opt_usize(name)?.map(|s| s as u64)
                }
                _ => return Err(unknown(name, value, "XGBoost")),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::r2_score;

    fn make_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((80, 3), |(i, j)| ((i * (j + 3)) % 17) as f64 / 4.0);
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|r| r[0] * 1.5 - r[1] + 0.25 * r[2] * r[2])
            .collect();
        (x, y)
    }

    #[test]
    fn test_xgboost_regressor_fits() {
        let (x, y) = make_data();
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 50,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let r2 = r2_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.95, "training R² {} too low", r2);
    }

    #[test]
    fn test_leaf_weight_regularization() {
        assert_eq!(compute_leaf_weight(-4.0, 3.0, 1.0, 0.0), 1.0);
        assert_eq!(compute_leaf_weight(0.5, 3.0, 1.0, 1.0), 0.0);
        assert_eq!(compute_leaf_weight(-5.0, 3.0, 1.0, 1.0), 1.0);
    }

    #[test]
    fn test_subsampled_fit_is_reproducible() {
        let (x, y) = make_data();
        let config = XGBoostConfig {
            n_estimators: 10,
            subsample: 0.8,
            colsample_bytree: 0.67,
            ..Default::default()
        };
        let mut a = XGBoostRegressor::new(config.clone());
        let mut b = XGBoostRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_set_params() {
        let mut model = XGBoostRegressor::default();
        model
            .set_params(&ParamSet::new().with("learning_rate", 0.05).with("n_estimators", 64))
            .unwrap();
        assert_eq!(model.config().learning_rate, 0.05);
        assert_eq!(model.config().n_estimators, 64);
        assert!(model.set_params(&ParamSet::new().with("booster", "dart")).is_err());
        assert!(model.predict(&Array2::zeros((1, 3))).is_err());
    }
}
