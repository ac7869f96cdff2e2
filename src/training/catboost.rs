//! CatBoost-style gradient boosting over symmetric trees
//!
//! - Symmetric (oblivious) decision trees: every node at a level shares one split
//! - Features are quantised once into at most `border_count` candidate borders
//! - Leaf values use L2-regularised Newton steps: -G / (H + l2_leaf_reg)

use crate::error::{TrainerError, Result};
use super::models::{check_fit_shapes, check_n_features, Regressor};
use super::params::{invalid, unknown, ParamSet};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostConfig {
    /// Boosting iterations
    pub iterations: usize,
    pub learning_rate: f64,
    /// Depth of every symmetric tree
    pub depth: usize,
    pub l2_leaf_reg: f64,
    /// Maximum candidate borders per feature
    pub border_count: usize,
    pub subsample: f64,
    pub random_state: Option<u64>,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            learning_rate: 0.1,
            depth: 6,
            l2_leaf_reg: 3.0,
            border_count: 32,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

/// Symmetric (oblivious) tree: each level uses the same split feature + threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>,
    /// 2^levels leaf values
    leaf_values: Vec<f64>,
}

impl SymmetricTree {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let idx = self
            .splits
            .iter()
            .fold(0usize, |idx, &(f, thr)| idx * 2 + usize::from(sample[f] > thr));
        self.leaf_values[idx]
    }
}

/// Candidate borders per feature: midpoints between evenly spaced unique values
fn quantize_borders(x: &Array2<f64>, border_count: usize) -> Vec<Vec<f64>> {
    x.columns()
        .into_iter()
        .map(|col| {
            let mut values: Vec<f64> = col.to_vec();
            values.sort_by(f64::total_cmp);
            values.dedup();
            let n_mid = values.len().saturating_sub(1);
            if n_mid == 0 {
                return Vec::new();
            }
            let mids: Vec<f64> = values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
            if n_mid <= border_count {
                return mids;
            }
            let mut borders: Vec<f64> = (0..border_count)
                .map(|k| mids[(k * n_mid + n_mid / 2) / border_count])
                .collect();
            borders.dedup();
            borders
        })
        .collect()
}

/// Bin of `value`: the number of borders strictly below it
fn bin_of(borders: &[f64], value: f64) -> usize {
    borders.partition_point(|&b| b < value)
}

struct SymmetricTreeBuilder<'a> {
    x: &'a Array2<f64>,
    borders: &'a [Vec<f64>],
    /// `bins[i][f]` for every training row
    bins: &'a [Vec<usize>],
    depth: usize,
    l2: f64,
}

impl SymmetricTreeBuilder<'_> {
    fn build(&self, gradients: &[f64], indices: &[usize]) -> SymmetricTree {
        let n_features = self.x.ncols();
        let mut splits = Vec::with_capacity(self.depth);
        let mut buckets: Vec<Vec<usize>> = vec![indices.to_vec()];

        for _ in 0..self.depth {
            let candidates: Vec<Option<(usize, usize, f64)>> = (0..n_features)
                .into_par_iter()
                .map(|f| self.best_border(f, gradients, &buckets))
                .collect();

            // Lowest feature wins ties
            let best = candidates
                .into_iter()
                .flatten()
                .fold(None, |best: Option<(usize, usize, f64)>, c| match best {
                    Some(b) if b.2 >= c.2 => Some(b),
                    _ => Some(c),
                });

            let Some((feat, border_idx, _)) = best else {
                break;
            };
            let thr = self.borders[feat][border_idx];
            splits.push((feat, thr));

            buckets = buckets
                .iter()
                .flat_map(|bucket| {
                    let (left, right): (Vec<usize>, Vec<usize>) =
                        bucket.iter().partition(|&&i| self.x[[i, feat]] <= thr);
                    [left, right]
                })
                .collect();
        }

        let leaf_values = buckets
            .iter()
            .map(|bucket| {
                if bucket.is_empty() {
                    return 0.0;
                }
                let g: f64 = bucket.iter().map(|&i| gradients[i]).sum();
                // Squared error: unit hessian per sample
                -g / (bucket.len() as f64 + self.l2)
            })
            .collect();

        SymmetricTree { splits, leaf_values }
    }

    /// Best border of one feature summed over all current buckets
    fn best_border(
        &self,
        feat: usize,
        gradients: &[f64],
        buckets: &[Vec<usize>],
    ) -> Option<(usize, usize, f64)> {
        let n_borders = self.borders[feat].len();
        if n_borders == 0 {
            return None;
        }

        let mut gains = vec![0.0; n_borders];
        for bucket in buckets {
            if bucket.is_empty() {
                continue;
            }
            let mut g_hist = vec![0.0; n_borders + 1];
            let mut h_hist = vec![0.0; n_borders + 1];
            for &i in bucket {
                let b = self.bins[i][feat];
                g_hist[b] += gradients[i];
                h_hist[b] += 1.0;
            }

            let g_total: f64 = g_hist.iter().sum();
            let h_total = bucket.len() as f64;
            let parent = g_total * g_total / (h_total + self.l2);

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for (k, gain) in gains.iter_mut().enumerate() {
                g_left += g_hist[k];
                h_left += h_hist[k];
                let g_right = g_total - g_left;
                let h_right = h_total - h_left;
                *gain += g_left * g_left / (h_left + self.l2)
                    + g_right * g_right / (h_right + self.l2)
                    - parent;
            }
        }

        gains
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, usize, f64)>, (k, &g)| {
                if g > 1e-12 && best.map_or(true, |b| g > b.2) {
                    Some((feat, k, g))
                } else {
                    best
                }
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    pub config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: usize,
    is_fitted: bool,
}

impl Default for CatBoostRegressor {
    fn default() -> Self {
        Self::new(CatBoostConfig::default())
    }
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for CatBoostRegressor {
    fn name(&self) -> &str {
        "CatBoostRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;
        let n = x.nrows();
        self.n_features = x.ncols();

        let borders = quantize_borders(x, self.config.border_count.max(1));
        let bins: Vec<Vec<usize>> = x
            .rows()
            .into_iter()
            .map(|row| row.iter().zip(&borders).map(|(&v, b)| bin_of(b, v)).collect())
            .collect();
        let builder = SymmetricTreeBuilder {
            x,
            borders: &borders,
            bins: &bins,
            depth: self.config.depth,
            l2: self.config.l2_leaf_reg,
        };

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        self.base_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n, self.base_prediction);
        self.trees.clear();

        for _ in 0..self.config.iterations {
            let gradients: Vec<f64> = predictions.iter().zip(y.iter()).map(|(p, t)| p - t).collect();

            let indices: Vec<usize> = if self.config.subsample < 1.0 {
                let k = ((n as f64 * self.config.subsample).ceil() as usize).clamp(1, n);
                let mut sub: Vec<usize> = (0..n).collect();
                sub.shuffle(&mut rng);
                sub.truncate(k);
                sub.sort_unstable();
                sub
            } else {
                (0..n).collect()
            };

            let tree = builder.build(&gradients, &indices);
            for (i, row) in x.rows().into_iter().enumerate() {
                predictions[i] += self.config.learning_rate * tree.predict(row);
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
        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                self.base_prediction + self.trees.iter().map(|t| lr * t.predict(row)).sum::<f64>()
            })
            .collect())
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            match name.as_str() {
                "iterations" | "n_estimators" => self.config.iterations = value.as_usize(name)?,
                "learning_rate" => self.config.learning_rate = value.as_positive_f64(name)?,
                "depth" | "max_depth" => {
                    let depth = value
                        .as_opt_usize(name)?
                        .ok_or_else(|| invalid(name, value, "symmetric trees need a finite depth"))?;
                    if depth > 16 {
                        return Err(invalid(name, value, "depth must be at most 16"));
                    }
                    self.config.depth = depth;
                }
                "l2_leaf_reg" => self.config.l2_leaf_reg = value.as_f64(name)?.max(0.0),
                "border_count" => self.config.border_count = value.as_usize(name)?.max(1),
                "subsample" => self.config.subsample = value.as_fraction(name)?,
                "random_state" => {
                    self.config.random_state = value.as_opt_usize(name)?.map(|s| s as u64)
                }
                _ => return Err(unknown(name, value, "CatBoost")),
            }
        }
        Ok(())
    }
}
