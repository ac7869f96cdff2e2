//! AdaBoost.R2 regression
//!
//! Each round fits a shallow tree under the current sample weights, measures
//! a normalised loss per sample, and shifts weight towards the rows it got
//! wrong. Predictions are the weighted median of the per-round outputs.

use crate::error::{TrainerError, Result};
use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_fit_shapes, check_n_features, Regressor};
use super::params::{invalid, unknown, ParamSet};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Per-sample loss applied to the normalised absolute error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaBoostLoss {
    Linear,
    Square,
    Exponential,
}

impl AdaBoostLoss {
    fn apply(self, normalised_error: f64) -> f64 {
        match self {
            AdaBoostLoss::Linear => normalised_error,
            AdaBoostLoss::Square => normalised_error * normalised_error,
            AdaBoostLoss::Exponential => 1.0 - (-normalised_error).exp(),
        }
    }
}

/// AdaBoost regressor over depth-limited trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub loss: AdaBoostLoss,
    /// Depth of each weak learner
    pub base_max_depth: usize,
    estimators: Vec<DecisionTreeRegressor>,
    estimator_weights: Vec<f64>,
    n_features: usize,
    pub is_fitted: bool,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            loss: AdaBoostLoss::Linear,
            base_max_depth: 3,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
            is_fitted: false,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_loss(mut self, loss: AdaBoostLoss) -> Self {
        self.loss = loss;
        self
    }

    /// Number of rounds kept after early stopping
    pub fn n_fitted_estimators(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.estimator_weights
    }
}

/// Value at which the cumulative weight first reaches half of the total
fn weighted_median(values: &mut [(f64, f64)]) -> f64 {
    values.sort_by(|a, b| a.0.total_cmp(&b.0));
    let total: f64 = values.iter().map(|(_, w)| w).sum();
    let mut cumulative = 0.0;
    for &(value, weight) in values.iter() {
        cumulative += weight;
        if cumulative >= 0.5 * total {
            return value;
        }
    }
    values.last().map_or(0.0, |(v, _)| *v)
}

impl Regressor for AdaBoostRegressor {
    fn name(&self) -> &str {
        "AdaBoostRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;
        if self.n_estimators == 0 {
            return Err(TrainerError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let n_samples = x.nrows();
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        self.estimators.clear();
        self.estimator_weights.clear();
        self.n_features = x.ncols();

        for round in 0..self.n_estimators {
            let mut tree = DecisionTreeRegressor::new().with_max_depth(self.base_max_depth);
            tree.fit_weighted(x, y, Some(&weights))?;

            let predictions = tree.predict(x)?;
            let errors: Array1<f64> = (&predictions - y).mapv(f64::abs);
            let max_error = errors.fold(0.0_f64, |m, &e| m.max(e));

            if max_error <= 0.0 {
                // Perfect fit: nothing left to boost
                self.estimators.push(tree);
                self.estimator_weights.push(1.0);
                break;
            }

            let losses = errors.mapv(|e| self.loss.apply(e / max_error));
            let avg_loss: f64 = losses.iter().zip(weights.iter()).map(|(l, w)| l * w).sum();

            if avg_loss >= 0.5 {
                // Weak learner no better than chance; keep it only if nothing else exists
                if round == 0 {
                    self.estimators.push(tree);
                    self.estimator_weights.push(1.0);
                }
                break;
            }

            let beta = avg_loss / (1.0 - avg_loss);
            let estimator_weight = self.learning_rate * (1.0 / beta.max(1e-300)).ln();

            for (w, l) in weights.iter_mut().zip(losses.iter()) {
                *w *= beta.powf((1.0 - l) * self.learning_rate);
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            self.estimators.push(tree);
            self.estimator_weights.push(estimator_weight);
        }

        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let per_round: Vec<Array1<f64>> = self
            .estimators
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let predictions = (0..x.nrows())
            .map(|i| {
                let mut values: Vec<(f64, f64)> = per_round
                    .iter()
                    .zip(&self.estimator_weights)
                    .map(|(preds, &w)| (preds[i], w))
                    .collect();
                weighted_median(&mut values)
            })
            .collect();

        Ok(predictions)
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            match name.as_str() {
                "n_estimators" => {
                    let n = value.as_usize(name)?;
                    if n == 0 {
                        return Err(invalid(name, value, "must be at least 1"));
                    }
                    self.n_estimators = n;
                }
                "learning_rate" => self.learning_rate = value.as_positive_f64(name)?,
                "loss" => {
                    self.loss = match value.as_str(name)? {
                        "linear" => AdaBoostLoss::Linear,
                        "square" => AdaBoostLoss::Square,
                        "exponential" => AdaBoostLoss::Exponential,
                        _ => {
                            return Err(invalid(name, value, "expected 'linear', 'square' or 'exponential'"))
                        }
                    }
                }
                "max_depth" => {
                    self.base_max_depth = value
                        .as_opt_usize(name)?
                        .ok_or_else(|| invalid(name, value, "weak learners need a finite depth"))?
                }
                _ => return Err(unknown(name, value, "AdaBoost")),
            }
        }
        Ok(())
    }
}
