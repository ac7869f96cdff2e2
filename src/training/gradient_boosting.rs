//! Gradient boosted regression trees
//!
//! Least-squares boosting: each round fits a shallow tree to the current
//! residuals on an optional row/column subsample and adds a shrunken copy of
//! its output to the running prediction.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_fit_shapes, check_n_features, Regressor};
use super::params::{invalid, unknown, ParamSet};
use crate::error::{TrainerError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Column subsample ratio
    pub colsample_bytree: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    col_indices_per_tree: Vec<Vec<usize>>,
    initial_prediction: f64,
    is_fitted: bool,
    n_features: usize,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            initial_prediction: 0.0,
            is_fitted: false,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn sample_indices(n: usize, ratio: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if ratio >= 1.0 || n == 0 {
            return (0..n).collect();
        }
        let sample_size = (((n as f64) * ratio).ceil() as usize).clamp(1, n);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size);
        indices.sort_unstable();
        indices
    }
}

impl Regressor for GradientBoostingRegressor {
    fn name(&self) -> &str {
        "GradientBoostingRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        self.initial_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.is_fitted = false;
        self.trees.clear();
        self.col_indices_per_tree.clear();
        self.n_features = n_features;

        for _ in 0..self.config.n_estimators {
            let residuals = y - &predictions;

            let rows = Self::sample_indices(n_samples, self.config.subsample, &mut rng);
            let cols = Self::sample_indices(n_features, self.config.colsample_bytree, &mut rng);

            let x_cols = x.select(Axis(1), &cols);
            let x_sub = x_cols.select(Axis(0), &rows);
            let r_sub = residuals.select(Axis(0), &rows);

            let mut tree = DecisionTreeRegressor::new()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &r_sub)?;

            // Every row moves, including those left out of this round's subsample
            let update = tree.predict(&x_cols)?;
            predictions.scaled_add(self.config.learning_rate, &update);

            self.trees.push(tree);
            self.col_indices_per_tree.push(cols);
        }

        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(TrainerError::ModelNotFitted);
        }
        check_n_features(self.n_features, x)?;

        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for (tree, cols) in self.trees.iter().zip(&self.col_indices_per_tree) {
            let tree_pred = tree.predict(&x.select(Axis(1), cols))?;
            predictions.scaled_add(self.config.learning_rate, &tree_pred);
        }

        Ok(predictions)
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
                "min_samples_leaf" => self.config.min_samples_leaf = value.as_usize(name)?.max(1),
                "subsample" => self.config.subsample = value.as_fraction(name)?,
                "colsample_bytree" => self.config.colsample_bytree = value.as_fraction(name)?,
                "random_state" => {
                    self.config.random_state = value.as_opt_usize(name)?.map(|s| s as u64)
                }
                _ => return Err(unknown(name, value, "GradientBoost")),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| i as f64 * 0.1).collect())
            .unwrap();
        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| row[0] * 2.0 + row[1] * 0.5 + 1.0)
            .collect();
        (x, y)
    }

    fn mse(y: &Array1<f64>, pred: &Array1<f64>) -> f64 {
        y.iter().zip(pred.iter()).map(|(a, b)| (a - b).powi(2)).sum::<f64>() / y.len() as f64
    }

    #[test]
    fn test_gradient_boosting_regressor() {
        let (x, y) = create_regression_data();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 10,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions.len(), 100);
        let y_var = y.var(0.0);
        assert!(mse(&y, &predictions) < y_var);
    }

    #[test]
    fn test_more_rounds_reduce_training_error() {
        let (x, y) = create_regression_data();
        let fit = |rounds: usize| {
            let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
                n_estimators: rounds,
                ..Default::default()
            });
            model.fit(&x, &y).unwrap();
            mse(&y, &model.predict(&x).unwrap())
        };
        assert!(fit(50) < fit(5));
    }

    #[test]
    fn test_subsample_is_reproducible() {
        let (x, y) = create_regression_data();
        let config = GradientBoostingConfig {
            n_estimators: 20,
            subsample: 0.7,
            ..Default::default()
        };
        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_set_params() {
        let mut model = GradientBoostingRegressor::default();
        model
            .set_params(
                &ParamSet::new()
                    .with("learning_rate", 0.05)
                    .with("subsample", 0.85)
                    .with("n_estimators", 32),
            )
            .unwrap();
        assert_eq!(model.config().n_estimators, 32);
        assert_eq!(model.config().subsample, 0.85);
        assert!(model.set_params(&ParamSet::new().with("subsample", 1.5)).is_err());
        assert!(model.set_params(&ParamSet::new().with("max_depth", None::<i64>)).is_err());
    }
}
