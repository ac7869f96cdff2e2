//! Epsilon-insensitive support vector regression
//!
//! The dual is solved by cyclic coordinate descent on `β = α − α*` with the
//! bias absorbed into the kernel (`K + 1`), so every update has a closed
//! form: a soft-threshold by `ε` followed by clipping to `[-C, C]`.

use crate::error::{TrainerError, Result};
use super::models::{check_fit_shapes, check_n_features, Regressor};
use super::params::{invalid, unknown, ParamSet, ParamValue};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Polynomial kernel: K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, coef0: f64 },
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF,
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::RBF
    }
}

/// SVR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// Kernel coefficient; `None` resolves to `1 / (n_features * Var(X))`
    pub gamma: Option<f64>,
    /// Epsilon for regression (SVR tube width)
    pub epsilon: f64,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of passes over the training set
    pub max_iter: usize,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::RBF,
            gamma: None,
            epsilon: 0.1,
            tol: 1e-4,
            max_iter: 1000,
        }
    }
}

/// Support Vector Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    support_vectors: Option<Array2<f64>>,
    /// Dual coefficients `α − α*` of the support vectors
    dual_coef: Option<Array1<f64>>,
    gamma_fitted: f64,
    n_features: usize,
}

impl Default for SVMRegressor {
    fn default() -> Self {
        Self::new(SVMConfig::default())
    }
}

impl SVMRegressor {
    /// Create a new SVM regressor
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            dual_coef: None,
            gamma_fitted: 1.0,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    /// Get number of support vectors
    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }

    fn kernel(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        kernel_value(&self.config.kernel, self.gamma_fitted, a, b)
    }

    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| self.kernel(x.row(i), x.row(j)) + 1.0).collect())
            .collect();
        Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
    }
}

fn kernel_value(kernel: &KernelType, gamma: f64, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    match kernel {
        KernelType::Linear => a.dot(&b),
        KernelType::Polynomial { degree, coef0 } => {
            (gamma * a.dot(&b) + coef0).powi(*degree as i32)
        }
        KernelType::RBF => {
            let norm_sq: f64 = a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).powi(2)).sum();
            (-gamma * norm_sq).exp()
        }
    }
}

/// `1 / (n_features * Var(X))` over every entry of `X`, 1.0 for constant data
fn scale_gamma(x: &Array2<f64>) -> f64 {
    let var = x.var(0.0);
    if var > 0.0 {
        1.0 / (x.ncols() as f64 * var)
    } else {
        1.0
    }
}

impl Regressor for SVMRegressor {
    fn name(&self) -> &str {
        "SVMRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;
        let n = x.nrows();

        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(TrainerError::InvalidInput(format!(
                "Dataset has {} samples, exceeding the maximum {} for SVR kernel matrix. \
                 Consider subsampling or using a different algorithm.",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        self.gamma_fitted = self.config.gamma.unwrap_or_else(|| scale_gamma(x));
        let kernel_matrix = self.compute_kernel_matrix(x);

        let c = self.config.c;
        let eps = self.config.epsilon;
        let mut beta: Array1<f64> = Array1::zeros(n);
        // Cached K·β
        let mut k_beta: Array1<f64> = Array1::zeros(n);

        for _ in 0..self.config.max_iter {
            let mut max_change: f64 = 0.0;

            for i in 0..n {
                let k_ii = kernel_matrix[[i, i]];
                if k_ii <= 0.0 {
                    continue;
                }
                let grad = k_beta[i] - y[i];
                let z = k_ii * beta[i] - grad;
                let shrunk = z.signum() * (z.abs() - eps).max(0.0);
                let new_beta = (shrunk / k_ii).clamp(-c, c);

                let delta = new_beta - beta[i];
                if delta != 0.0 {
                    k_beta.scaled_add(delta, &kernel_matrix.column(i));
                    beta[i] = new_beta;
                    max_change = max_change.max(delta.abs());
                }
            }

            if max_change < self.config.tol {
                break;
            }
        }

        let support_indices: Vec<usize> = (0..n).filter(|&i| beta[i].abs() > 1e-10).collect();

        self.support_vectors = Some(x.select(Axis(0), &support_indices));
        self.dual_coef = Some(support_indices.iter().map(|&i| beta[i]).collect());
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (sv, coef) = match (&self.support_vectors, &self.dual_coef) {
            (Some(sv), Some(coef)) => (sv, coef),
            _ => return Err(TrainerError::ModelNotFitted),
        };
        check_n_features(self.n_features, x)?;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                sv.rows()
                    .into_iter()
                    .zip(coef.iter())
                    .map(|(row, &b)| b * (self.kernel(x.row(i), row) + 1.0))
                    .sum()
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            match name.as_str() {
                "c" | "C" => self.config.c = value.as_positive_f64(name)?,
                "epsilon" => {
                    let eps = value.as_f64(name)?;
                    if eps < 0.0 {
                        return Err(invalid(name, value, "must be non-negative"));
                    }
                    self.config.epsilon = eps;
                }
                "gamma" => {
                    self.config.gamma = match value {
                        ParamValue::Text(s) if s == "scale" => None,
                        other => Some(other.as_positive_f64(name)?),
                    }
                }
                "kernel" => {
                    self.config.kernel = match value.as_str(name)? {
                        "rbf" => KernelType::RBF,
                        "linear" => KernelType::Linear,
                        "poly" => KernelType::Polynomial { degree: 3, coef0: 0.0 },
                        _ => return Err(invalid(name, value, "expected 'rbf', 'linear' or 'poly'")),
                    }
                }
                "max_iter" => self.config.max_iter = value.as_usize(name)?.max(1),
                _ => return Err(unknown(name, value, "SVM")),
            }
        }
        Ok(())
    }
}
