//! Ordinary least squares regression

use crate::error::{TrainerError, Result};
use super::models::{check_fit_shapes, check_n_features, Regressor};
use super::params::{unknown, ParamSet};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Cholesky factorisation `A = L Lᵀ`; `None` when `A` is not positive definite
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `L Lᵀ x = b` by forward then backward substitution
fn cholesky_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    let mut y = Array1::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// Solve a symmetric positive semi-definite system.
///
/// Retries once with a tiny ridge on the diagonal when the plain
/// factorisation fails, then falls back to pivoted Gauss-Jordan.
fn solve_spd(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }
    if n == 0 {
        return Some(Array1::zeros(0));
    }

    if let Some(l) = cholesky(a) {
        return Some(cholesky_substitute(&l, b));
    }

    let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
    if ridge > 0.0 {
        let mut a_reg = a.clone();
        for k in 0..n {
            a_reg[[k, k]] += ridge;
        }
        if let Some(l) = cholesky(&a_reg) {
            return Some(cholesky_substitute(&l, b));
        }
    }

    gauss_jordan_solve(a, b)
}

/// Pivoted Gauss-Jordan elimination on `[A | b]`
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| aug[[r1, col]].abs().total_cmp(&aug[[r2, col]].abs()))
            .unwrap_or(col);

        if pivot_row != col {
            for j in 0..=n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        if pivot.abs() < 1e-10 {
            return None;
        }
        for j in 0..=n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in 0..=n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    Some(aug.column(n).to_owned())
}

/// Linear regression fitted through the normal equations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: Option<f64>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    n_features: usize,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Create a new linear regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            n_features: 0,
        }
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }
}

impl Regressor for LinearRegression {
    fn name(&self) -> &str {
        "LinearRegression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;

        // Center data so the intercept drops out of the normal equations
        let (x_work, y_work, means) = if self.fit_intercept {
            let x_mean = x
                .mean_axis(Axis(0))
                .ok_or_else(|| TrainerError::InvalidInput("empty training set".to_string()))?;
            let y_mean = y.mean().unwrap_or(0.0);
            let x_centered = x - &x_mean.view().insert_axis(Axis(0));
            (x_centered, y - y_mean, Some((x_mean, y_mean)))
        } else {
            (x.clone(), y.clone(), None)
        };

        // Columns with no spread left after centering get a zero coefficient
        let active: Vec<usize> = (0..x.ncols())
            .filter(|&j| {
                let scale = x.column(j).iter().fold(1.0_f64, |m, v| m.max(v.abs()));
                x_work.column(j).iter().any(|v| v.abs() > 1e-12 * scale)
            })
            .collect();
        let x_active = x_work.select(Axis(1), &active);

        let xtx = x_active.t().dot(&x_active);
        let xty = x_active.t().dot(&y_work);

        let solved = solve_spd(&xtx, &xty).ok_or_else(|| {
            TrainerError::ComputationError(
                "Matrix is singular, cannot solve least squares".to_string(),
            )
        })?;
        let mut coefficients = Array1::zeros(x.ncols());
        for (&j, &c) in active.iter().zip(solved.iter()) {
            coefficients[j] = c;
        }

        let intercept = match means {
            Some((x_mean, y_mean)) => y_mean - coefficients.dot(&x_mean),
            None => 0.0,
        };

        self.n_features = x.ncols();
        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(TrainerError::ModelNotFitted)?;
        check_n_features(self.n_features, x)?;
        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            match name.as_str() {
                "fit_intercept" => self.fit_intercept = value.as_bool(name)?,
                _ => return Err(unknown(name, value, "LinearRegression")),
            }
        }
        Ok(())
    }
}
