//! Regressor trait, R² scoring and input guards

use crate::error::{TrainerError, Result};
use super::params::ParamSet;
use ndarray::{Array1, Array2};

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(TrainerError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(TrainerError::InvalidInput(
            "cannot score an empty target vector".to_string(),
        ));
    }
    Ok(())
}

/// Coefficient of determination.
///
/// A constant target yields 1.0 for exact predictions and 0.0 otherwise.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;

    let n = y_true.len() as f64;
    let y_mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    if ss_tot > 0.0 {
        Ok(1.0 - ss_res / ss_tot)
    } else if ss_res == 0.0 {
        Ok(1.0)
    } else {
        Ok(0.0)
    }
}

/// Capability set shared by every candidate estimator
pub trait Regressor: Send + Sync {
    /// Short name of the estimator family
    fn name(&self) -> &str;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict targets for each row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Apply hyperparameters before fitting.
    ///
    /// Estimators without tunable knobs reject any non-empty set.
    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        match params.iter().next() {
            None => Ok(()),
            Some((name, value)) => Err(TrainerError::InvalidParameter {
                name: name.clone(),
                value: value.to_string(),
                reason: "estimator has no tunable parameters".to_string(),
            }),
        }
    }

    /// R² of the predictions on `x` against `y`
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        r2_score(y, &y_pred)
    }
}

/// Reject empty or non-finite training data and `y` whose length does not match the rows of `x`
pub(crate) fn check_fit_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(TrainerError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(TrainerError::InvalidInput("empty training set".to_string()));
    }
    check_finite("training features", x.iter())?;
    check_finite("training target", y.iter())
}

/// Reject prediction input with a different feature count than seen in fit, or non-finite values
pub(crate) fn check_n_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(TrainerError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    check_finite("prediction input", x.iter())
}

/// Reject NaN and infinite values
fn check_finite<'a>(what: &str, values: impl Iterator<Item = &'a f64>) -> Result<()> {
    match values.enumerate().find(|(_, v)| !v.is_finite()) {
        None => Ok(()),
        Some((i, v)) => Err(TrainerError::InvalidInput(format!(
            "{} contains non-finite value {} at flat index {}",
            what, v, i
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_r2_perfect_and_mean() {
        let y = array![1.0, 2.0, 3.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);

        let mean = array![2.0, 2.0, 2.0];
        assert!(r2_score(&y, &mean).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![5.0, 5.0, 5.0];
        assert_eq!(r2_score(&y, &array![5.0, 5.0, 5.0]).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![5.0, 4.0, 5.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_r2_length_mismatch() {
        let err = r2_score(&array![1.0, 2.0], &array![1.0]).unwrap_err();
        assert!(matches!(err, TrainerError::ShapeError { .. }));
    }

    #[test]
    fn test_non_finite_training_data_is_rejected() {
        let y = array![1.0, 2.0];
        let x = array![[1.0, f64::NAN], [2.0, 3.0]];
        assert!(matches!(check_fit_shapes(&x, &y), Err(TrainerError::InvalidInput(_))));

        let x = array![[1.0, 0.5], [2.0, 3.0]];
        let y_inf = array![1.0, f64::INFINITY];
        assert!(matches!(check_fit_shapes(&x, &y_inf), Err(TrainerError::InvalidInput(_))));
        assert!(check_fit_shapes(&x, &y).is_ok());
    }

    #[test]
    fn test_non_finite_prediction_input_is_rejected() {
        let x = array![[1.0, f64::NEG_INFINITY]];
        assert!(matches!(check_n_features(2, &x), Err(TrainerError::InvalidInput(_))));
        assert!(check_n_features(2, &array![[1.0, 2.0]]).is_ok());
    }
}
