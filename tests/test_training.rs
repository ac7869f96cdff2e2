//! Integration test: every estimator family behind the Regressor trait

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use regressor_selection::error::TrainerError;
use regressor_selection::export::{load_model, save_named_object, SerializationFormat};
use regressor_selection::selection::DEFAULT_MODEL_IDS;
use regressor_selection::training::{
    cross_val_score, CrossValidator, Estimator, LinearRegression, ParamSet, Regressor,
};
use tempfile::TempDir;

fn regression_data(n: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((n, 2), |_| rng.gen_range(0.0..1.0));
    let y = x
        .rows()
        .into_iter()
        .map(|row| 3.0 * row[0] - 2.0 * row[1])
        .collect();
    (x, y)
}

fn fitted(family: &str, x: &Array2<f64>, y: &Array1<f64>) -> Estimator {
    let mut model = Estimator::from_family(family)
        .unwrap()
        .with_random_state(Some(42))
        .unwrap();
    model.fit(x, y).unwrap();
    model
}

#[test]
fn test_every_family_fits_training_data() {
    let (x, y) = regression_data(80, 1);
    for family in DEFAULT_MODEL_IDS {
        let model = fitted(family, &x, &y);
        let pred = model.predict(&x).unwrap();
        assert_eq!(pred.len(), 80, "{}", family);
        assert!(pred.iter().all(|p| p.is_finite()), "{}", family);

        let r2 = model.score(&x, &y).unwrap();
        assert!(r2 > 0.5, "{} only reached R² {:.3}", family, r2);
    }
}

#[test]
fn test_linear_regression_recovers_exact_relation() {
    let (x, y) = regression_data(50, 2);
    let (x_test, y_test) = regression_data(20, 3);
    let model = fitted("LinearRegression", &x, &y);
    assert!(model.score(&x_test, &y_test).unwrap() > 0.999_999);
}

#[test]
fn test_predict_before_fit_fails() {
    let (x, _) = regression_data(5, 4);
    for family in DEFAULT_MODEL_IDS {
        let model = Estimator::from_family(family).unwrap();
        assert!(
            matches!(model.predict(&x), Err(TrainerError::ModelNotFitted)),
            "{}",
            family
        );
    }
}

#[test]
fn test_shape_mismatches_are_rejected() {
    let (x, y) = regression_data(30, 5);
    let short_y = y.slice(ndarray::s![..10]).to_owned();
    let wide = Array2::<f64>::zeros((4, 3));

    for family in DEFAULT_MODEL_IDS {
        let mut model = Estimator::from_family(family).unwrap();
        assert!(
            matches!(model.fit(&x, &short_y), Err(TrainerError::ShapeError { .. })),
            "{}",
            family
        );

        let model = fitted(family, &x, &y);
        assert!(
            matches!(model.predict(&wide), Err(TrainerError::ShapeError { .. })),
            "{}",
            family
        );
    }
}

#[test]
fn test_unknown_parameter_is_rejected() {
    for family in DEFAULT_MODEL_IDS {
        let mut model = Estimator::from_family(family).unwrap();
        let result = model.set_params(&ParamSet::new().with("no_such_knob", 1usize));
        assert!(
            matches!(result, Err(TrainerError::InvalidParameter { .. })),
            "{}",
            family
        );
    }
}

#[test]
fn test_seeded_families_are_reproducible() {
    let (x, y) = regression_data(60, 6);
    for family in DEFAULT_MODEL_IDS {
        let a = fitted(family, &x, &y).predict(&x).unwrap();
        let b = fitted(family, &x, &y).predict(&x).unwrap();
        assert_eq!(a, b, "{}", family);
    }
}

#[test]
fn test_artifact_round_trip_preserves_predictions() {
    let dir = TempDir::new().unwrap();
    let (x, y) = regression_data(40, 7);

    for (i, family) in DEFAULT_MODEL_IDS.iter().enumerate() {
        let format = if i % 2 == 0 {
            SerializationFormat::Binary
        } else {
            SerializationFormat::Json
        };
        let model = fitted(family, &x, &y);
        let path = dir.path().join(format!("{}.artifact", family));
        save_named_object(&path, family, &model, format).unwrap();

        let restored = load_model(&path).unwrap();
        assert_eq!(restored.family(), *family);
        let expected = model.predict(&x).unwrap();
        let actual = restored.predict(&x).unwrap();
        for (e, a) in expected.iter().zip(actual.iter()) {
            assert!((e - a).abs() < 1e-9, "{}: {} vs {}", family, e, a);
        }
    }
}

#[test]
fn test_cross_val_score_on_linear_data() {
    let (x, y) = regression_data(45, 8);
    let cv = CrossValidator::k_fold(3);
    let results = cross_val_score(&LinearRegression::new(), &x, &y, &cv).unwrap();

    assert_eq!(results.n_folds, 3);
    assert!(results.mean_score > 0.999);
    assert!(results.std_score < 1e-3);
}
