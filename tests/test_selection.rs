//! Integration test: model selection, quality gate and persistence

use ndarray::{concatenate, Array1, Array2, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;

use regressor_selection::error::{Result, TrainerError};
use regressor_selection::export::{load_model, load_object, read_artifact, SerializationFormat};
use regressor_selection::selection::{
    default_catalog, default_search_catalog, split_features_target, ModelCatalog, ModelTrainer,
    SearchCatalog, TrainerConfig, QUALITY_FLOOR,
};
use regressor_selection::training::{r2_score, ParamGrid, ParamSet, Regressor};
use tempfile::TempDir;

/// Predicts `factor * x0 + (1 - factor) * mean(y_train)`.
///
/// With the target copied into the first feature, `factor = 1` scores a
/// perfect R² and `factor = 0` scores at most zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EchoRegressor {
    factor: f64,
    mean: Option<f64>,
}

impl EchoRegressor {
    fn new(factor: f64) -> Self {
        Self { factor, mean: None }
    }
}

impl Regressor for EchoRegressor {
    fn name(&self) -> &str {
        "EchoRegressor"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(TrainerError::ShapeError {
                expected: x.nrows().to_string(),
                actual: y.len().to_string(),
            });
        }
        self.mean = y.mean();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let mean = self.mean.ok_or(TrainerError::ModelNotFitted)?;
        Ok(x.column(0).mapv(|v| self.factor * v + (1.0 - self.factor) * mean))
    }

    fn set_params(&mut self, params: &ParamSet) -> Result<()> {
        for (name, value) in params.iter() {
            match name.as_str() {
                "factor" => self.factor = value.as_f64(name)?,
                _ => {
                    return Err(TrainerError::InvalidParameter {
                        name: name.clone(),
                        value: value.to_string(),
                        reason: "unknown".to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

/// Columns: target copy, noise, target
fn echo_matrix(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((n, 3), |(_, _)| rng.gen_range(-5.0..5.0))
        .outer_iter()
        .flat_map(|row| vec![row[0], row[1], row[0]])
        .collect::<Array1<f64>>()
        .into_shape((n, 3))
        .unwrap()
}

/// Three features plus a noiseless linear target
fn linear_matrix(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let x = Array2::from_shape_fn((n, 3), |_| rng.gen_range(0.0..10.0));
    let y = x
        .rows()
        .into_iter()
        .map(|r| 1.5 * r[0] - 2.0 * r[1] + 0.5 * r[2] + 4.0)
        .collect::<Array1<f64>>()
        .insert_axis(Axis(1));
    concatenate(Axis(1), &[x.view(), y.view()]).unwrap()
}

fn trainer_in(dir: &TempDir) -> ModelTrainer {
    ModelTrainer::new(TrainerConfig::new().with_artifact_dir(dir.path().join("artifacts")))
}

fn echo_catalog(entries: &[(&str, f64)]) -> ModelCatalog<EchoRegressor> {
    let mut catalog = ModelCatalog::new();
    for &(id, factor) in entries {
        catalog.insert(id, EchoRegressor::new(factor)).unwrap();
    }
    catalog
}

#[test]
fn test_end_to_end_linear_target() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer_in(&dir);
    let train = linear_matrix(100, 11);
    let test = linear_matrix(20, 12);

    let outcome = trainer
        .select_and_persist_with(
            &train,
            &test,
            default_catalog(Some(42)).unwrap(),
            Some(&default_search_catalog()),
        )
        .unwrap();

    assert_eq!(outcome.scores.len(), 9);
    assert!(outcome.test_score > 0.9);
    assert_eq!(outcome.best_model, outcome.scores.best().unwrap().0);
    assert_eq!(outcome.best_model, "LinearRegression");
    assert_eq!(outcome.searches.len(), 6);

    let path = trainer.config().artifact_path();
    assert!(fs::metadata(&path).unwrap().len() > 0);

    let (artifact, format) = read_artifact(&path).unwrap();
    assert_eq!(artifact.model_name, outcome.best_model);
    assert_eq!(format, SerializationFormat::Binary);

    // fit -> persist -> reload -> predict matches the returned score
    let (x_test, y_test) = split_features_target(&test).unwrap();
    let restored = load_model(&path).unwrap();
    assert_eq!(restored.family(), outcome.best_model);
    let reloaded = r2_score(&y_test, &restored.predict(&x_test).unwrap()).unwrap();
    assert!((reloaded - outcome.test_score).abs() < 1e-9);
}

#[test]
fn test_default_entry_point_returns_test_r2() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer_in(&dir);
    let train = linear_matrix(60, 21);
    let test = linear_matrix(15, 22);

    let score = trainer.select_and_persist(&train, &test).unwrap();
    assert!(score > 0.9);

    let (x_test, y_test) = split_features_target(&test).unwrap();
    let restored = trainer.load_selected().unwrap();
    assert!((restored.score(&x_test, &y_test).unwrap() - score).abs() < 1e-9);
}

#[test]
fn test_all_below_floor_fails_without_artifact() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer_in(&dir);
    let catalog = echo_catalog(&[("mean_a", 0.0), ("mean_b", 0.0)]);

    let failure = trainer
        .select_and_persist_with(&echo_matrix(40, 1), &echo_matrix(10, 2), catalog, None)
        .unwrap_err();

    assert!(failure.is_below_quality_floor());
    match failure.cause() {
        TrainerError::BelowQualityFloor { model, score, floor } => {
            assert_eq!(model, "mean_a");
            assert!(*score < QUALITY_FLOOR);
            assert_eq!(*floor, QUALITY_FLOOR);
        }
        other => panic!("unexpected cause: {:?}", other),
    }
    assert!(failure.to_string().contains("trainer.rs"));
    assert!(!trainer.config().artifact_path().exists());
}

#[test]
fn test_failed_run_keeps_previous_artifact() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer_in(&dir);
    let path = trainer.config().artifact_path();

    trainer
        .select_and_persist_with(&echo_matrix(30, 3), &echo_matrix(10, 4), echo_catalog(&[("good", 1.0)]), None)
        .unwrap();
    let before = fs::read(&path).unwrap();

    let failed = trainer.select_and_persist_with(
        &echo_matrix(30, 5),
        &echo_matrix(10, 6),
        echo_catalog(&[("bad", 0.0)]),
        None,
    );
    assert!(failed.is_err());
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
}

#[test]
fn test_persisted_model_is_the_maximum() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer_in(&dir);
    let catalog = echo_catalog(&[("weak", 0.0), ("half", 0.5), ("exact", 1.0), ("most", 0.9)]);
    let test = echo_matrix(12, 8);

    let outcome = trainer
        .select_and_persist_with(&echo_matrix(50, 7), &test, catalog, None)
        .unwrap();

    let (best_id, best_score) = outcome.scores.best().unwrap();
    assert_eq!(best_id, "exact");
    assert_eq!(outcome.best_model, "exact");
    assert_eq!(best_score, outcome.best_score);

    let path = trainer.config().artifact_path();
    assert_eq!(read_artifact(&path).unwrap().0.model_name, "exact");

    let restored: EchoRegressor = load_object(&path).unwrap();
    let (x_test, y_test) = split_features_target(&test).unwrap();
    let reloaded = r2_score(&y_test, &restored.predict(&x_test).unwrap()).unwrap();
    assert!((reloaded - outcome.test_score).abs() < 1e-12);
}

#[test]
fn test_tie_goes_to_first_in_catalog_order() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer_in(&dir);
    let catalog = echo_catalog(&[("weak", 0.2), ("first", 1.0), ("second", 1.0), ("third", 1.0)]);

    let outcome = trainer
        .select_and_persist_with(&echo_matrix(30, 9), &echo_matrix(10, 10), catalog, None)
        .unwrap();

    assert_eq!(outcome.scores.get("first"), outcome.scores.get("second"));
    assert_eq!(outcome.best_model, "first");
    let path = trainer.config().artifact_path();
    assert_eq!(read_artifact(&path).unwrap().0.model_name, "first");
}

#[test]
fn test_grid_search_tunes_injected_regressor() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer_in(&dir);
    let catalog = echo_catalog(&[("echo", 0.0)]);
    let search = SearchCatalog::new().with("echo", ParamGrid::new().add("factor", [0.0, 0.5, 1.0, 0.25]));

    let outcome = trainer
        .select_and_persist_with(&echo_matrix(30, 13), &echo_matrix(10, 14), catalog, Some(&search))
        .unwrap();

    let result = outcome.searches.get("echo").unwrap();
    assert_eq!(result.n_configurations, 4);
    assert_eq!(result.best_params.get("factor").unwrap().as_f64("factor").unwrap(), 1.0);
    assert!(outcome.test_score > 0.999);
}

#[test]
fn test_unknown_search_entry_fails() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer_in(&dir);
    let search = SearchCatalog::new().with("missing", ParamGrid::new().add("factor", [1.0]));

    let failure = trainer
        .select_and_persist_with(&echo_matrix(20, 15), &echo_matrix(5, 16), echo_catalog(&[("echo", 1.0)]), Some(&search))
        .unwrap_err();
    assert!(matches!(failure.cause(), TrainerError::UnknownModel(id) if id == "missing"));
    assert!(!trainer.config().artifact_path().exists());
}

#[test]
fn test_mismatched_test_columns_fail_without_artifact() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer_in(&dir);
    let train = linear_matrix(30, 17);
    let test = linear_matrix(10, 18).slice(ndarray::s![.., 1..]).to_owned();

    let failure = trainer.select_and_persist(&train, &test).unwrap_err();
    assert!(matches!(failure.cause(), TrainerError::ShapeError { .. }));
    assert!(!trainer.config().artifact_path().exists());
}

#[test]
fn test_constant_target_is_deterministic() {
    let run = || {
        let dir = TempDir::new().unwrap();
        let trainer = trainer_in(&dir);
        let make = |n: usize| Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 } else { 3.0 });

        let result = trainer.select_and_persist(&make(30), &make(9));
        let exists = trainer.config().artifact_path().exists();
        match result {
            Ok(score) => {
                assert!(score >= QUALITY_FLOOR);
                assert!(exists);
                Some(score)
            }
            Err(failure) => {
                assert!(failure.is_below_quality_floor(), "{}", failure);
                assert!(!exists);
                None
            }
        }
    };
    assert_eq!(run(), run());
}

#[test]
fn test_nan_input_fails_without_artifact() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer_in(&dir);

    let mut train = linear_matrix(30, 31);
    train[[3, 0]] = f64::NAN;
    let failure = trainer.select_and_persist(&train, &linear_matrix(10, 32)).unwrap_err();
    assert!(matches!(failure.cause(), TrainerError::InvalidInput(_)), "{}", failure);
    assert!(!trainer.config().artifact_path().exists());

    let mut test = linear_matrix(10, 33);
    test[[2, 1]] = f64::INFINITY;
    let failure = trainer.select_and_persist(&linear_matrix(30, 34), &test).unwrap_err();
    assert!(matches!(failure.cause(), TrainerError::InvalidInput(_)), "{}", failure);
    assert!(!trainer.config().artifact_path().exists());
}

#[test]
fn test_constant_feature_column_is_handled() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer_in(&dir);

    // Only a constant feature: every candidate falls back to the mean
    let flat = |n: usize, offset: usize| {
        Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { 1.0 } else { (i + offset) as f64 })
    };
    let failure = trainer.select_and_persist(&flat(30, 0), &flat(10, 30)).unwrap_err();
    assert!(failure.is_below_quality_floor(), "{}", failure);
    assert!(!trainer.config().artifact_path().exists());

    // A constant column next to an informative one still fits exactly
    let mixed = |n: usize, offset: usize| {
        Array2::from_shape_fn((n, 3), |(i, j)| {
            let v = ((i + offset) * 7 % 23) as f64;
            match j {
                0 => 0.1,
                1 => v,
                _ => 2.0 * v + 1.0,
            }
        })
    };
    let score = trainer.select_and_persist(&mixed(40, 0), &mixed(12, 40)).unwrap();
    assert!(score > 0.999, "R² {}", score);
    assert!(trainer.config().artifact_path().exists());
}

#[test]
fn test_json_artifact_format() {
    let dir = TempDir::new().unwrap();
    let trainer = ModelTrainer::new(
        TrainerConfig::new()
            .with_artifact_dir(dir.path())
            .with_model_file_name("model.json")
            .with_format(SerializationFormat::Json),
    );

    trainer
        .select_and_persist_with(&echo_matrix(20, 19), &echo_matrix(8, 20), echo_catalog(&[("echo", 1.0)]), None)
        .unwrap();

    let text = fs::read_to_string(dir.path().join("model.json")).unwrap();
    assert!(text.trim_start().starts_with('{'));
    let restored: EchoRegressor = load_object(dir.path().join("model.json")).unwrap();
    assert_eq!(restored.factor, 1.0);
}
