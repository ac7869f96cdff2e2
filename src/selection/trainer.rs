//! Model selector
//!
//! Fits every candidate, keeps the one with the highest held-out R², rejects
//! the run when that score is below [`QUALITY_FLOOR`], and persists the winner.

use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use super::catalog::{default_catalog, default_search_catalog, ModelCatalog, SearchCatalog, QUALITY_FLOOR};
use super::config::TrainerConfig;
use super::evaluate::{evaluate_models, ScoreReport, SearchReport};
use crate::error::{Result, TrainerError, TrainingFailure};
use crate::export::{load_model, save_named_object};
use crate::training::{Estimator, Regressor};

/// Split a matrix into its feature columns and its last (target) column
pub fn split_features_target(data: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    let n_cols = data.ncols();
    if n_cols == 0 {
        return Err(TrainerError::ShapeError {
            expected: "at least 1 column (the target)".to_string(),
            actual: "0 columns".to_string(),
        });
    }
    let features = data.slice(s![.., ..n_cols - 1]).to_owned();
    let target = data.column(n_cols - 1).to_owned();
    Ok((features, target))
}

/// Summary of a successful selection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionOutcome {
    /// Identifier of the persisted candidate
    pub best_model: String,
    /// Held-out score reported by the evaluation
    pub best_score: f64,
    /// Held-out R² recomputed from the winning model
    pub test_score: f64,
    pub scores: ScoreReport,
    pub searches: SearchReport,
    pub artifact_path: PathBuf,
}

/// Selects, gates and persists the best regressor
#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    config: TrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run the selection over the built-in catalog and return the winner's test R²
    pub fn select_and_persist(
        &self,
        train: &Array2<f64>,
        test: &Array2<f64>,
    ) -> std::result::Result<f64, TrainingFailure> {
        let catalog = default_catalog(self.config.random_state)?;
        let search = default_search_catalog();
        let outcome = self.select_and_persist_with(train, test, catalog, Some(&search))?;
        Ok(outcome.test_score)
    }

    /// Run the selection over a caller-supplied catalog.
    ///
    /// Nothing is written unless every step up to the quality gate succeeds.
    pub fn select_and_persist_with<R>(
        &self,
        train: &Array2<f64>,
        test: &Array2<f64>,
        mut catalog: ModelCatalog<R>,
        search: Option<&SearchCatalog>,
    ) -> std::result::Result<SelectionOutcome, TrainingFailure>
    where
        R: Regressor + Clone + Serialize,
    {
        self.config.validate()?;

        let (x_train, y_train) = split_features_target(train)?;
        let (x_test, y_test) = split_features_target(test)?;
        info!(
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            features = x_train.ncols(),
            "split features and target"
        );

        let report = evaluate_models(
            &x_train,
            &y_train,
            &x_test,
            &y_test,
            &mut catalog,
            search,
            &self.config.evaluation_options(),
        )?;

        let (best_model, best_score) = report
            .scores
            .best()
            .map(|(id, score)| (id.to_string(), score))
            .ok_or_else(|| TrainerError::TrainingError("no candidate was scored".to_string()))?;

        // NaN never passes
        if !(best_score >= QUALITY_FLOOR) {
            warn!(model = %best_model, r2 = best_score, floor = QUALITY_FLOOR, "best candidate below quality floor");
            return Err(TrainingFailure::new(TrainerError::BelowQualityFloor {
                model: best_model,
                score: best_score,
                floor: QUALITY_FLOOR,
            }));
        }
        info!(model = %best_model, r2 = best_score, "best model selected");

        let winner = catalog
            .remove(&best_model)
            .ok_or_else(|| TrainerError::UnknownModel(best_model.clone()))?;

        let test_score = winner.score(&x_test, &y_test)?;

        let artifact_path = self.config.artifact_path();
        save_named_object(&artifact_path, &best_model, &winner, self.config.format)?;
        info!(path = %artifact_path.display(), model = %best_model, "artifact written");

        Ok(SelectionOutcome {
            best_model,
            best_score,
            test_score,
            scores: report.scores,
            searches: report.searches,
            artifact_path,
        })
    }

    /// Reload the artifact written by the built-in catalog
    pub fn load_selected(&self) -> Result<Estimator> {
        load_model(self.config.artifact_path())
    }
}
