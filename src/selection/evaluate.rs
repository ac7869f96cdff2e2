//! Candidate evaluation with optional exhaustive grid search
//!
//! Each candidate is tuned by K-fold cross-validation on the training split
//! when it has a non-empty grid, refit on the whole training split, then
//! scored once on the test split. Scores are kept in catalog order so that
//! ties resolve to the earliest candidate.

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::catalog::{ModelCatalog, SearchCatalog};
use crate::error::{Result, TrainerError};
use crate::training::{cross_val_score, CrossValidator, ParamGrid, ParamSet, Regressor};

/// Knobs for [`evaluate_models`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationOptions {
    /// Folds used when scoring grid configurations
    pub cv_folds: usize,
    /// Score grid configurations on the rayon pool
    pub parallel: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            cv_folds: 3,
            parallel: true,
        }
    }
}

/// NaN sorts below every real score
fn rank(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Held-out R² per candidate, in evaluation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    scores: Vec<(String, f64)>,
}

impl ScoreReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: impl Into<String>, score: f64) {
        self.scores.push((id.into(), score));
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.scores.iter().find(|(k, _)| k == id).map(|(_, s)| *s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.scores.iter().map(|(k, s)| (k.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Highest score; the first one wins ties
    pub fn best(&self) -> Option<(&str, f64)> {
        self.iter().fold(None, |best, (id, score)| match best {
            Some((_, b)) if rank(score) <= rank(b) => best,
            _ => Some((id, score)),
        })
    }
}

/// Outcome of tuning one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub best_params: ParamSet,
    /// Mean cross-validated R² of `best_params`
    pub best_cv_score: f64,
    pub n_configurations: usize,
}

/// Tuning outcome per tuned candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    results: Vec<(String, SearchResult)>,
}

impl SearchReport {
    pub fn push(&mut self, id: impl Into<String>, result: SearchResult) {
        self.results.push((id.into(), result));
    }

    pub fn get(&self, id: &str) -> Option<&SearchResult> {
        self.results.iter().find(|(k, _)| k == id).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SearchResult)> {
        self.results.iter().map(|(k, r)| (k.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub scores: ScoreReport,
    pub searches: SearchReport,
}

/// Exhaustive search over a [`ParamGrid`] scored by unshuffled K-fold R²
#[derive(Debug, Clone)]
pub struct GridSearch<'a> {
    grid: &'a ParamGrid,
    cv: CrossValidator,
    parallel: bool,
}

impl<'a> GridSearch<'a> {
    pub fn new(grid: &'a ParamGrid, cv_folds: usize) -> Self {
        Self {
            grid,
            cv: CrossValidator::k_fold(cv_folds),
            parallel: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn score_config<R>(&self, estimator: &R, params: &ParamSet, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64>
    where
        R: Regressor + Clone,
    {
        let mut candidate = estimator.clone();
        candidate.set_params(params)?;
        let cv = cross_val_score(&candidate, x, y, &self.cv)?;
        debug!(estimator = candidate.name(), params = %params, cv_r2 = cv.mean_score, "grid configuration scored");
        Ok(cv.mean_score)
    }

    /// Score every configuration and return the first best one
    pub fn run<R>(&self, estimator: &R, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchResult>
    where
        R: Regressor + Clone,
    {
        let configs = self.grid.configurations();

        let scores: Vec<f64> = if self.parallel {
            configs
                .par_iter()
                .map(|params| self.score_config(estimator, params, x, y))
                .collect::<Result<Vec<f64>>>()?
        } else {
            configs
                .iter()
                .map(|params| self.score_config(estimator, params, x, y))
                .collect::<Result<Vec<f64>>>()?
        };

        let (best_idx, best_cv_score) = scores
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, s)| match best {
                Some((_, b)) if rank(s) <= rank(b) => best,
                _ => Some((i, s)),
            })
            .ok_or_else(|| TrainerError::TrainingError("empty parameter grid".to_string()))?;

        Ok(SearchResult {
            best_params: configs[best_idx].clone(),
            best_cv_score,
            n_configurations: configs.len(),
        })
    }
}

/// Fit and score every candidate in `catalog`.
///
/// Candidates with a non-empty grid in `search` are tuned on the training
/// split first. Fitted estimators are left in the catalog. Any failure aborts
/// the whole evaluation.
pub fn evaluate_models<R>(
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    catalog: &mut ModelCatalog<R>,
    search: Option<&SearchCatalog>,
    options: &EvaluationOptions,
) -> Result<EvaluationReport>
where
    R: Regressor + Clone,
{
    if options.cv_folds < 2 {
        return Err(TrainerError::ConfigError(format!(
            "cv_folds must be at least 2, got {}",
            options.cv_folds
        )));
    }
    if catalog.is_empty() {
        return Err(TrainerError::ConfigError("model catalog is empty".to_string()));
    }
    if let Some(search) = search {
        search.validate_against(catalog)?;
    }

    info!(
        candidates = catalog.len(),
        train_rows = x_train.nrows(),
        test_rows = x_test.nrows(),
        "evaluating candidates"
    );

    let mut report = EvaluationReport::default();
    for (id, model) in catalog.iter_mut() {
        let grid = search.and_then(|s| s.get(id)).filter(|g| !g.is_empty());

        if let Some(grid) = grid {
            let result = GridSearch::new(grid, options.cv_folds)
                .with_parallel(options.parallel)
                .run(model, x_train, y_train)?;
            debug!(
                model = id,
                params = %result.best_params,
                cv_r2 = result.best_cv_score,
                configurations = result.n_configurations,
                "grid search finished"
            );
            model.set_params(&result.best_params)?;
            report.searches.push(id, result);
        }

        model.fit(x_train, y_train)?;
        let score = model.score(x_test, y_test)?;
        debug!(model = id, r2 = score, "candidate scored");
        report.scores.push(id, score);
    }

    info!(candidates = report.scores.len(), tuned = report.searches.len(), "evaluation finished");
    Ok(report)
}
