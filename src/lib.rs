//! regressor-selection - pick, tune and persist the best regression model
//!
//! Given train and test matrices whose last column is the target, the
//! selector fits a fixed catalog of regressors, tunes the tree and boosting
//! families with an exhaustive K-fold grid search, keeps the candidate with
//! the highest held-out R², rejects the run below a quality floor, and writes
//! the winner to disk.
//!
//! # Modules
//!
//! - [`training`] - Estimator families, hyperparameter grids, cross-validation
//! - [`selection`] - Catalogs, evaluation, configuration and the selector itself
//! - [`export`] - Checksummed bincode/JSON artifacts
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use ndarray::Array2;
//! use regressor_selection::prelude::*;
//!
//! # fn run(train: Array2<f64>, test: Array2<f64>) -> std::result::Result<(), TrainingFailure> {
//! let trainer = ModelTrainer::new(TrainerConfig::default().with_artifact_dir("artifacts"));
//! let r2 = trainer.select_and_persist(&train, &test)?;
//! println!("best model scored {:.3}", r2);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Estimators and model selection
pub mod training;
pub mod selection;

// Persistence and interfaces
pub mod export;
pub mod cli;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::error::{Result, TrainerError, TrainingFailure};

    pub use crate::training::{
        cross_val_score, r2_score, CrossValidator, Estimator, ParamGrid, ParamSet, ParamValue,
        Regressor,
    };

    pub use crate::selection::{
        default_catalog, default_search_catalog, evaluate_models, EvaluationOptions,
        EvaluationReport, ModelCatalog, ModelTrainer, ScoreReport, SearchCatalog,
        SelectionOutcome, TrainerConfig, QUALITY_FLOOR,
    };

    pub use crate::export::{load_model, load_object, save_object, SerializationFormat};
}
