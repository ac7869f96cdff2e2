//! Model selection: candidate catalogs, evaluation, the quality gate and persistence

pub mod catalog;
pub mod config;
pub mod evaluate;
pub mod trainer;

pub use catalog::{
    default_catalog, default_search_catalog, ModelCatalog, SearchCatalog, DEFAULT_MODEL_IDS,
    QUALITY_FLOOR,
};
pub use config::TrainerConfig;
pub use evaluate::{
    evaluate_models, EvaluationOptions, EvaluationReport, GridSearch, ScoreReport, SearchReport,
    SearchResult,
};
pub use trainer::{split_features_target, ModelTrainer, SelectionOutcome};
