//! Selector configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::evaluate::EvaluationOptions;
use crate::error::{Result, TrainerError};
use crate::export::SerializationFormat;

/// Configuration for [`ModelTrainer`](super::ModelTrainer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Directory the winning model is written to
    pub artifact_dir: PathBuf,

    /// File name of the artifact inside `artifact_dir`
    pub model_file_name: String,

    /// Artifact encoding
    pub format: SerializationFormat,

    /// Cross-validation folds used by grid search
    pub cv_folds: usize,

    /// Seed pushed down to every estimator that draws random numbers
    pub random_state: Option<u64>,

    /// Score grid configurations in parallel
    pub parallel_search: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("artifacts"),
            model_file_name: "model.bin".to_string(),
            format: SerializationFormat::Binary,
            cv_folds: 3,
            random_state: Some(42),
            parallel_search: true,
        }
    }
}

impl TrainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(TrainerError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.model_file_name.trim().is_empty() {
            return Err(TrainerError::ConfigError(
                "model_file_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Full path of the artifact
    pub fn artifact_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.model_file_name)
    }

    pub(crate) fn evaluation_options(&self) -> EvaluationOptions {
        EvaluationOptions {
            cv_folds: self.cv_folds,
            parallel: self.parallel_search,
        }
    }

    /// Builder method to set the artifact directory
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Builder method to set the artifact file name
    pub fn with_model_file_name(mut self, name: impl Into<String>) -> Self {
        self.model_file_name = name.into();
        self
    }

    /// Builder method to set the artifact encoding
    pub fn with_format(mut self, format: SerializationFormat) -> Self {
        self.format = format;
        self
    }

    /// Builder method to set the number of folds
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to set the seed; `None` draws from entropy
    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to toggle parallel grid search
    pub fn with_parallel_search(mut self, parallel: bool) -> Self {
        self.parallel_search = parallel;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = TrainerConfig::default();
        assert_eq!(config.artifact_path(), PathBuf::from("artifacts").join("model.bin"));
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.random_state, Some(42));
        assert_eq!(config.format, SerializationFormat::Binary);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TrainerConfig::new()
            .with_artifact_dir("out")
            .with_model_file_name("best.json")
            .with_format(SerializationFormat::Json)
            .with_cv_folds(5)
            .with_random_state(None)
            .with_parallel_search(false);

        assert_eq!(config.artifact_path(), PathBuf::from("out").join("best.json"));
        assert_eq!(config.cv_folds, 5);
        assert!(config.random_state.is_none());
        assert!(!config.evaluation_options().parallel);
    }

    #[test]
    fn test_validate() {
        assert!(TrainerConfig::new().with_cv_folds(1).validate().is_err());
        assert!(TrainerConfig::new().with_model_file_name("  ").validate().is_err());
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trainer.json");
        fs::write(&path, r#"{ "cv_folds": 4, "format": "json" }"#).unwrap();

        let config = TrainerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.cv_folds, 4);
        assert_eq!(config.format, SerializationFormat::Json);
        assert_eq!(config.model_file_name, "model.bin");

        fs::write(&path, r#"{ "cv_folds": 0 }"#).unwrap();
        assert!(TrainerConfig::from_json_file(&path).is_err());
    }
}
