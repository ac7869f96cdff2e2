//! Error types for model selection

use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Result type alias for fallible operations inside the crate
pub type Result<T> = std::result::Result<T, TrainerError>;

/// Main error type raised by estimators, evaluation and persistence
#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Duplicate model identifier: {0}")]
    DuplicateModel(String),

    #[error("Unknown model identifier: {0}")]
    UnknownModel(String),

    #[error("No best model found: {model} scored {score:.4}, below the quality floor of {floor}")]
    BelowQualityFloor { model: String, score: f64, floor: f64 },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for TrainerError {
    fn from(err: serde_json::Error) -> Self {
        TrainerError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for TrainerError {
    fn from(err: bincode::Error) -> Self {
        TrainerError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TrainerError {
    fn from(err: ndarray::ShapeError) -> Self {
        TrainerError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for TrainerError {
    fn from(err: polars::error::PolarsError) -> Self {
        TrainerError::DataError(err.to_string())
    }
}

/// The single failure type surfaced by a selection run.
///
/// Every error raised while splitting, fitting, evaluating, gating or
/// persisting is wrapped here together with the source location at which
/// the run gave up.
#[derive(Debug)]
pub struct TrainingFailure {
    cause: TrainerError,
    location: &'static Location<'static>,
}

impl TrainingFailure {
    /// Wrap a cause, recording the caller's location
    #[track_caller]
    pub fn new(cause: TrainerError) -> Self {
        Self {
            cause,
            location: Location::caller(),
        }
    }

    /// The underlying error
    pub fn cause(&self) -> &TrainerError {
        &self.cause
    }

    /// Consume the failure and return the underlying error
    pub fn into_cause(self) -> TrainerError {
        self.cause
    }

    /// Source file of the wrap site
    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    /// Source line of the wrap site
    pub fn line(&self) -> u32 {
        self.location.line()
    }

    /// True when the run was rejected by the quality gate
    pub fn is_below_quality_floor(&self) -> bool {
        matches!(self.cause, TrainerError::BelowQualityFloor { .. })
    }
}

impl fmt::Display for TrainingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Model training failed in [{}] line [{}]: {}",
            self.location.file(),
            self.location.line(),
            self.cause
        )
    }
}

impl std::error::Error for TrainingFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

impl From<TrainerError> for TrainingFailure {
    #[track_caller]
    fn from(cause: TrainerError) -> Self {
        TrainingFailure::new(cause)
    }
}
