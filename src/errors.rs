use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy for the forecasting core.
///
/// The orchestrator treats these very differently: `Validation` and
/// `ModelExecution` are per-item conditions that cause the item to be
/// skipped within a run, `Configuration` is a caller mistake that fails
/// fast, `RunFailure` is the terminal "nothing usable came out" state of
/// a run, and `Store` wraps unexpected persistence failures which mark
/// the run failed and propagate to the caller.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Model execution error: {0}")]
    ModelExecution(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Run failure: {0}")]
    RunFailure(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Event error: {0}")]
    Event(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ForecastError {
    /// Whether this error is scoped to a single item and should cause a
    /// skip rather than aborting the whole run.
    pub fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            ForecastError::Validation(_) | ForecastError::ModelExecution(_)
        )
    }
}

/// Serializable view of an error for audit payloads and API layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
}

impl From<&ForecastError> for ErrorReport {
    fn from(err: &ForecastError) -> Self {
        let kind = match err {
            ForecastError::Validation(_) => "validation",
            ForecastError::ModelExecution(_) => "model_execution",
            ForecastError::Configuration(_) => "configuration",
            ForecastError::RunFailure(_) => "run_failure",
            ForecastError::Store(_) => "store",
            ForecastError::Event(_) => "event",
            ForecastError::Internal(_) => "internal",
        };
        Self {
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
