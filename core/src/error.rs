/// error.rs — Core error taxonomy
///
/// Every module boundary (returns preparer, GARCH engine, NF subsystem,
/// NF-GARCH simulator, evaluator) returns `Result<T, CoreError>` rather than
/// panicking or unwinding across the boundary. The orchestrating layer
/// (the `cli` crate) aggregates these into exit codes; a failed fit or
/// training run is recorded with NaN metrics rather than aborting the run.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported spec: {0}")]
    Spec(String),

    #[error("stationarity constraints violated: {0}")]
    Constraints(String),

    #[error("non-finite likelihood or variance at t={t}: {detail}")]
    Numerics { t: usize, detail: String },

    #[error("NF training diverged after retry: {0}")]
    TrainingDiverged(String),

    #[error("operation timed out after {elapsed_secs:.1}s")]
    Timeout { elapsed_secs: f64 },

    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Exit code mapping required by the CLI contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::InvalidInput(_) => 2,
            CoreError::Spec(_) => 3,
            CoreError::Numerics { .. } => 4,
            CoreError::Constraints(_) => 5,
            CoreError::TrainingDiverged(_) => 6,
            CoreError::Timeout { .. } => 7,
            CoreError::Cancelled => 8,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
