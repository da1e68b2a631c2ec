//! Domain-level error taxonomy for the assessment pipeline.
//!
//! Only the fatal outcomes live here. Per-step failures are recovered
//! locally by the orchestrator and recorded as `failed` step results,
//! never raised through this type.

/// Errors that abort an assessment run.
#[derive(Debug, thiserror::Error)]
pub enum AssessError {
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::domain::config::ConfigError),

    #[error("cannot resolve changeset: {0}")]
    Resolution(String),

    #[error("no scorable dimensions: every step failed or was skipped")]
    NoScorableDimensions,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("assessment cancelled before commit")]
    Cancelled,
}

/// Result type for assessment operations.
pub type Result<T> = std::result::Result<T, AssessError>;
