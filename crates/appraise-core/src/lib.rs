//! Appraise Core Library
//!
//! Domain model and scoring engine for the change assessment pipeline:
//! - Immutable configuration and changeset value objects
//! - Step/assessment record types shared across the pipeline and the store
//! - The scoring engine (normalization, weight renormalization, grading)

pub mod domain;
pub mod scoring;
pub mod telemetry;

pub use domain::{
    AssessConfig, AssessError, Assessment, AssessmentId, AssessmentStatus, ChangeSet, ConfigError,
    Deductions, Dimension, DimensionWeights, Feedback, FeedbackOutcome, Grade, GradeThresholds,
    RawMetric, Result, Severity, StepResult, StepStatus, StepTimeouts, ToolCommands,
};

pub use scoring::{score_steps, ScoreSummary};

pub use telemetry::init_tracing;

/// Appraise version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
