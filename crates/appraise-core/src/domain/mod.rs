//! Domain value objects for the assessment pipeline.

pub mod assessment;
pub mod changeset;
pub mod config;
pub mod error;
pub mod step;

pub use assessment::{
    Assessment, AssessmentId, AssessmentStatus, Feedback, FeedbackOutcome, Grade,
};
pub use changeset::ChangeSet;
pub use config::{
    AssessConfig, ConfigError, Deductions, DimensionWeights, GradeThresholds, Severity,
    StepTimeouts, ToolCommands,
};
pub use error::{AssessError, Result};
pub use step::{Dimension, RawMetric, StepResult, StepStatus};
