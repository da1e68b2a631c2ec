//! Assessment and feedback records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::step::{StepResult, StepStatus};

/// Opaque, stable identifier for an assessment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssessmentId(pub String);

impl AssessmentId {
    /// Generate a new random id.
    pub fn new() -> Self {
        AssessmentId(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for display (first 8 chars).
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl Default for AssessmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AssessmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Letter grade derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn name(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    pub fn parse(s: &str) -> Option<Grade> {
        match s {
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            "D" => Some(Grade::D),
            "F" => Some(Grade::F),
            _ => None,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whether every dimension produced a usable signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    /// All steps ok or degraded.
    Complete,

    /// At least one step failed or was skipped.
    Partial,
}

impl AssessmentStatus {
    /// Derive the status from the step sequence.
    pub fn from_steps(steps: &[StepResult]) -> Self {
        if steps
            .iter()
            .any(|s| matches!(s.status, StepStatus::Failed | StepStatus::Skipped))
        {
            AssessmentStatus::Partial
        } else {
            AssessmentStatus::Complete
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AssessmentStatus::Complete => "complete",
            AssessmentStatus::Partial => "partial",
        }
    }

    pub fn parse(s: &str) -> Option<AssessmentStatus> {
        match s {
            "complete" => Some(AssessmentStatus::Complete),
            "partial" => Some(AssessmentStatus::Partial),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One committed assessment run. Immutable after the store commit; later
/// context arrives only through attached [`Feedback`] records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,

    /// Identifier of the assessed repository (canonical path).
    pub repo: String,

    pub ref_before: Option<String>,
    pub ref_after: Option<String>,

    /// Changed files covered by this run.
    pub files: Vec<String>,

    pub created_at: DateTime<Utc>,

    /// Step results in fixed pipeline order.
    pub steps: Vec<StepResult>,

    /// Weighted score in [0, 100].
    pub overall_score: f64,

    pub grade: Grade,

    pub status: AssessmentStatus,
}

/// Appended judgement on a past assessment; many-to-one, append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub assessment_id: AssessmentId,
    pub outcome: FeedbackOutcome,
    pub context: String,
    pub created_at: DateTime<Utc>,
}

/// How the assessed change fared after review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackOutcome {
    Accepted,
    Rejected,
    Modified,
}

impl FeedbackOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            FeedbackOutcome::Accepted => "accepted",
            FeedbackOutcome::Rejected => "rejected",
            FeedbackOutcome::Modified => "modified",
        }
    }

    pub fn parse(s: &str) -> Option<FeedbackOutcome> {
        match s {
            "accepted" => Some(FeedbackOutcome::Accepted),
            "rejected" => Some(FeedbackOutcome::Rejected),
            "modified" => Some(FeedbackOutcome::Modified),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeedbackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
