//! Step-level outcome types shared by producers, scoring and storage.

use serde::{Deserialize, Serialize};

/// Assessment dimensions, one per signal producer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Flaky-test detection over repeated unmutated runs.
    Baseline,

    /// Mutation-kill ratio over changed files.
    Mutation,

    /// Lint and type-check issue density.
    Static,

    /// Historical hot-file and pitfall risk.
    Risk,

    /// Historical co-change partner coverage.
    Cochange,
}

impl Dimension {
    /// Fixed pipeline execution order.
    ///
    /// Baseline and mutation both exercise the target test suite and must
    /// never overlap; the rest only read the changeset, so the order is
    /// about wall-clock sequencing, not correctness.
    pub const PIPELINE_ORDER: [Dimension; 5] = [
        Dimension::Baseline,
        Dimension::Mutation,
        Dimension::Static,
        Dimension::Risk,
        Dimension::Cochange,
    ];

    /// Get the dimension name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Baseline => "baseline",
            Dimension::Mutation => "mutation",
            Dimension::Static => "static",
            Dimension::Risk => "risk",
            Dimension::Cochange => "cochange",
        }
    }

    /// Parse a dimension from its stored name.
    pub fn parse(s: &str) -> Option<Dimension> {
        match s {
            "baseline" => Some(Dimension::Baseline),
            "mutation" => Some(Dimension::Mutation),
            "static" => Some(Dimension::Static),
            "risk" => Some(Dimension::Risk),
            "cochange" => Some(Dimension::Cochange),
            _ => None,
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Terminal status of a producer invocation.
///
/// `pending -> running -> {ok, degraded, skipped, failed}`; only the
/// terminal states are ever recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Signal produced normally.
    Ok,

    /// An optional collaborator was unavailable; the metric is a neutral
    /// fallback, not a measurement of its absence.
    Degraded,

    /// Explicitly opted out via skip flag, or re-tagged by scoring when
    /// the metric carries no signal (e.g. zero mutants).
    Skipped,

    /// The producer crashed, timed out, or returned malformed output.
    Failed,
}

impl StepStatus {
    /// Whether this step contributes to the weighted score.
    ///
    /// Skipped and failed dimensions are excluded and their weight is
    /// redistributed; degraded dimensions contribute their fallback score.
    pub fn is_scorable(&self) -> bool {
        matches!(self, StepStatus::Ok | StepStatus::Degraded)
    }

    /// Get the status name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            StepStatus::Ok => "ok",
            StepStatus::Degraded => "degraded",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "failed",
        }
    }

    /// Parse a status from its stored name.
    pub fn parse(s: &str) -> Option<StepStatus> {
        match s {
            "ok" => Some(StepStatus::Ok),
            "degraded" => Some(StepStatus::Degraded),
            "skipped" => Some(StepStatus::Skipped),
            "failed" => Some(StepStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Raw metric reported by a producer, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawMetric {
    /// Tests with non-uniform pass/fail outcomes across repeated runs.
    Baseline { flaky: u64, total: u64, runs: u32 },

    /// Aggregated mutant counts; files cut off by the per-file timeout
    /// still contribute their partial totals.
    Mutation {
        killed: u64,
        total: u64,
        timed_out_files: u64,
    },

    /// Severity-weighted issue total over the changed file count.
    Static {
        weighted_issues: f64,
        issue_count: u64,
        file_count: u64,
    },

    /// Combined hot-file/pitfall risk signal in [0, 1].
    Risk {
        signal: f64,
        hot_files: u64,
        pitfalls: u64,
    },

    /// Historical co-change partners present in the changeset.
    Cochange { covered: u64, expected: u64 },
}

/// Outcome of one pipeline step, created by a producer and stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    /// Which dimension this step measured.
    pub dimension: Dimension,

    /// Terminal producer status.
    pub status: StepStatus,

    /// Raw metric; absent for skipped and failed steps.
    pub metric: Option<RawMetric>,

    /// Normalized score in [0, 100], filled in by the scoring engine.
    pub score: Option<f64>,

    /// Error or degradation note, if any.
    pub error: Option<String>,

    /// Wall-clock duration of the step in milliseconds.
    pub duration_ms: u64,
}

impl StepResult {
    /// A step that produced its signal normally.
    pub fn ok(dimension: Dimension, metric: RawMetric, duration_ms: u64) -> Self {
        Self {
            dimension,
            status: StepStatus::Ok,
            metric: Some(metric),
            score: None,
            error: None,
            duration_ms,
        }
    }

    /// A step whose optional collaborator was unavailable; carries a
    /// neutral metric plus the reason.
    pub fn degraded(
        dimension: Dimension,
        metric: RawMetric,
        reason: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            dimension,
            status: StepStatus::Degraded,
            metric: Some(metric),
            score: None,
            error: Some(reason.into()),
            duration_ms,
        }
    }

    /// A step skipped by an explicit flag; never invoked.
    pub fn skipped(dimension: Dimension) -> Self {
        Self {
            dimension,
            status: StepStatus::Skipped,
            metric: None,
            score: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// A step whose producer failed; the error is recorded for audit.
    pub fn failed(dimension: Dimension, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            dimension,
            status: StepStatus::Failed,
            metric: None,
            score: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order_is_fixed() {
        assert_eq!(
            Dimension::PIPELINE_ORDER,
            [
                Dimension::Baseline,
                Dimension::Mutation,
                Dimension::Static,
                Dimension::Risk,
                Dimension::Cochange,
            ]
        );
    }

    #[test]
    fn test_dimension_name_round_trip() {
        for dim in Dimension::PIPELINE_ORDER {
            assert_eq!(Dimension::parse(dim.name()), Some(dim));
        }
        assert_eq!(Dimension::parse("bogus"), None);
    }

    #[test]
    fn test_status_scorable() {
        assert!(StepStatus::Ok.is_scorable());
        assert!(StepStatus::Degraded.is_scorable());
        assert!(!StepStatus::Skipped.is_scorable());
        assert!(!StepStatus::Failed.is_scorable());
    }

    #[test]
    fn test_step_constructors() {
        let ok = StepResult::ok(
            Dimension::Mutation,
            RawMetric::Mutation {
                killed: 8,
                total: 10,
                timed_out_files: 0,
            },
            1200,
        );
        assert_eq!(ok.status, StepStatus::Ok);
        assert!(ok.metric.is_some());
        assert!(ok.score.is_none());

        let skipped = StepResult::skipped(Dimension::Baseline);
        assert_eq!(skipped.status, StepStatus::Skipped);
        assert!(skipped.metric.is_none());
        assert_eq!(skipped.duration_ms, 0);

        let failed = StepResult::failed(Dimension::Static, "linter exited 2", 40);
        assert_eq!(failed.status, StepStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("linter exited 2"));
    }
}
