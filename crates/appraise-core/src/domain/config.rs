//! Immutable pipeline configuration.
//!
//! Constructed once by an external loader and passed explicitly into every
//! component; the core never reads files or the environment. Invariants
//! (weight sum, threshold ordering) are enforced at construction time, so
//! a held `AssessConfig` is always valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::step::Dimension;

/// Tolerance for the weight-sum invariant.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Configuration validation errors. All fatal: an invalid configuration
/// never reaches the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("dimension weights must sum to 1.0, got {sum}")]
    WeightSum { sum: f64 },

    #[error("weight for {dimension} must be a finite value in [0, 1], got {value}")]
    InvalidWeight { dimension: String, value: f64 },

    #[error("grade thresholds must be strictly descending in (0, 100], got {a}/{b}/{c}/{d}")]
    ThresholdOrder { a: f64, b: f64, c: f64, d: f64 },

    #[error("baseline_runs must be at least 2 to detect flakiness, got {0}")]
    BaselineRuns(u32),

    #[error("{name} command must not be empty")]
    EmptyCommand { name: &'static str },

    #[error("{name} timeout must be non-zero")]
    ZeroTimeout { name: &'static str },
}

/// Per-dimension weights; must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub mutation: f64,
    pub statics: f64,
    pub baseline: f64,
    pub risk: f64,
    pub cochange: f64,
}

impl DimensionWeights {
    /// Weight for one dimension.
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Mutation => self.mutation,
            Dimension::Static => self.statics,
            Dimension::Baseline => self.baseline,
            Dimension::Risk => self.risk,
            Dimension::Cochange => self.cochange,
        }
    }

    fn sum(&self) -> f64 {
        Dimension::PIPELINE_ORDER.iter().map(|d| self.get(*d)).sum()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for dim in Dimension::PIPELINE_ORDER {
            let w = self.get(dim);
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(ConfigError::InvalidWeight {
                    dimension: dim.name().to_string(),
                    value: w,
                });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConfigError::WeightSum { sum });
        }
        Ok(())
    }
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            mutation: 0.30,
            statics: 0.20,
            baseline: 0.15,
            risk: 0.20,
            cochange: 0.15,
        }
    }
}

/// Grade cut points; each grade is awarded when the score meets or exceeds
/// its threshold, scanned high to low, with F below the D threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeThresholds {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl GradeThresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.a > self.b && self.b > self.c && self.c > self.d;
        let in_range = [self.a, self.b, self.c, self.d]
            .iter()
            .all(|t| t.is_finite() && *t > 0.0 && *t <= 100.0);
        if !ordered || !in_range {
            return Err(ConfigError::ThresholdOrder {
                a: self.a,
                b: self.b,
                c: self.c,
                d: self.d,
            });
        }
        Ok(())
    }
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            a: 90.0,
            b: 75.0,
            c: 60.0,
            d: 40.0,
        }
    }
}

/// Per-step timeouts in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTimeouts {
    /// One unmutated test-suite run during the baseline step.
    pub baseline_run_secs: u64,

    /// One file's mutation run; expiry truncates that file only.
    pub mutation_file_secs: u64,

    /// Global mutation budget; files beyond it are left unsampled.
    pub mutation_total_secs: u64,

    /// One static-analysis tool invocation.
    pub static_secs: u64,

    /// One historical-knowledge query.
    pub knowledge_secs: u64,

    /// Changeset resolution.
    pub resolve_secs: u64,
}

impl StepTimeouts {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("baseline_run", self.baseline_run_secs),
            ("mutation_file", self.mutation_file_secs),
            ("mutation_total", self.mutation_total_secs),
            ("static", self.static_secs),
            ("knowledge", self.knowledge_secs),
            ("resolve", self.resolve_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroTimeout { name });
            }
        }
        Ok(())
    }
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            baseline_run_secs: 120,
            mutation_file_secs: 120,
            mutation_total_secs: 600,
            static_secs: 60,
            knowledge_secs: 30,
            resolve_secs: 30,
        }
    }
}

/// Severity of a static-analysis finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

/// Deduction constants used in metric normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deductions {
    /// Points deducted per weighted issue per file in the static score.
    pub static_issue_scale: f64,

    /// Severity multipliers applied to static findings.
    pub severity_critical: f64,
    pub severity_high: f64,
    pub severity_medium: f64,
    pub severity_low: f64,
    pub severity_info: f64,

    /// Risk points per matched pitfall.
    pub risk_pitfall_penalty: f64,

    /// Hot-file churn is divided by this to obtain risk points.
    pub risk_hot_churn_divisor: f64,

    /// Cap on risk points a single hot file can contribute.
    pub risk_hot_cap: f64,
}

impl Deductions {
    /// Weight for one finding severity.
    pub fn severity_weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.severity_critical,
            Severity::High => self.severity_high,
            Severity::Medium => self.severity_medium,
            Severity::Low => self.severity_low,
            Severity::Info => self.severity_info,
        }
    }
}

impl Default for Deductions {
    fn default() -> Self {
        Self {
            static_issue_scale: 10.0,
            severity_critical: 10.0,
            severity_high: 5.0,
            severity_medium: 2.0,
            severity_low: 1.0,
            severity_info: 0.0,
            risk_pitfall_penalty: 5.0,
            risk_hot_churn_divisor: 5.0,
            risk_hot_cap: 10.0,
        }
    }
}

/// Argv templates for the external signal tools. File paths are appended
/// to the template at invocation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCommands {
    /// Test runner exercised by the baseline step.
    pub test: Vec<String>,

    /// Mutation runner; invoked once per file, must report
    /// `{"killed": n, "total": n}` on stdout.
    pub mutation: Vec<String>,

    /// Linter; must emit a JSON array of findings.
    pub lint: Vec<String>,

    /// Type checker; emits `file:line: severity: message` lines.
    pub types: Vec<String>,

    /// Historical-knowledge database, relative to the assessed repo.
    pub knowledge_db: PathBuf,
}

impl ToolCommands {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, cmd) in [
            ("test", &self.test),
            ("mutation", &self.mutation),
            ("lint", &self.lint),
            ("types", &self.types),
        ] {
            if cmd.is_empty() || cmd[0].is_empty() {
                return Err(ConfigError::EmptyCommand { name });
            }
        }
        Ok(())
    }
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            test: vec!["pytest".into()],
            mutation: vec!["mutation-runner".into()],
            lint: vec![
                "ruff".into(),
                "check".into(),
                "--output-format=json".into(),
                "--no-fix".into(),
            ],
            types: vec![
                "mypy".into(),
                "--no-color-output".into(),
                "--no-error-summary".into(),
            ],
            knowledge_db: PathBuf::from(".appraise/knowledge.db"),
        }
    }
}

/// Immutable pipeline configuration, validated at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessConfig {
    pub weights: DimensionWeights,
    pub thresholds: GradeThresholds,
    pub timeouts: StepTimeouts,
    pub deductions: Deductions,
    pub tools: ToolCommands,

    /// Repeated unmutated test runs in the baseline step.
    pub baseline_runs: u32,

    /// Retention window for pruning stored assessments.
    pub retention_days: u32,
}

impl AssessConfig {
    /// Build and validate a configuration.
    pub fn new(
        weights: DimensionWeights,
        thresholds: GradeThresholds,
        timeouts: StepTimeouts,
        deductions: Deductions,
        tools: ToolCommands,
        baseline_runs: u32,
        retention_days: u32,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            weights,
            thresholds,
            timeouts,
            deductions,
            tools,
            baseline_runs,
            retention_days,
        };
        config.validate()?;
        Ok(config)
    }

    /// Re-check every invariant. Cheap; the orchestrator calls this once
    /// before the first producer runs so deserialized values get the same
    /// guarantees as constructed ones.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.thresholds.validate()?;
        self.timeouts.validate()?;
        self.tools.validate()?;
        if self.baseline_runs < 2 {
            return Err(ConfigError::BaselineRuns(self.baseline_runs));
        }
        Ok(())
    }
}

impl Default for AssessConfig {
    fn default() -> Self {
        Self {
            weights: DimensionWeights::default(),
            thresholds: GradeThresholds::default(),
            timeouts: StepTimeouts::default(),
            deductions: Deductions::default(),
            tools: ToolCommands::default(),
            baseline_runs: 3,
            retention_days: 90,
        }
    }
}
