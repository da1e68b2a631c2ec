//! External configuration loader.
//!
//! Builds the single immutable [`AssessConfig`] handed to the pipeline:
//! `<repo>/.appraise/config.toml` sections override the defaults, and the
//! result is validated before anything runs. The core never re-reads
//! configuration mid-run.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use appraise_core::{
    AssessConfig, Deductions, DimensionWeights, GradeThresholds, StepTimeouts, ToolCommands,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    weights: Option<DimensionWeights>,
    thresholds: Option<GradeThresholds>,
    timeouts: Option<StepTimeouts>,
    deductions: Option<Deductions>,
    tools: Option<ToolCommands>,
    baseline_runs: Option<u32>,
    retention_days: Option<u32>,
}

/// Load and validate the configuration for a repository.
pub fn load(repo: &Path) -> anyhow::Result<AssessConfig> {
    let path = repo.join(".appraise").join("config.toml");
    let file: ConfigFile = if path.exists() {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?
    } else {
        ConfigFile::default()
    };

    let defaults = AssessConfig::default();
    let config = AssessConfig::new(
        file.weights.unwrap_or(defaults.weights),
        file.thresholds.unwrap_or(defaults.thresholds),
        file.timeouts.unwrap_or(defaults.timeouts),
        file.deductions.unwrap_or(defaults.deductions),
        file.tools.unwrap_or(defaults.tools),
        file.baseline_runs.unwrap_or(defaults.baseline_runs),
        file.retention_days.unwrap_or(defaults.retention_days),
    )?;
    Ok(config)
}
