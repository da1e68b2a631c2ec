//! Static analysis: linter plus type checker over changed files.
//!
//! The two tools run as independent subprocess calls; their findings are
//! merged, weighted by the configured severity table and divided by the
//! changed-file count.

use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use appraise_core::{AssessConfig, ChangeSet, Dimension, RawMetric, Severity, StepResult};

use crate::exec::{run_command, CommandOutput};
use crate::producer::{SignalProducer, StepError};

/// Lint/type-check issue density adapter.
pub struct StaticProducer;

#[async_trait]
impl SignalProducer for StaticProducer {
    fn dimension(&self) -> Dimension {
        Dimension::Static
    }

    async fn produce(
        &self,
        change: &ChangeSet,
        config: &AssessConfig,
        cancel: &CancellationToken,
    ) -> Result<StepResult, StepError> {
        let start = Instant::now();

        let files: Vec<PathBuf> = change
            .files()
            .iter()
            .filter(|f| change.repo().join(f).exists())
            .cloned()
            .collect();

        if files.is_empty() {
            // Nothing to analyze; scoring treats the zero-file metric as
            // no signal.
            return Ok(StepResult::ok(
                Dimension::Static,
                RawMetric::Static {
                    weighted_issues: 0.0,
                    issue_count: 0,
                    file_count: 0,
                },
                start.elapsed().as_millis() as u64,
            ));
        }

        let file_args: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();

        let lint_out = run_tool(&config.tools.lint, &file_args, change, config, cancel).await?;
        let lint = parse_lint_findings(&config.tools.lint.join(" "), &lint_out)?;

        let types_out = run_tool(&config.tools.types, &file_args, change, config, cancel).await?;
        let types = parse_checker_findings(&types_out.stdout);

        let issue_count = (lint.len() + types.len()) as u64;
        let weighted_issues: f64 = lint
            .iter()
            .chain(types.iter())
            .map(|s| config.deductions.severity_weight(*s))
            .sum();

        debug!(
            lint = lint.len(),
            types = types.len(),
            weighted = weighted_issues,
            "static analysis finished"
        );

        Ok(StepResult::ok(
            Dimension::Static,
            RawMetric::Static {
                weighted_issues,
                issue_count,
                file_count: files.len() as u64,
            },
            start.elapsed().as_millis() as u64,
        ))
    }
}

async fn run_tool(
    template: &[String],
    file_args: &[String],
    change: &ChangeSet,
    config: &AssessConfig,
    cancel: &CancellationToken,
) -> Result<CommandOutput, StepError> {
    let mut argv = template.to_vec();
    argv.extend_from_slice(file_args);
    let out = run_command(&argv, change.repo(), config.timeouts.static_secs, cancel).await?;

    // Analyzers exit 1 when they find issues; anything beyond that is the
    // tool itself breaking.
    if out.exit_code > 1 || out.exit_code < 0 {
        return Err(StepError::Tool {
            command: template.join(" "),
            exit_code: out.exit_code,
            detail: out.stderr.trim().to_string(),
        });
    }
    Ok(out)
}

/// Parse linter output: a JSON array of findings carrying either a
/// `severity` field or a rule `code` to map.
fn parse_lint_findings(command: &str, out: &CommandOutput) -> Result<Vec<Severity>, StepError> {
    let trimmed = out.stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let values: Vec<serde_json::Value> =
        serde_json::from_str(trimmed).map_err(|e| StepError::Parse {
            command: command.to_string(),
            detail: format!("expected a JSON array of findings: {}", e),
        })?;

    Ok(values
        .iter()
        .map(|v| {
            if let Some(s) = v.get("severity").and_then(|s| s.as_str()) {
                parse_severity(s)
            } else {
                code_severity(v.get("code").and_then(|c| c.as_str()).unwrap_or(""))
            }
        })
        .collect())
}

fn parse_severity(s: &str) -> Severity {
    match s {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "low" => Severity::Low,
        "info" => Severity::Info,
        _ => Severity::Medium,
    }
}

/// Map linter rule codes to severity levels: security and error-prone
/// families are high, pure style is low.
fn code_severity(code: &str) -> Severity {
    if code.starts_with('S') || code.starts_with("E9") || code.starts_with('F') {
        Severity::High
    } else if code.starts_with('E') || code.starts_with('W') {
        Severity::Low
    } else {
        Severity::Medium
    }
}

/// Parse type-checker lines of the form `file:line: severity: message`.
fn parse_checker_findings(output: &str) -> Vec<Severity> {
    output.lines().filter_map(parse_checker_line).collect()
}

fn parse_checker_line(line: &str) -> Option<Severity> {
    let mut parts = line.splitn(4, ':');
    let _file = parts.next()?;
    let line_no = parts.next()?.trim();
    if line_no.parse::<u32>().is_err() {
        return None;
    }
    let severity = parts.next()?.trim();
    parts.next()?;

    Some(match severity {
        "error" => Severity::High,
        "warning" => Severity::Medium,
        "note" => Severity::Info,
        _ => Severity::Medium,
    })
}
