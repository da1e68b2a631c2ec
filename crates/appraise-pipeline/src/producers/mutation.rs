//! Mutation testing over changed files.
//!
//! Each file gets its own bounded tool run inside a global budget. A
//! per-file timeout truncates that file's contribution without failing
//! the step; files left unsampled once the budget is spent are logged,
//! and the partial aggregate is still a meaningful kill ratio.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use appraise_core::{AssessConfig, ChangeSet, Dimension, RawMetric, StepResult};

use crate::exec::run_command;
use crate::producer::{SignalProducer, StepError};

/// Per-file mutation runner adapter.
pub struct MutationProducer;

#[async_trait]
impl SignalProducer for MutationProducer {
    fn dimension(&self) -> Dimension {
        Dimension::Mutation
    }

    async fn produce(
        &self,
        change: &ChangeSet,
        config: &AssessConfig,
        cancel: &CancellationToken,
    ) -> Result<StepResult, StepError> {
        let start = Instant::now();
        let budget = Duration::from_secs(config.timeouts.mutation_total_secs);

        let mut killed = 0u64;
        let mut total = 0u64;
        let mut timed_out_files = 0u64;
        let mut unsampled = 0u64;

        for file in change.files() {
            if cancel.is_cancelled() {
                return Err(StepError::Cancelled);
            }
            if start.elapsed() >= budget {
                unsampled += 1;
                continue;
            }
            if !change.repo().join(file).exists() {
                // Deleted files have nothing left to mutate.
                continue;
            }

            let remaining = budget.saturating_sub(start.elapsed()).as_secs().max(1);
            let timeout = config.timeouts.mutation_file_secs.min(remaining);

            let mut argv = config.tools.mutation.clone();
            argv.push(file.display().to_string());

            match run_command(&argv, change.repo(), timeout, cancel).await {
                Ok(out) => {
                    let (file_killed, file_total) = parse_counts(&argv.join(" "), &out)?;
                    killed += file_killed;
                    total += file_total;
                    debug!(
                        file = %file.display(),
                        killed = file_killed,
                        total = file_total,
                        "mutation run finished"
                    );
                }
                // This file's contribution is truncated; the step goes on.
                Err(StepError::Timeout { .. }) => {
                    warn!(file = %file.display(), "per-file mutation timeout, contribution truncated");
                    timed_out_files += 1;
                }
                Err(other) => return Err(other),
            }
        }

        if unsampled > 0 {
            warn!(
                unsampled,
                budget_secs = config.timeouts.mutation_total_secs,
                "mutation budget exhausted before all files were sampled"
            );
        }

        Ok(StepResult::ok(
            Dimension::Mutation,
            RawMetric::Mutation {
                killed,
                total,
                timed_out_files,
            },
            start.elapsed().as_millis() as u64,
        ))
    }
}

/// Pull `killed`/`total` counts from the tool's stdout.
///
/// Accepts either the whole output or the last non-empty line as a JSON
/// object; a non-zero exit with parseable counts is the tool reporting
/// surviving mutants, not a failure.
fn parse_counts(command: &str, out: &crate::exec::CommandOutput) -> Result<(u64, u64), StepError> {
    let candidates = [
        out.stdout.trim(),
        out.stdout.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or(""),
    ];

    for candidate in candidates {
        if candidate.is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
            let killed = value.get("killed").and_then(|v| v.as_u64());
            let total = value.get("total").and_then(|v| v.as_u64());
            if let (Some(killed), Some(total)) = (killed, total) {
                return Ok((killed, total));
            }
        }
    }

    if !out.success() {
        return Err(StepError::Tool {
            command: command.to_string(),
            exit_code: out.exit_code,
            detail: out.stderr.trim().to_string(),
        });
    }
    Err(StepError::Parse {
        command: command.to_string(),
        detail: "expected a JSON object with `killed` and `total`".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use std::path::PathBuf;

    fn output(exit_code: i32, stdout: &str) -> CommandOutput {
        CommandOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: String::new(),
            duration_ms: 5,
        }
    }

    #[test]
    fn test_parse_counts_whole_output() {
        let out = output(0, r#"{"killed": 8, "total": 10}"#);
        assert_eq!(parse_counts("tool", &out).unwrap(), (8, 10));
    }

    #[test]
    fn test_parse_counts_last_line_after_progress() {
        let out = output(1, "mutating...\nstill going\n{\"killed\": 3, \"total\": 4}\n");
        assert_eq!(parse_counts("tool", &out).unwrap(), (3, 4));
    }

    #[test]
    fn test_unparseable_zero_exit_is_parse_error() {
        let out = output(0, "all done!");
        assert!(matches!(
            parse_counts("tool", &out),
            Err(StepError::Parse { .. })
        ));
    }

    #[test]
    fn test_unparseable_nonzero_exit_is_tool_error() {
        let out = output(2, "traceback");
        assert!(matches!(
            parse_counts("tool", &out),
            Err(StepError::Tool { exit_code: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_aggregates_counts_across_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("b.py"), "y = 2\n").unwrap();

        let mut config = AssessConfig::default();
        // Every invocation reports the same counts; two files double them.
        config.tools.mutation = vec![
            "sh".to_string(),
            "-c".to_string(),
            r#"echo '{"killed": 2, "total": 3}'"#.to_string(),
        ];

        let change = ChangeSet::new(
            dir.path().to_path_buf(),
            None,
            None,
            vec![PathBuf::from("a.py"), PathBuf::from("b.py")],
        );
        let step = MutationProducer
            .produce(&change, &config, &CancellationToken::new())
            .await
            .expect("produce");

        match step.metric {
            Some(RawMetric::Mutation { killed, total, timed_out_files }) => {
                assert_eq!(killed, 4);
                assert_eq!(total, 6);
                assert_eq!(timed_out_files, 0);
            }
            other => panic!("unexpected metric {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deleted_file_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");

        let mut config = AssessConfig::default();
        config.tools.mutation = vec![
            "sh".to_string(),
            "-c".to_string(),
            r#"echo '{"killed": 2, "total": 3}'"#.to_string(),
        ];

        let change = ChangeSet::new(
            dir.path().to_path_buf(),
            None,
            None,
            vec![PathBuf::from("gone.py")],
        );
        let step = MutationProducer
            .produce(&change, &config, &CancellationToken::new())
            .await
            .expect("produce");

        assert_eq!(
            step.metric,
            Some(RawMetric::Mutation {
                killed: 0,
                total: 0,
                timed_out_files: 0,
            })
        );
    }
}
