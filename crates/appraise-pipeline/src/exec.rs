//! Bounded subprocess execution for signal tools.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::producer::StepError;

/// Captured result of a finished tool invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the tool exited with code zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `argv` in `cwd`, bounded by `timeout_secs`.
///
/// The child is spawned with `kill_on_drop`, so both a timeout and a
/// cancellation forcibly terminate the underlying process; no invocation
/// can block past its bound. A non-zero exit is not an error here -
/// callers decide what the exit code means for their tool.
pub async fn run_command(
    argv: &[String],
    cwd: &Path,
    timeout_secs: u64,
    cancel: &CancellationToken,
) -> Result<CommandOutput, StepError> {
    let command_display = argv.join(" ");
    let (exe, args) = argv.split_first().ok_or_else(|| StepError::Parse {
        command: String::new(),
        detail: "empty command".to_string(),
    })?;

    let start = Instant::now();
    let child = Command::new(exe)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| StepError::Spawn {
            command: command_display.clone(),
            source,
        })?;

    let wait = child.wait_with_output();
    tokio::pin!(wait);

    let output = tokio::select! {
        _ = cancel.cancelled() => return Err(StepError::Cancelled),
        result = tokio::time::timeout(Duration::from_secs(timeout_secs), &mut wait) => {
            match result {
                Err(_) => {
                    return Err(StepError::Timeout {
                        command: command_display,
                        timeout_secs,
                    })
                }
                Ok(Err(source)) => {
                    return Err(StepError::Spawn {
                        command: command_display,
                        source,
                    })
                }
                Ok(Ok(output)) => output,
            }
        }
    };

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_run_simple_command() {
        let out = run_command(
            &["echo".to_string(), "hello".to_string()],
            Path::new("."),
            60,
            &token(),
        )
        .await
        .expect("run failed");

        assert!(out.success());
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_error() {
        let out = run_command(&["false".to_string()], Path::new("."), 60, &token())
            .await
            .expect("run failed");

        assert!(!out.success());
        assert_ne!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let result = run_command(
            &["/nonexistent-binary-that-does-not-exist".to_string()],
            Path::new("."),
            5,
            &token(),
        )
        .await;

        assert!(matches!(result, Err(StepError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_timeout_terminates_child() {
        let result = run_command(
            &["sleep".to_string(), "30".to_string()],
            Path::new("."),
            1,
            &token(),
        )
        .await;

        match result {
            Err(StepError::Timeout { timeout_secs, .. }) => assert_eq!(timeout_secs, 1),
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation_aborts_wait() {
        let cancel = token();
        cancel.cancel();
        let result = run_command(
            &["sleep".to_string(), "30".to_string()],
            Path::new("."),
            60,
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(StepError::Cancelled)));
    }
}
