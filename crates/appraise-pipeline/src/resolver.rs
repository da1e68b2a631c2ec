//! Changeset resolution between two revisions.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use appraise_core::{AssessConfig, ChangeSet};

use crate::exec::run_command;
use crate::producer::StepError;

/// Errors during changeset resolution. Always fatal: with no changeset
/// there is nothing to score.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{0}")]
    Failed(String),

    #[error("resolution cancelled")]
    Cancelled,
}

impl From<StepError> for ResolveError {
    fn from(err: StepError) -> Self {
        match err {
            StepError::Cancelled => ResolveError::Cancelled,
            other => ResolveError::Failed(other.to_string()),
        }
    }
}

/// Resolves the set of files changed between two revision identifiers.
#[async_trait]
pub trait ChangeResolver: Send + Sync {
    async fn resolve(
        &self,
        repo: &Path,
        ref_before: Option<&str>,
        ref_after: Option<&str>,
        config: &AssessConfig,
        cancel: &CancellationToken,
    ) -> Result<ChangeSet, ResolveError>;
}

/// Resolver backed by `git diff --name-only`.
pub struct GitResolver;

/// Build the diff argv for a revision range.
///
/// Both refs: `before..after`. Only before: `before..HEAD`. Neither:
/// HEAD against the working tree.
fn diff_args(ref_before: Option<&str>, ref_after: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "git".to_string(),
        "diff".to_string(),
        "--name-only".to_string(),
    ];
    match (ref_before, ref_after) {
        (Some(before), Some(after)) => args.push(format!("{}..{}", before, after)),
        (Some(before), None) => args.push(format!("{}..HEAD", before)),
        _ => args.push("HEAD".to_string()),
    }
    args
}

#[async_trait]
impl ChangeResolver for GitResolver {
    async fn resolve(
        &self,
        repo: &Path,
        ref_before: Option<&str>,
        ref_after: Option<&str>,
        config: &AssessConfig,
        cancel: &CancellationToken,
    ) -> Result<ChangeSet, ResolveError> {
        let timeout = config.timeouts.resolve_secs;
        let mut out = run_command(&diff_args(ref_before, ref_after), repo, timeout, cancel).await?;

        // A fresh repository has no HEAD yet; fall back to the staged set.
        if !out.success() && out.stderr.contains("HEAD") {
            debug!("no HEAD in target repo, diffing staged files");
            let cached = vec![
                "git".to_string(),
                "diff".to_string(),
                "--name-only".to_string(),
                "--cached".to_string(),
            ];
            out = run_command(&cached, repo, timeout, cancel).await?;
        }

        if !out.success() {
            return Err(ResolveError::Failed(format!(
                "git diff exited with code {}: {}",
                out.exit_code,
                out.stderr.trim()
            )));
        }

        let files: Vec<PathBuf> = out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect();

        Ok(ChangeSet::new(
            repo.to_path_buf(),
            ref_before.map(str::to_string),
            ref_after.map(str::to_string),
            files,
        ))
    }
}
