//! Signal producer capability contract.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use appraise_core::{AssessConfig, ChangeSet, Dimension, StepResult};

/// Errors raised by a producer invocation.
///
/// Everything except `Cancelled` is recovered at the orchestrator
/// boundary and recorded as a `failed` step; `Cancelled` aborts the whole
/// run without a commit.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("`{command}` timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {exit_code}: {detail}")]
    Tool {
        command: String,
        exit_code: i32,
        detail: String,
    },

    #[error("malformed output from `{command}`: {detail}")]
    Parse { command: String, detail: String },

    #[error("step cancelled")]
    Cancelled,
}

/// A source of one quality signal for a changeset.
///
/// Invocations may be long-running and must honour the configured
/// timeouts and the cancellation token; each runs to exactly one terminal
/// state (`ok`, `degraded`, or an error the orchestrator records as
/// `failed`). No retries within a single assessment run.
#[async_trait]
pub trait SignalProducer: Send + Sync {
    /// The dimension this producer measures.
    fn dimension(&self) -> Dimension;

    /// Produce a step result for the changeset under the configuration.
    async fn produce(
        &self,
        change: &ChangeSet,
        config: &AssessConfig,
        cancel: &CancellationToken,
    ) -> Result<StepResult, StepError>;
}
