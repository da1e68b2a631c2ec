//! Historical risk: hot-file churn and pitfall matches for the changeset.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use appraise_core::{AssessConfig, ChangeSet, Dimension, RawMetric, StepResult};

use crate::knowledge::{KnowledgeReply, KnowledgeSignals, KnowledgeSource};
use crate::producer::{SignalProducer, StepError};

/// Historical risk adapter over the knowledge collaborator.
pub struct RiskProducer {
    knowledge: Arc<dyn KnowledgeSource>,
}

impl RiskProducer {
    pub fn new(knowledge: Arc<dyn KnowledgeSource>) -> Self {
        Self { knowledge }
    }
}

/// Combine hot-file churn and pitfall matches into a [0, 1] risk signal.
///
/// Each hot file contributes `min(cap, churn / divisor)` points, each
/// pitfall a fixed penalty; 100 points saturate the signal.
fn risk_signal(signals: &KnowledgeSignals, config: &AssessConfig) -> f64 {
    let ded = &config.deductions;
    let mut points = 0.0;
    for hot in &signals.hot_files {
        points += (hot.churn_score / ded.risk_hot_churn_divisor).min(ded.risk_hot_cap);
    }
    points += signals.pitfalls.len() as f64 * ded.risk_pitfall_penalty;
    (points / 100.0).clamp(0.0, 1.0)
}

#[async_trait]
impl SignalProducer for RiskProducer {
    fn dimension(&self) -> Dimension {
        Dimension::Risk
    }

    async fn produce(
        &self,
        change: &ChangeSet,
        config: &AssessConfig,
        cancel: &CancellationToken,
    ) -> Result<StepResult, StepError> {
        let start = Instant::now();
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        match self.knowledge.query(change, config).await {
            KnowledgeReply::Unavailable { reason } => {
                debug!(%reason, "knowledge source unavailable, degrading risk to neutral");
                Ok(StepResult::degraded(
                    Dimension::Risk,
                    RawMetric::Risk {
                        signal: 0.0,
                        hot_files: 0,
                        pitfalls: 0,
                    },
                    reason,
                    start.elapsed().as_millis() as u64,
                ))
            }
            KnowledgeReply::Available(signals) => Ok(StepResult::ok(
                Dimension::Risk,
                RawMetric::Risk {
                    signal: risk_signal(&signals, config),
                    hot_files: signals.hot_files.len() as u64,
                    pitfalls: signals.pitfalls.len() as u64,
                },
                start.elapsed().as_millis() as u64,
            )),
        }
    }
}
