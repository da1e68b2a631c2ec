//! Co-change coverage: are the files that historically change together
//! with this changeset actually part of it?

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use appraise_core::{AssessConfig, ChangeSet, Dimension, RawMetric, StepResult};

use crate::knowledge::{KnowledgeReply, KnowledgeSignals, KnowledgeSource};
use crate::producer::{SignalProducer, StepError};

/// Co-change partner coverage adapter.
pub struct CoChangeProducer {
    knowledge: Arc<dyn KnowledgeSource>,
}

impl CoChangeProducer {
    pub fn new(knowledge: Arc<dyn KnowledgeSource>) -> Self {
        Self { knowledge }
    }
}

/// Count covered and expected partners across the changeset.
///
/// A changed file with no known historical partners contributes nothing
/// to either count and therefore cannot penalize the dimension.
fn partner_coverage(signals: &KnowledgeSignals, change: &ChangeSet) -> (u64, u64) {
    let mut covered = 0u64;
    let mut expected = 0u64;
    for (file, partners) in &signals.partners {
        if !change.contains(Path::new(file)) {
            continue;
        }
        expected += partners.len() as u64;
        covered += partners
            .iter()
            .filter(|p| change.contains(Path::new(p.as_str())))
            .count() as u64;
    }
    (covered, expected)
}

#[async_trait]
impl SignalProducer for CoChangeProducer {
    fn dimension(&self) -> Dimension {
        Dimension::Cochange
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
                debug!(%reason, "knowledge source unavailable, degrading co-change to neutral");
                Ok(StepResult::degraded(
                    Dimension::Cochange,
                    RawMetric::Cochange {
                        covered: 0,
                        expected: 0,
                    },
                    reason,
                    start.elapsed().as_millis() as u64,
                ))
            }
            KnowledgeReply::Available(signals) => {
                let (covered, expected) = partner_coverage(&signals, change);
                Ok(StepResult::ok(
                    Dimension::Cochange,
                    RawMetric::Cochange { covered, expected },
                    start.elapsed().as_millis() as u64,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appraise_core::StepStatus;
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::PathBuf;

    struct FixedKnowledge(KnowledgeReply);

    #[async_trait]
    impl KnowledgeSource for FixedKnowledge {
        async fn query(&self, _change: &ChangeSet, _config: &AssessConfig) -> KnowledgeReply {
            self.0.clone()
        }
    }

    fn change(files: &[&str]) -> ChangeSet {
        ChangeSet::new(
            PathBuf::from("/repo"),
            None,
            None,
            files.iter().map(PathBuf::from).collect(),
        )
    }

    fn partners(map: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
        map.iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    v.iter().map(|p| p.to_string()).collect::<BTreeSet<_>>(),
                )
            })
            .collect()
    }

    #[test]
    fn test_partner_coverage_counts() {
        let signals = KnowledgeSignals {
            hot_files: Vec::new(),
            pitfalls: Vec::new(),
            partners: partners(&[
                ("src/core.py", &["tests/test_core.py", "src/util.py"]),
                ("src/other.py", &["src/elsewhere.py"]),
            ]),
        };
        // Changeset includes core + its test partner, but not util; the
        // other.py entry is ignored because other.py was not changed.
        let cs = change(&["src/core.py", "tests/test_core.py"]);
        assert_eq!(partner_coverage(&signals, &cs), (1, 2));
    }

    #[test]
    fn test_files_without_partners_do_not_penalize() {
        let signals = KnowledgeSignals::default();
        let cs = change(&["src/loner.py"]);
        assert_eq!(partner_coverage(&signals, &cs), (0, 0));
    }

    #[tokio::test]
    async fn test_full_coverage_metric() {
        let producer = CoChangeProducer::new(Arc::new(FixedKnowledge(KnowledgeReply::Available(
            KnowledgeSignals {
                hot_files: Vec::new(),
                pitfalls: Vec::new(),
                partners: partners(&[("src/core.py", &["tests/test_core.py"])]),
            },
        ))));

        let step = producer
            .produce(
                &change(&["src/core.py", "tests/test_core.py"]),
                &AssessConfig::default(),
                &CancellationToken::new(),
            )
            .await
            .expect("produce");

        assert_eq!(step.status, StepStatus::Ok);
        assert_eq!(
            step.metric,
            Some(RawMetric::Cochange {
                covered: 1,
                expected: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_unavailable_degrades_without_penalty() {
        let producer = CoChangeProducer::new(Arc::new(FixedKnowledge(
            KnowledgeReply::Unavailable {
                reason: "db missing".to_string(),
            },
        )));

        let step = producer
            .produce(
                &change(&["src/core.py"]),
                &AssessConfig::default(),
                &CancellationToken::new(),
            )
            .await
            .expect("produce");

        assert_eq!(step.status, StepStatus::Degraded);
        assert_eq!(
            step.metric,
            Some(RawMetric::Cochange {
                covered: 0,
                expected: 0,
            })
        );
    }
}
