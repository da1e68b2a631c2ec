//! Assessment pipeline orchestration.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use appraise_core::{
    score_steps, AssessConfig, AssessError, Assessment, AssessmentId, AssessmentStatus, Dimension,
    StepResult,
};
use appraise_store::AssessmentStore;

use crate::knowledge::{KnowledgeSource, SqliteKnowledge};
use crate::producer::{SignalProducer, StepError};
use crate::producers::{
    BaselineProducer, CoChangeProducer, MutationProducer, RiskProducer, StaticProducer,
};
use crate::resolver::{ChangeResolver, GitResolver, ResolveError};

/// Per-dimension opt-out flags supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipFlags {
    pub baseline: bool,
    pub mutation: bool,
    pub statics: bool,
    pub risk: bool,
    pub cochange: bool,
}

impl SkipFlags {
    /// Run everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether the given dimension is opted out.
    pub fn is_skipped(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::Baseline => self.baseline,
            Dimension::Mutation => self.mutation,
            Dimension::Static => self.statics,
            Dimension::Risk => self.risk,
            Dimension::Cochange => self.cochange,
        }
    }
}

/// The assessment pipeline orchestrator.
///
/// Sequences the signal producers in fixed order with per-step isolation:
/// no single producer failure aborts the run. Only configuration,
/// resolution, scoring-impossibility and persistence errors are fatal,
/// and a cancelled run commits nothing.
pub struct Pipeline {
    resolver: Arc<dyn ChangeResolver>,
    producers: Vec<Arc<dyn SignalProducer>>,
    store: Arc<dyn AssessmentStore>,
}

/// The five default producers in pipeline order.
pub fn default_producers(knowledge: Arc<dyn KnowledgeSource>) -> Vec<Arc<dyn SignalProducer>> {
    vec![
        Arc::new(BaselineProducer),
        Arc::new(MutationProducer),
        Arc::new(StaticProducer),
        Arc::new(RiskProducer::new(knowledge.clone())),
        Arc::new(CoChangeProducer::new(knowledge)),
    ]
}

impl Pipeline {
    /// Pipeline with the default resolver and producer set.
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        let knowledge: Arc<dyn KnowledgeSource> = Arc::new(SqliteKnowledge::new());
        Self::with_parts(Arc::new(GitResolver), default_producers(knowledge), store)
    }

    /// Pipeline with explicit collaborators (used by tests and embedders).
    pub fn with_parts(
        resolver: Arc<dyn ChangeResolver>,
        producers: Vec<Arc<dyn SignalProducer>>,
        store: Arc<dyn AssessmentStore>,
    ) -> Self {
        Self {
            resolver,
            producers,
            store,
        }
    }

    /// Run a full assessment and return the committed record.
    pub async fn assess(
        &self,
        repo: &Path,
        ref_before: Option<&str>,
        ref_after: Option<&str>,
        config: &AssessConfig,
        skip: &SkipFlags,
        cancel: &CancellationToken,
    ) -> Result<Assessment, AssessError> {
        // Fatal before anything runs; deserialized configurations get the
        // same guarantees as constructed ones.
        config.validate()?;

        let change = self
            .resolver
            .resolve(repo, ref_before, ref_after, config, cancel)
            .await
            .map_err(|e| match e {
                ResolveError::Cancelled => AssessError::Cancelled,
                other => AssessError::Resolution(other.to_string()),
            })?;

        let id = AssessmentId::new();
        info!(
            id = %id,
            repo = %repo.display(),
            files = change.len(),
            "starting assessment pipeline"
        );

        let mut steps: Vec<StepResult> = Vec::with_capacity(self.producers.len());
        for producer in &self.producers {
            let dimension = producer.dimension();

            if cancel.is_cancelled() {
                return Err(AssessError::Cancelled);
            }

            if skip.is_skipped(dimension) {
                info!(%dimension, "skipping dimension by flag");
                steps.push(StepResult::skipped(dimension));
                continue;
            }

            info!(%dimension, "running signal producer");
            let started = Instant::now();
            let step = match producer.produce(&change, config, cancel).await {
                Ok(step) => step,
                Err(StepError::Cancelled) => return Err(AssessError::Cancelled),
                // Step isolation: the failure is recorded, the pipeline
                // moves on.
                Err(e) => {
                    warn!(%dimension, error = %e, "signal producer failed");
                    StepResult::failed(dimension, e.to_string(), started.elapsed().as_millis() as u64)
                }
            };
            info!(
                %dimension,
                status = %step.status,
                duration_ms = step.duration_ms,
                "step finished"
            );
            steps.push(step);
        }

        let summary = score_steps(&mut steps, config)?;

        let assessment = Assessment {
            id,
            repo: repo.display().to_string(),
            ref_before: ref_before.map(str::to_string),
            ref_after: ref_after.map(str::to_string),
            files: change
                .files()
                .iter()
                .map(|f| f.display().to_string())
                .collect(),
            created_at: Utc::now(),
            status: AssessmentStatus::from_steps(&steps),
            steps,
            overall_score: summary.overall_score,
            grade: summary.grade,
        };

        // Cancellation is a no-commit abort, distinct from a partial run.
        if cancel.is_cancelled() {
            return Err(AssessError::Cancelled);
        }

        self.store
            .commit(&assessment)
            .map_err(|e| AssessError::Storage(e.to_string()))?;

        info!(
            id = %assessment.id,
            grade = %assessment.grade,
            score = assessment.overall_score,
            status = %assessment.status,
            "assessment committed"
        );

        Ok(assessment)
    }
}
