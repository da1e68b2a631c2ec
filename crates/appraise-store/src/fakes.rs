//! In-memory fake for the storage trait (testing only).
//!
//! `MemoryStore` satisfies the [`AssessmentStore`] contract without
//! touching disk, including listing order and dependency-ordered pruning.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use appraise_core::{Assessment, AssessmentId, Feedback};

use crate::store::{AssessmentStore, AssessmentSummary, PruneReport};
use crate::{Result, StoreError};

/// In-memory assessment store backed by plain vectors.
#[derive(Debug, Default)]
pub struct MemoryStore {
    assessments: Mutex<Vec<Assessment>>,
    feedback: Mutex<Vec<Feedback>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed assessments (test convenience).
    pub fn len(&self) -> usize {
        self.assessments.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssessmentStore for MemoryStore {
    fn commit(&self, assessment: &Assessment) -> Result<AssessmentId> {
        let mut assessments = self.assessments.lock().unwrap();
        if assessments.iter().any(|a| a.id == assessment.id) {
            return Err(StoreError::Corrupt(format!(
                "duplicate assessment id {}",
                assessment.id
            )));
        }
        assessments.push(assessment.clone());
        Ok(assessment.id.clone())
    }

    fn get(&self, id: &AssessmentId) -> Result<Option<Assessment>> {
        let assessments = self.assessments.lock().unwrap();
        Ok(assessments.iter().find(|a| &a.id == id).cloned())
    }

    fn list(
        &self,
        repo: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AssessmentSummary>> {
        let assessments = self.assessments.lock().unwrap();
        let mut rows: Vec<(usize, &Assessment)> = assessments
            .iter()
            .enumerate()
            .filter(|(_, a)| repo.map_or(true, |r| a.repo == r))
            .collect();
        // Most recent first; ties resolved by insertion order, later first.
        rows.sort_by(|(ia, a), (ib, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| ib.cmp(ia))
        });

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, a)| AssessmentSummary {
                id: a.id.clone(),
                repo: a.repo.clone(),
                overall_score: a.overall_score,
                grade: a.grade,
                status: a.status,
                file_count: a.files.len() as u64,
                created_at: a.created_at,
            })
            .collect())
    }

    fn attach_feedback(&self, feedback: &Feedback) -> Result<()> {
        let assessments = self.assessments.lock().unwrap();
        if !assessments
            .iter()
            .any(|a| a.id == feedback.assessment_id)
        {
            return Err(StoreError::NotFound {
                id: feedback.assessment_id.as_str().to_string(),
            });
        }
        drop(assessments);
        self.feedback.lock().unwrap().push(feedback.clone());
        Ok(())
    }

    fn list_feedback(&self, id: &AssessmentId) -> Result<Vec<Feedback>> {
        let feedback = self.feedback.lock().unwrap();
        let mut rows: Vec<Feedback> = feedback
            .iter()
            .filter(|f| &f.assessment_id == id)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }

    fn prune(&self, older_than: DateTime<Utc>) -> Result<PruneReport> {
        let mut assessments = self.assessments.lock().unwrap();
        let mut feedback = self.feedback.lock().unwrap();

        let doomed: Vec<AssessmentId> = assessments
            .iter()
            .filter(|a| a.created_at < older_than)
            .map(|a| a.id.clone())
            .collect();

        let mut report = PruneReport::default();
        let before_feedback = feedback.len();
        feedback.retain(|f| !doomed.contains(&f.assessment_id));
        report.feedback = before_feedback - feedback.len();

        report.step_results = assessments
            .iter()
            .filter(|a| doomed.contains(&a.id))
            .map(|a| a.steps.len())
            .sum();

        let before = assessments.len();
        assessments.retain(|a| !doomed.contains(&a.id));
        report.assessments = before - assessments.len();

        Ok(report)
    }
}
