//! Assessment storage trait and SQLite implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use appraise_core::{
    Assessment, AssessmentId, AssessmentStatus, Dimension, Feedback, FeedbackOutcome, Grade,
    RawMetric, StepResult, StepStatus,
};

use crate::migrations::Migrator;
use crate::{Result, StoreError};

/// Summary row returned by history listings.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentSummary {
    pub id: AssessmentId,
    pub repo: String,
    pub overall_score: f64,
    pub grade: Grade,
    pub status: AssessmentStatus,
    pub file_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Rows removed by one retention prune, per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PruneReport {
    pub assessments: usize,
    pub step_results: usize,
    pub feedback: usize,
}

impl PruneReport {
    pub fn total(&self) -> usize {
        self.assessments + self.step_results + self.feedback
    }
}

/// Durable assessment storage.
///
/// Guarantees:
/// - `commit` is atomic across the assessment and all of its step rows.
/// - Committed assessments are immutable; later context arrives only via
///   `attach_feedback`.
/// - Listings are ordered most recent first, ties stable by insertion.
pub trait AssessmentStore: Send + Sync {
    /// Durably commit one assessment. Fatal on failure; an assessment
    /// that cannot be recorded must not be reported as successful.
    fn commit(&self, assessment: &Assessment) -> Result<AssessmentId>;

    /// Fetch a full assessment by id.
    fn get(&self, id: &AssessmentId) -> Result<Option<Assessment>>;

    /// List assessment summaries, optionally restricted to one repo.
    fn list(&self, repo: Option<&str>, limit: usize, offset: usize)
        -> Result<Vec<AssessmentSummary>>;

    /// Append feedback to an existing assessment.
    fn attach_feedback(&self, feedback: &Feedback) -> Result<()>;

    /// Feedback attached to an assessment, newest first.
    fn list_feedback(&self, id: &AssessmentId) -> Result<Vec<Feedback>>;

    /// Delete assessments (and dependents) created before the cutoff.
    fn prune(&self, older_than: DateTime<Utc>) -> Result<PruneReport>;
}

/// SQLite-backed assessment store.
///
/// The `Mutex` serialises the single writer; WAL journaling lets history
/// reads proceed while a commit is in flight.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path` and apply pending migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        info!(path = %path.display(), "assessment store opened");
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        Migrator::new(&conn).migrate()
    }
}

fn ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{}': {}", value, e)))
}

fn parse_grade(value: &str) -> Result<Grade> {
    Grade::parse(value).ok_or_else(|| StoreError::Corrupt(format!("unknown grade '{}'", value)))
}

fn parse_status(value: &str) -> Result<AssessmentStatus> {
    AssessmentStatus::parse(value)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown status '{}'", value)))
}

impl AssessmentStore for SqliteStore {
    fn commit(&self, assessment: &Assessment) -> Result<AssessmentId> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO assessments
             (id, repo, ref_before, ref_after, files, overall_score, grade, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                assessment.id.as_str(),
                assessment.repo,
                assessment.ref_before,
                assessment.ref_after,
                serde_json::to_string(&assessment.files)?,
                assessment.overall_score,
                assessment.grade.name(),
                assessment.status.name(),
                ts(&assessment.created_at),
            ],
        )?;

        for step in &assessment.steps {
            let metric = step
                .metric
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            tx.execute(
                "INSERT INTO step_results
                 (assessment_id, dimension, status, metric, score, error, duration_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    assessment.id.as_str(),
                    step.dimension.name(),
                    step.status.name(),
                    metric,
                    step.score,
                    step.error,
                    step.duration_ms as i64,
                ],
            )?;
        }

        tx.commit()?;
        debug!(id = %assessment.id, steps = assessment.steps.len(), "assessment committed");
        Ok(assessment.id.clone())
    }

    fn get(&self, id: &AssessmentId) -> Result<Option<Assessment>> {
        let conn = self.conn.lock().unwrap();

        let header = conn
            .query_row(
                "SELECT id, repo, ref_before, ref_after, files, overall_score, grade, status, created_at
                 FROM assessments WHERE id = ?1",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, repo, ref_before, ref_after, files, overall_score, grade, status, created_at)) =
            header
        else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT dimension, status, metric, score, error, duration_ms
             FROM step_results WHERE assessment_id = ?1 ORDER BY id",
        )?;
        let steps = stmt
            .query_map([&id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let steps = steps
            .into_iter()
            .map(|(dimension, status, metric, score, error, duration_ms)| {
                let dimension = Dimension::parse(&dimension)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown dimension '{}'", dimension)))?;
                let status = StepStatus::parse(&status)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown step status '{}'", status)))?;
                let metric: Option<RawMetric> =
                    metric.as_deref().map(serde_json::from_str).transpose()?;
                Ok(StepResult {
                    dimension,
                    status,
                    metric,
                    score,
                    error,
                    duration_ms: duration_ms as u64,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Assessment {
            id: AssessmentId(id),
            repo,
            ref_before,
            ref_after,
            files: serde_json::from_str(&files)?,
            created_at: parse_ts(&created_at)?,
            steps,
            overall_score,
            grade: parse_grade(&grade)?,
            status: parse_status(&status)?,
        }))
    }

    fn list(
        &self,
        repo: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AssessmentSummary>> {
        let conn = self.conn.lock().unwrap();

        let (sql, repo_param) = match repo {
            Some(r) => (
                "SELECT id, repo, overall_score, grade, status, created_at, files
                 FROM assessments WHERE repo = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                Some(r),
            ),
            None => (
                "SELECT id, repo, overall_score, grade, status, created_at, files
                 FROM assessments
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2",
                None,
            ),
        };

        let mut stmt = conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        };
        let rows = match repo_param {
            Some(r) => stmt
                .query_map(params![r, limit as i64, offset as i64], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map(params![limit as i64, offset as i64], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };

        rows.into_iter()
            .map(|(id, repo, overall_score, grade, status, created_at, files)| {
                let files: Vec<String> = serde_json::from_str(&files)?;
                Ok(AssessmentSummary {
                    id: AssessmentId(id),
                    repo,
                    overall_score,
                    grade: parse_grade(&grade)?,
                    status: parse_status(&status)?,
                    file_count: files.len() as u64,
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect()
    }

    fn attach_feedback(&self, feedback: &Feedback) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM assessments WHERE id = ?1",
                [feedback.assessment_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound {
                id: feedback.assessment_id.as_str().to_string(),
            });
        }

        conn.execute(
            "INSERT INTO feedback (assessment_id, outcome, context, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                feedback.assessment_id.as_str(),
                feedback.outcome.name(),
                feedback.context,
                ts(&feedback.created_at),
            ],
        )?;
        Ok(())
    }

    fn list_feedback(&self, id: &AssessmentId) -> Result<Vec<Feedback>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT outcome, context, created_at FROM feedback
             WHERE assessment_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(outcome, context, created_at)| {
                let outcome = FeedbackOutcome::parse(&outcome)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown outcome '{}'", outcome)))?;
                Ok(Feedback {
                    assessment_id: id.clone(),
                    outcome,
                    context: context.unwrap_or_default(),
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect()
    }

    fn prune(&self, older_than: DateTime<Utc>) -> Result<PruneReport> {
        let cutoff = ts(&older_than);
        let mut report = PruneReport::default();

        {
            let mut conn = self.conn.lock().unwrap();
            let tx = conn.transaction()?;

            // Dependents first, owners last.
            report.feedback = tx.execute(
                "DELETE FROM feedback WHERE assessment_id IN
                 (SELECT id FROM assessments WHERE created_at < ?1)",
                [&cutoff],
            )?;
            report.step_results = tx.execute(
                "DELETE FROM step_results WHERE assessment_id IN
                 (SELECT id FROM assessments WHERE created_at < ?1)",
                [&cutoff],
            )?;
            report.assessments =
                tx.execute("DELETE FROM assessments WHERE created_at < ?1", [&cutoff])?;

            tx.commit()?;

            if report.total() > 0 {
                // Reclaim freed pages; VACUUM cannot run inside the
                // transaction above.
                tx_vacuum(&conn)?;
            }
        }

        info!(
            assessments = report.assessments,
            step_results = report.step_results,
            feedback = report.feedback,
            cutoff = %cutoff,
            "retention prune complete"
        );
        Ok(report)
    }
}

fn tx_vacuum(conn: &Connection) -> Result<()> {
    conn.execute_batch("VACUUM;")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Summary decoding helpers are exercised through the public trait in
    // tests/store_contract.rs; only the timestamp format is unit-tested
    // here because ordering depends on it.
    #[test]
    fn test_timestamp_format_is_sortable() {
        let early = Utc::now();
        let late = early + chrono::Duration::seconds(1);
        assert!(ts(&early) < ts(&late));
        // Round-trips at the stored (microsecond) precision.
        let round_tripped = parse_ts(&ts(&early)).unwrap();
        assert_eq!(ts(&round_tripped), ts(&early));
    }

    #[test]
    fn test_parse_ts_rejects_garbage() {
        assert!(matches!(parse_ts("yesterday"), Err(StoreError::Corrupt(_))));
    }
}
