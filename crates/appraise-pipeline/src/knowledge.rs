//! Historical-knowledge collaborator boundary.
//!
//! Pure data adapter: fetches hot-file, pitfall and co-change signals for
//! a changeset. All scoring lives in the producers. Availability is an
//! explicit reply state, so "the store said there is no risk" is never
//! conflated with "the store could not be consulted".

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use appraise_core::{AssessConfig, ChangeSet};

/// Hot-file record for a changed file.
#[derive(Debug, Clone, PartialEq)]
pub struct HotFile {
    pub path: String,
    pub churn_score: f64,
}

/// A known pitfall matched against a changed file.
#[derive(Debug, Clone, PartialEq)]
pub struct PitfallHit {
    pub path: String,
    pub severity: String,
}

/// Signals fetched for one changeset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeSignals {
    pub hot_files: Vec<HotFile>,
    pub pitfalls: Vec<PitfallHit>,

    /// Historical co-change partners per changed file.
    pub partners: BTreeMap<String, BTreeSet<String>>,
}

/// Reply from a knowledge query.
#[derive(Debug, Clone, PartialEq)]
pub enum KnowledgeReply {
    Available(KnowledgeSignals),

    /// The collaborator could not be consulted; producers degrade to a
    /// neutral signal instead of failing.
    Unavailable { reason: String },
}

/// Source of historical risk and co-change knowledge.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    async fn query(&self, change: &ChangeSet, config: &AssessConfig) -> KnowledgeReply;
}

/// Knowledge source backed by a local SQLite database maintained by an
/// external history-mining tool.
pub struct SqliteKnowledge;

impl SqliteKnowledge {
    pub fn new() -> Self {
        Self
    }

    fn fetch(conn: &Connection, change: &ChangeSet) -> rusqlite::Result<KnowledgeSignals> {
        let mut signals = KnowledgeSignals::default();
        let changed: Vec<String> = change
            .files()
            .iter()
            .map(|f| f.display().to_string())
            .collect();

        let mut hot_stmt =
            conn.prepare("SELECT churn_score FROM hot_files WHERE file_path = ?1")?;
        let mut pitfall_stmt =
            conn.prepare("SELECT severity FROM pitfalls WHERE file_path = ?1")?;
        let mut partner_stmt = conn.prepare(
            "SELECT file_a, file_b FROM co_changes WHERE file_a = ?1 OR file_b = ?1",
        )?;

        for file in &changed {
            if let Some(churn) = hot_stmt
                .query_map([file], |row| row.get::<_, f64>(0))?
                .next()
                .transpose()?
            {
                signals.hot_files.push(HotFile {
                    path: file.clone(),
                    churn_score: churn,
                });
            }

            for severity in pitfall_stmt.query_map([file], |row| row.get::<_, String>(0))? {
                signals.pitfalls.push(PitfallHit {
                    path: file.clone(),
                    severity: severity?,
                });
            }

            let pairs = partner_stmt
                .query_map([file], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (a, b) in pairs {
                let partner = if &a == file { b } else { a };
                if &partner != file {
                    signals
                        .partners
                        .entry(file.clone())
                        .or_default()
                        .insert(partner);
                }
            }
        }

        Ok(signals)
    }
}

impl Default for SqliteKnowledge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeSource for SqliteKnowledge {
    async fn query(&self, change: &ChangeSet, config: &AssessConfig) -> KnowledgeReply {
        let db_path = change.repo().join(&config.tools.knowledge_db);
        if !db_path.exists() {
            return KnowledgeReply::Unavailable {
                reason: format!("knowledge database not found at {}", db_path.display()),
            };
        }

        let conn = match Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        ) {
            Ok(conn) => conn,
            Err(e) => {
                debug!(path = %db_path.display(), error = %e, "knowledge database unreadable");
                return KnowledgeReply::Unavailable {
                    reason: format!("knowledge database unreadable: {}", e),
                };
            }
        };

        match Self::fetch(&conn, change) {
            Ok(signals) => KnowledgeReply::Available(signals),
            // A present-but-incompatible database is still "could not be
            // consulted", not a step failure.
            Err(e) => KnowledgeReply::Unavailable {
                reason: format!("knowledge query failed: {}", e),
            },
        }
    }
}

/// Seed schema for the knowledge database (used by tests and by external
/// tools that populate it).
pub const KNOWLEDGE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS hot_files (
    file_path   TEXT PRIMARY KEY,
    churn_score REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS pitfalls (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    severity  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS co_changes (
    file_a       TEXT NOT NULL,
    file_b       TEXT NOT NULL,
    change_count INTEGER NOT NULL DEFAULT 1
);
";
