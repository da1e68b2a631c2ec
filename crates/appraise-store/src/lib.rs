//! Appraise persistence layer.
//!
//! SQLite-backed storage for assessments, step results and feedback.
//!
//! Guarantees:
//! - Versioned schema with in-order migrations applied on open; a store
//!   with a newer-than-supported schema refuses to operate.
//! - Commits are atomic across the assessment row and all of its step
//!   rows, serialised through a single writer; WAL journaling keeps
//!   history reads non-blocking while a commit is in flight.
//! - Retention pruning deletes dependents (feedback, step rows) before
//!   their owning assessments and reclaims freed space.

mod error;
pub mod fakes;
mod migrations;
mod store;

pub use error::StoreError;
pub use migrations::{Migrator, SCHEMA_VERSION};
pub use store::{AssessmentStore, AssessmentSummary, PruneReport, SqliteStore};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
