//! Appraise pipeline - assessment orchestration
//!
//! Provides the assessment pipeline orchestrator that:
//! - Resolves the changeset between two revisions
//! - Sequences the five signal producers with per-step isolation
//! - Hands results to the scoring engine
//! - Commits the assessment atomically to the persistence store

pub mod exec;
pub mod knowledge;
pub mod orchestrator;
pub mod producer;
pub mod producers;
pub mod resolver;

// Re-export key types
pub use exec::CommandOutput;
pub use knowledge::{
    HotFile, KnowledgeReply, KnowledgeSignals, KnowledgeSource, PitfallHit, SqliteKnowledge,
};
pub use orchestrator::{default_producers, Pipeline, SkipFlags};
pub use producer::{SignalProducer, StepError};
pub use producers::{
    BaselineProducer, CoChangeProducer, MutationProducer, RiskProducer, StaticProducer,
};
pub use resolver::{ChangeResolver, GitResolver, ResolveError};
