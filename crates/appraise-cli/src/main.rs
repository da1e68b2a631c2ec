//! Appraise - change assessment CLI
//!
//! The `appraise` command grades a code change by running it through the
//! assessment pipeline and persisting the result.
//!
//! ## Commands
//!
//! - `assess`: Run the full pipeline over a revision range
//! - `history`: Show past assessments for a repository
//! - `feedback`: Attach an outcome to a past assessment
//! - `prune`: Delete assessments older than the retention window

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Level};

use appraise_core::{init_tracing, Assessment, AssessmentId, Feedback, FeedbackOutcome};
use appraise_pipeline::{Pipeline, SkipFlags};
use appraise_store::{AssessmentStore, SqliteStore};

#[derive(Parser)]
#[command(name = "appraise")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grade code changes through a multi-signal assessment pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full assessment on a revision range
    Assess {
        /// Path to the repository
        #[arg(default_value = ".")]
        repo: PathBuf,

        /// Revision before the change
        #[arg(short = 'b', long)]
        ref_before: Option<String>,

        /// Revision after the change
        #[arg(short = 'a', long)]
        ref_after: Option<String>,

        /// Skip the flakiness baseline
        #[arg(long)]
        skip_baseline: bool,

        /// Skip mutation testing
        #[arg(long)]
        skip_mutation: bool,

        /// Skip static analysis
        #[arg(long)]
        skip_static: bool,

        /// Skip historical risk
        #[arg(long)]
        skip_risk: bool,

        /// Skip co-change coverage
        #[arg(long)]
        skip_cochange: bool,

        /// Print the assessment as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show past assessments, most recent first
    History {
        /// Path to the repository
        #[arg(default_value = ".")]
        repo: PathBuf,

        /// Maximum number of rows to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Rows to skip
        #[arg(short, long, default_value = "0")]
        offset: usize,
    },

    /// Attach feedback to a past assessment
    Feedback {
        /// Assessment ID (full or short form shown by `history`)
        assessment_id: String,

        /// Outcome: accepted, rejected, or modified
        outcome: String,

        /// Optional explanation
        #[arg(short, long, default_value = "")]
        context: String,

        /// Path to the repository
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,
    },

    /// Delete assessments older than the retention window
    Prune {
        /// Path to the repository
        #[arg(default_value = ".")]
        repo: PathBuf,

        /// Override the configured retention window
        #[arg(long)]
        older_than_days: Option<u32>,
    },
}

fn open_store(repo: &std::path::Path) -> Result<Arc<SqliteStore>> {
    let db_path = repo.join(".appraise").join("appraise.db");
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.log_json, level);

    match cli.command {
        Commands::Assess {
            repo,
            ref_before,
            ref_after,
            skip_baseline,
            skip_mutation,
            skip_static,
            skip_risk,
            skip_cochange,
            json,
        } => {
            let repo = repo
                .canonicalize()
                .with_context(|| format!("repository not found: {}", repo.display()))?;
            let cfg = config::load(&repo)?;
            let store = open_store(&repo)?;
            let pipeline = Pipeline::new(store);

            let skip = SkipFlags {
                baseline: skip_baseline,
                mutation: skip_mutation,
                statics: skip_static,
                risk: skip_risk,
                cochange: skip_cochange,
            };

            // Ctrl-C aborts the in-flight assessment without a commit.
            let cancel = CancellationToken::new();
            let signal_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    debug!("interrupt received, cancelling assessment");
                    signal_token.cancel();
                }
            });

            let assessment = pipeline
                .assess(
                    &repo,
                    ref_before.as_deref(),
                    ref_after.as_deref(),
                    &cfg,
                    &skip,
                    &cancel,
                )
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&assessment)?);
            } else {
                print_assessment(&assessment);
            }
        }

        Commands::History {
            repo,
            limit,
            offset,
        } => {
            let repo = repo
                .canonicalize()
                .with_context(|| format!("repository not found: {}", repo.display()))?;
            let store = open_store(&repo)?;
            let rows = store.list(Some(&repo.display().to_string()), limit, offset)?;

            if rows.is_empty() {
                println!("No assessments found.");
                return Ok(());
            }

            println!(
                "{:<10} {:>5} {:>7} {:>9} {:>6}  {}",
                "ID", "GRADE", "SCORE", "STATUS", "FILES", "CREATED"
            );
            for row in rows {
                println!(
                    "{:<10} {:>5} {:>7.1} {:>9} {:>6}  {}",
                    row.id.short(),
                    row.grade.name(),
                    row.overall_score,
                    row.status.name(),
                    row.file_count,
                    row.created_at.format("%Y-%m-%d %H:%M:%S"),
                );
            }
        }

        Commands::Feedback {
            assessment_id,
            outcome,
            context,
            repo,
        } => {
            let Some(outcome) = FeedbackOutcome::parse(&outcome) else {
                bail!(
                    "invalid outcome '{}': must be accepted, rejected, or modified",
                    outcome
                );
            };
            let repo = repo
                .canonicalize()
                .with_context(|| format!("repository not found: {}", repo.display()))?;
            let store = open_store(&repo)?;

            let id = resolve_assessment_id(store.as_ref(), &repo, &assessment_id)?;
            store.attach_feedback(&Feedback {
                assessment_id: id.clone(),
                outcome,
                context,
                created_at: Utc::now(),
            })?;
            println!("Feedback recorded: {} for {}", outcome, id.short());
        }

        Commands::Prune {
            repo,
            older_than_days,
        } => {
            let repo = repo
                .canonicalize()
                .with_context(|| format!("repository not found: {}", repo.display()))?;
            let cfg = config::load(&repo)?;
            let store = open_store(&repo)?;

            let days = older_than_days.unwrap_or(cfg.retention_days);
            let cutoff = Utc::now() - Duration::days(days as i64);
            let report = store.prune(cutoff)?;
            println!(
                "Pruned {} assessment(s), {} step result(s), {} feedback row(s) older than {} days.",
                report.assessments, report.step_results, report.feedback, days
            );
        }
    }

    Ok(())
}

/// Accept either a full assessment id or the short prefix from `history`.
fn resolve_assessment_id(
    store: &dyn AssessmentStore,
    repo: &std::path::Path,
    needle: &str,
) -> Result<AssessmentId> {
    let id = AssessmentId(needle.to_string());
    if store.get(&id)?.is_some() {
        return Ok(id);
    }

    let matches: Vec<AssessmentId> = store
        .list(Some(&repo.display().to_string()), 500, 0)?
        .into_iter()
        .map(|s| s.id)
        .filter(|s| s.as_str().starts_with(needle))
        .collect();
    match matches.as_slice() {
        [] => bail!("assessment '{}' not found", needle),
        [only] => Ok(only.clone()),
        many => bail!(
            "assessment id '{}' is ambiguous ({} matches)",
            needle,
            many.len()
        ),
    }
}

fn print_assessment(assessment: &Assessment) {
    println!(
        "Grade {} ({:.1}/100) | {} | {} file(s) changed",
        assessment.grade,
        assessment.overall_score,
        assessment.status,
        assessment.files.len()
    );
    println!();
    println!(
        "{:<10} {:>9} {:>7}  {}",
        "DIMENSION", "STATUS", "SCORE", "DETAIL"
    );
    for step in &assessment.steps {
        let score = step
            .score
            .map(|s| format!("{:.1}", s))
            .unwrap_or_else(|| "-".to_string());
        let detail = step.error.as_deref().unwrap_or("");
        println!(
            "{:<10} {:>9} {:>7}  {}",
            step.dimension.name(),
            step.status.name(),
            score,
            detail
        );
    }
    println!();
    println!("ID: {}", assessment.id);
}
