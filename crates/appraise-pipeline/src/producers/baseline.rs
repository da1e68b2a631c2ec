//! Flakiness baseline: run the test suite N times unmutated and flag
//! tests whose pass/fail outcome disagrees across runs.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use appraise_core::{AssessConfig, ChangeSet, Dimension, RawMetric, StepResult};

use crate::exec::run_command;
use crate::producer::{SignalProducer, StepError};

/// Repeated-run flaky-test detector.
pub struct BaselineProducer;

#[async_trait]
impl SignalProducer for BaselineProducer {
    fn dimension(&self) -> Dimension {
        Dimension::Baseline
    }

    async fn produce(
        &self,
        change: &ChangeSet,
        config: &AssessConfig,
        cancel: &CancellationToken,
    ) -> Result<StepResult, StepError> {
        let start = Instant::now();
        let runs = config.baseline_runs;

        let mut failure_sets: Vec<BTreeSet<String>> = Vec::with_capacity(runs as usize);
        let mut max_total = 0u64;

        for run in 0..runs {
            if cancel.is_cancelled() {
                return Err(StepError::Cancelled);
            }
            // A failing suite exits non-zero; that is a signal, not a
            // producer failure. Spawn errors and timeouts still propagate.
            let out = run_command(
                &config.tools.test,
                change.repo(),
                config.timeouts.baseline_run_secs,
                cancel,
            )
            .await?;

            let failures = parse_failures(&out.stdout);
            debug!(run, failures = failures.len(), "baseline run finished");
            if let Some(total) = parse_total(&out.stdout) {
                max_total = max_total.max(total);
            }
            failure_sets.push(failures);
        }

        let mut seen: BTreeMap<&String, u32> = BTreeMap::new();
        for set in &failure_sets {
            for id in set {
                *seen.entry(id).or_insert(0) += 1;
            }
        }
        let flaky = seen
            .values()
            .filter(|count| **count > 0 && **count < runs)
            .count() as u64;

        // When the runner prints no summary line, the distinct failing
        // tests are the only population we can reason about.
        let total = max_total.max(seen.len() as u64);

        Ok(StepResult::ok(
            Dimension::Baseline,
            RawMetric::Baseline {
                flaky,
                total,
                runs,
            },
            start.elapsed().as_millis() as u64,
        ))
    }
}

/// Extract failing test ids from runner output.
///
/// Handles both `path::test FAILED` (pytest -v) and
/// `test name ... FAILED` (libtest) line shapes.
fn parse_failures(output: &str) -> BTreeSet<String> {
    let mut failures = BTreeSet::new();
    for line in output.lines() {
        let line = line.trim();
        // The libtest summary line also says FAILED but names no test.
        if line.starts_with("test result:") {
            continue;
        }
        let Some(idx) = line.find(" FAILED") else {
            continue;
        };
        let mut id = line[..idx].trim();
        if let Some(rest) = id.strip_prefix("test ") {
            id = rest;
        }
        if let Some(rest) = id.strip_suffix("...") {
            id = rest.trim_end();
        }
        if !id.is_empty() && !id.starts_with('=') {
            failures.insert(id.to_string());
        }
    }
    failures
}

/// Total executed tests from a summary line: the sum of `N passed` and
/// `N failed` counts, tolerating the `;`/`,` punctuation both pytest and
/// libtest attach.
fn parse_total(output: &str) -> Option<u64> {
    let mut best: Option<u64> = None;
    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let mut passed = None;
        let mut failed = None;
        for pair in tokens.windows(2) {
            let word = pair[1].trim_matches(|c| c == ',' || c == ';' || c == '.');
            if word == "passed" {
                passed = pair[0].parse::<u64>().ok();
            } else if word == "failed" {
                failed = pair[0].parse::<u64>().ok();
            }
        }
        if passed.is_some() || failed.is_some() {
            let total = passed.unwrap_or(0) + failed.unwrap_or(0);
            best = Some(best.map_or(total, |b| b.max(total)));
        }
    }
    best
}
