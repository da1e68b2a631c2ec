//! Contract tests for the SQLite assessment store.

use chrono::{Duration, Utc};

use appraise_core::{
    Assessment, AssessmentId, AssessmentStatus, Dimension, Feedback, FeedbackOutcome, Grade,
    RawMetric, StepResult,
};
use appraise_store::{AssessmentStore, SqliteStore, StoreError};

fn assessment(repo: &str, age_days: i64, score: f64) -> Assessment {
    let mut baseline = StepResult::ok(
        Dimension::Baseline,
        RawMetric::Baseline {
            flaky: 0,
            total: 12,
            runs: 3,
        },
        1500,
    );
    baseline.score = Some(100.0);

    let mut mutation = StepResult::ok(
        Dimension::Mutation,
        RawMetric::Mutation {
            killed: 8,
            total: 10,
            timed_out_files: 1,
        },
        9000,
    );
    mutation.score = Some(80.0);

    let failed = StepResult::failed(Dimension::Static, "linter exited 2", 40);

    let steps = vec![baseline, mutation, failed];
    Assessment {
        id: AssessmentId::new(),
        repo: repo.to_string(),
        ref_before: Some("abc123".to_string()),
        ref_after: Some("def456".to_string()),
        files: vec!["src/a.py".to_string(), "src/b.py".to_string()],
        created_at: Utc::now() - Duration::days(age_days),
        status: AssessmentStatus::from_steps(&steps),
        steps,
        overall_score: score,
        grade: Grade::B,
    }
}

#[test]
fn test_commit_and_get_round_trip() {
    let store = SqliteStore::open_in_memory().expect("open");
    let original = assessment("/repo/one", 0, 82.5);

    let id = store.commit(&original).expect("commit");
    let fetched = store.get(&id).expect("get").expect("present");

    assert_eq!(fetched.id, original.id);
    assert_eq!(fetched.repo, original.repo);
    assert_eq!(fetched.files, original.files);
    assert_eq!(fetched.overall_score, original.overall_score);
    assert_eq!(fetched.grade, original.grade);
    assert_eq!(fetched.status, AssessmentStatus::Partial);
    assert_eq!(fetched.steps.len(), 3);
    assert_eq!(fetched.steps[0].dimension, Dimension::Baseline);
    assert_eq!(
        fetched.steps[1].metric,
        Some(RawMetric::Mutation {
            killed: 8,
            total: 10,
            timed_out_files: 1,
        })
    );
    assert_eq!(fetched.steps[2].error.as_deref(), Some("linter exited 2"));
}

#[test]
fn test_get_unknown_id_is_none() {
    let store = SqliteStore::open_in_memory().expect("open");
    let missing = store.get(&AssessmentId::new()).expect("get");
    assert!(missing.is_none());
}

#[test]
fn test_duplicate_commit_rolls_back_completely() {
    let store = SqliteStore::open_in_memory().expect("open");
    let original = assessment("/repo/one", 0, 82.5);

    store.commit(&original).expect("first commit");
    let err = store.commit(&original).expect_err("duplicate id must fail");
    assert!(matches!(err, StoreError::Sqlite(_)));

    // The failed commit must not leave extra step rows behind.
    let fetched = store.get(&original.id).expect("get").expect("present");
    assert_eq!(fetched.steps.len(), 3);
}

#[test]
fn test_list_orders_most_recent_first() {
    let store = SqliteStore::open_in_memory().expect("open");
    let old = assessment("/repo/one", 5, 60.0);
    let newer = assessment("/repo/one", 1, 70.0);
    let newest = assessment("/repo/one", 0, 80.0);
    store.commit(&old).expect("commit");
    store.commit(&newest).expect("commit");
    store.commit(&newer).expect("commit");

    let rows = store.list(None, 10, 0).expect("list");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].id, newest.id);
    assert_eq!(rows[1].id, newer.id);
    assert_eq!(rows[2].id, old.id);
    assert_eq!(rows[0].file_count, 2);
}

#[test]
fn test_list_ties_stable_by_insertion_order() {
    let store = SqliteStore::open_in_memory().expect("open");
    let first = assessment("/repo/one", 0, 60.0);
    let mut second = assessment("/repo/one", 0, 70.0);
    second.created_at = first.created_at;
    store.commit(&first).expect("commit");
    store.commit(&second).expect("commit");

    let rows = store.list(None, 10, 0).expect("list");
    assert_eq!(rows[0].id, second.id, "later insert wins the tie");
    assert_eq!(rows[1].id, first.id);
}

#[test]
fn test_list_filters_by_repo_and_paginates() {
    let store = SqliteStore::open_in_memory().expect("open");
    for day in 0..4 {
        store
            .commit(&assessment("/repo/one", day, 50.0))
            .expect("commit");
    }
    store
        .commit(&assessment("/repo/other", 0, 90.0))
        .expect("commit");

    let all_one = store.list(Some("/repo/one"), 10, 0).expect("list");
    assert_eq!(all_one.len(), 4);
    assert!(all_one.iter().all(|s| s.repo == "/repo/one"));

    let page = store.list(Some("/repo/one"), 2, 1).expect("list");
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, all_one[1].id);
    assert_eq!(page[1].id, all_one[2].id);
}

#[test]
fn test_feedback_round_trip() {
    let store = SqliteStore::open_in_memory().expect("open");
    let a = assessment("/repo/one", 0, 82.5);
    store.commit(&a).expect("commit");

    let fb = Feedback {
        assessment_id: a.id.clone(),
        outcome: FeedbackOutcome::Rejected,
        context: "broke the release build".to_string(),
        created_at: Utc::now(),
    };
    store.attach_feedback(&fb).expect("attach");

    let rows = store.list_feedback(&a.id).expect("list_feedback");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].outcome, FeedbackOutcome::Rejected);
    assert_eq!(rows[0].context, "broke the release build");
}

#[test]
fn test_feedback_for_unknown_assessment_is_not_found() {
    let store = SqliteStore::open_in_memory().expect("open");
    let fb = Feedback {
        assessment_id: AssessmentId::new(),
        outcome: FeedbackOutcome::Accepted,
        context: String::new(),
        created_at: Utc::now(),
    };
    let err = store.attach_feedback(&fb).expect_err("must not attach");
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn test_prune_removes_only_older_rows_and_dependents() {
    let store = SqliteStore::open_in_memory().expect("open");
    let old = assessment("/repo/one", 120, 55.0);
    let recent = assessment("/repo/one", 3, 88.0);
    store.commit(&old).expect("commit");
    store.commit(&recent).expect("commit");
    store
        .attach_feedback(&Feedback {
            assessment_id: old.id.clone(),
            outcome: FeedbackOutcome::Modified,
            context: "tweaked".to_string(),
            created_at: old.created_at,
        })
        .expect("attach");

    let cutoff = Utc::now() - Duration::days(90);
    let report = store.prune(cutoff).expect("prune");

    assert_eq!(report.assessments, 1);
    assert_eq!(report.step_results, 3);
    assert_eq!(report.feedback, 1);

    assert!(store.get(&old.id).expect("get").is_none());
    assert!(store.get(&recent.id).expect("get").is_some());

    // Second prune in a row deletes nothing.
    let again = store.prune(cutoff).expect("prune");
    assert_eq!(again.total(), 0);
}

#[test]
fn test_reopen_preserves_rows_and_schema() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("appraise.db");

    let a = assessment("/repo/one", 0, 82.5);
    {
        let store = SqliteStore::open(&db_path).expect("open");
        store.commit(&a).expect("commit");
    }

    // Reopen: migrations re-run as a no-op, rows survive.
    let store = SqliteStore::open(&db_path).expect("reopen");
    let fetched = store.get(&a.id).expect("get").expect("present");
    assert_eq!(fetched.overall_score, 82.5);
    assert_eq!(fetched.steps.len(), 3);
}
