//! Scoring engine: metric normalization, weight renormalization, grading.
//!
//! Consumes the step results of one pipeline run and produces the overall
//! score and letter grade. Dimensions whose step is skipped or failed
//! contribute nothing; the remaining weights are rescaled to sum to 1.0.
//! Degraded dimensions contribute their (possibly neutral) score at full
//! renormalized weight: degradation is a fallback value, not a gap.

use tracing::debug;

use crate::domain::config::{AssessConfig, Deductions};
use crate::domain::step::{RawMetric, StepResult, StepStatus};
use crate::domain::{AssessError, Grade, GradeThresholds};

/// Outcome of scoring one step sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    /// Weighted score in [0, 100].
    pub overall_score: f64,

    pub grade: Grade,
}

/// Normalize a raw metric onto the 0-100 scale.
///
/// Returns `None` when the metric carries no signal (zero mutants, no
/// analyzable files); the caller re-tags such steps as skipped.
pub fn normalize(metric: &RawMetric, deductions: &Deductions) -> Option<f64> {
    let score = match metric {
        RawMetric::Mutation { total: 0, .. } => return None,
        RawMetric::Mutation { killed, total, .. } => *killed as f64 / *total as f64 * 100.0,

        RawMetric::Static { file_count: 0, .. } => return None,
        RawMetric::Static {
            weighted_issues,
            file_count,
            ..
        } => {
            let per_file = weighted_issues / *file_count as f64;
            100.0 - (per_file * deductions.static_issue_scale).min(100.0)
        }

        RawMetric::Baseline { flaky, total, .. } => {
            let rate = if *total == 0 {
                0.0
            } else {
                *flaky as f64 / *total as f64
            };
            100.0 - rate * 100.0
        }

        RawMetric::Risk { signal, .. } => 100.0 - signal.clamp(0.0, 1.0) * 100.0,

        // A file with no known historical partners does not penalize.
        RawMetric::Cochange { expected: 0, .. } => 100.0,
        RawMetric::Cochange { covered, expected } => {
            *covered as f64 / *expected as f64 * 100.0
        }
    };
    Some(score.clamp(0.0, 100.0))
}

/// Grade for a score: highest letter whose threshold the score meets or
/// exceeds, scanned high to low. Boundaries are closed above.
pub fn grade_for(score: f64, thresholds: &GradeThresholds) -> Grade {
    if score >= thresholds.a {
        Grade::A
    } else if score >= thresholds.b {
        Grade::B
    } else if score >= thresholds.c {
        Grade::C
    } else if score >= thresholds.d {
        Grade::D
    } else {
        Grade::F
    }
}

/// Score a full step sequence in place.
///
/// Writes each scorable step's normalized score back into it, re-tags
/// no-signal steps as skipped, and combines the rest under renormalized
/// weights. Fails with [`AssessError::NoScorableDimensions`] when nothing
/// is left to grade.
pub fn score_steps(
    steps: &mut [StepResult],
    config: &AssessConfig,
) -> crate::domain::Result<ScoreSummary> {
    for step in steps.iter_mut() {
        if !step.status.is_scorable() {
            continue;
        }
        match step.metric.as_ref().and_then(|m| normalize(m, &config.deductions)) {
            Some(score) => step.score = Some(score),
            None => {
                debug!(dimension = %step.dimension, "no signal, treating step as skipped");
                step.status = StepStatus::Skipped;
                step.score = None;
            }
        }
    }

    let weight_sum: f64 = steps
        .iter()
        .filter(|s| s.status.is_scorable())
        .map(|s| config.weights.get(s.dimension))
        .sum();

    if weight_sum <= 0.0 {
        return Err(AssessError::NoScorableDimensions);
    }

    let overall: f64 = steps
        .iter()
        .filter(|s| s.status.is_scorable())
        .filter_map(|s| {
            s.score
                .map(|score| score * config.weights.get(s.dimension) / weight_sum)
        })
        .sum();

    let overall_score = overall.clamp(0.0, 100.0);
    let grade = grade_for(overall_score, &config.thresholds);

    Ok(ScoreSummary {
        overall_score,
        grade,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::step::Dimension;

    fn all_ok_steps() -> Vec<StepResult> {
        vec![
            StepResult::ok(
                Dimension::Baseline,
                RawMetric::Baseline {
                    flaky: 0,
                    total: 20,
                    runs: 3,
                },
                10,
            ),
            StepResult::ok(
                Dimension::Mutation,
                RawMetric::Mutation {
                    killed: 8,
                    total: 10,
                    timed_out_files: 0,
                },
                10,
            ),
            StepResult::ok(
                Dimension::Static,
                RawMetric::Static {
                    weighted_issues: 0.0,
                    issue_count: 0,
                    file_count: 2,
                },
                10,
            ),
            StepResult::ok(
                Dimension::Risk,
                RawMetric::Risk {
                    signal: 0.0,
                    hot_files: 0,
                    pitfalls: 0,
                },
                10,
            ),
            StepResult::ok(
                Dimension::Cochange,
                RawMetric::Cochange {
                    covered: 4,
                    expected: 4,
                },
                10,
            ),
        ]
    }

    #[test]
    fn test_mutation_normalization() {
        let score = normalize(
            &RawMetric::Mutation {
                killed: 8,
                total: 10,
                timed_out_files: 0,
            },
            &Deductions::default(),
        );
        assert_eq!(score, Some(80.0));
    }

    #[test]
    fn test_mutation_zero_total_has_no_signal() {
        let score = normalize(
            &RawMetric::Mutation {
                killed: 0,
                total: 0,
                timed_out_files: 1,
            },
            &Deductions::default(),
        );
        assert_eq!(score, None);
    }

    #[test]
    fn test_static_normalization_weighted_per_file() {
        // 6 weighted issues over 2 files at scale 10 -> 100 - 30 = 70
        let score = normalize(
            &RawMetric::Static {
                weighted_issues: 6.0,
                issue_count: 4,
                file_count: 2,
            },
            &Deductions::default(),
        );
        assert_eq!(score, Some(70.0));
    }

    #[test]
    fn test_static_deduction_capped_at_zero() {
        let score = normalize(
            &RawMetric::Static {
                weighted_issues: 500.0,
                issue_count: 100,
                file_count: 1,
            },
            &Deductions::default(),
        );
        assert_eq!(score, Some(0.0));
    }

    #[test]
    fn test_baseline_normalization_is_flaky_rate() {
        let score = normalize(
            &RawMetric::Baseline {
                flaky: 1,
                total: 4,
                runs: 3,
            },
            &Deductions::default(),
        );
        assert_eq!(score, Some(75.0));
    }

    #[test]
    fn test_risk_normalization_clamps_signal() {
        let deductions = Deductions::default();
        assert_eq!(
            normalize(
                &RawMetric::Risk {
                    signal: 0.25,
                    hot_files: 1,
                    pitfalls: 0
                },
                &deductions
            ),
            Some(75.0)
        );
        assert_eq!(
            normalize(
                &RawMetric::Risk {
                    signal: 7.5,
                    hot_files: 9,
                    pitfalls: 9
                },
                &deductions
            ),
            Some(0.0)
        );
    }

    #[test]
    fn test_cochange_without_partners_does_not_penalize() {
        let score = normalize(
            &RawMetric::Cochange {
                covered: 0,
                expected: 0,
            },
            &Deductions::default(),
        );
        assert_eq!(score, Some(100.0));
    }

    #[test]
    fn test_grade_boundaries_closed_above() {
        let t = GradeThresholds::default();
        assert_eq!(grade_for(90.0, &t), Grade::A);
        assert_eq!(grade_for(89.999, &t), Grade::B);
        assert_eq!(grade_for(75.0, &t), Grade::B);
        assert_eq!(grade_for(60.0, &t), Grade::C);
        assert_eq!(grade_for(40.0, &t), Grade::D);
        assert_eq!(grade_for(39.999, &t), Grade::F);
        assert_eq!(grade_for(0.0, &t), Grade::F);
    }

    #[test]
    fn test_mutation_contributes_weighted_points() {
        // All five dimensions present: mutation 80 at weight 0.30
        // contributes 24 points; everything else is 100.
        let config = AssessConfig::default();
        let mut steps = all_ok_steps();
        let summary = score_steps(&mut steps, &config).expect("scoring");
        let expected = 24.0 + (1.0 - 0.30) * 100.0;
        assert!((summary.overall_score - expected).abs() < 1e-9);
        assert_eq!(summary.grade, Grade::A);
    }

    #[test]
    fn test_zero_mutants_excluded_and_weights_rescaled() {
        let config = AssessConfig::default();
        let mut steps = all_ok_steps();
        steps[1] = StepResult::ok(
            Dimension::Mutation,
            RawMetric::Mutation {
                killed: 0,
                total: 0,
                timed_out_files: 0,
            },
            10,
        );
        // Make one remaining dimension imperfect so rescaling is visible.
        steps[4] = StepResult::ok(
            Dimension::Cochange,
            RawMetric::Cochange {
                covered: 1,
                expected: 2,
            },
            10,
        );

        let summary = score_steps(&mut steps, &config).expect("scoring");

        assert_eq!(steps[1].status, StepStatus::Skipped);
        // Remaining weights {static .20, baseline .15, risk .20, cochange .15}
        // rescale over 0.70; cochange at 50 pulls the total down by its
        // renormalized share.
        let cochange_weight = 0.15 / 0.70;
        let expected = 100.0 - cochange_weight * 50.0;
        assert!((summary.overall_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_renormalized_weights_sum_to_one() {
        let config = AssessConfig::default();
        // Drop two dimensions; the included weights divided by their sum
        // must always rebuild a full weighting.
        let mut steps = all_ok_steps();
        steps[0] = StepResult::skipped(Dimension::Baseline);
        steps[3] = StepResult::failed(Dimension::Risk, "tool crashed", 5);

        score_steps(&mut steps, &config).expect("scoring");

        let weight_sum: f64 = steps
            .iter()
            .filter(|s| s.status.is_scorable())
            .map(|s| config.weights.get(s.dimension))
            .sum();
        let renormalized: f64 = steps
            .iter()
            .filter(|s| s.status.is_scorable())
            .map(|s| config.weights.get(s.dimension) / weight_sum)
            .sum();
        assert!((renormalized - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_degraded_contributes_neutral_score() {
        let config = AssessConfig::default();
        let mut steps = all_ok_steps();
        steps[3] = StepResult::degraded(
            Dimension::Risk,
            RawMetric::Risk {
                signal: 0.0,
                hot_files: 0,
                pitfalls: 0,
            },
            "knowledge db missing",
            5,
        );

        let summary = score_steps(&mut steps, &config).expect("scoring");

        // The degraded risk step scores its neutral 100 at full weight, so
        // the total matches the all-ok run.
        assert_eq!(steps[3].score, Some(100.0));
        let expected = 24.0 + (1.0 - 0.30) * 100.0;
        assert!((summary.overall_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_all_dimensions_unavailable_is_fatal() {
        let config = AssessConfig::default();
        let mut steps: Vec<StepResult> = Dimension::PIPELINE_ORDER
            .iter()
            .map(|d| StepResult::skipped(*d))
            .collect();
        steps[2] = StepResult::failed(Dimension::Static, "tool missing", 3);

        assert!(matches!(
            score_steps(&mut steps, &config),
            Err(AssessError::NoScorableDimensions)
        ));
    }

    #[test]
    fn test_failed_step_keeps_error_and_no_score() {
        let config = AssessConfig::default();
        let mut steps = all_ok_steps();
        steps[2] = StepResult::failed(Dimension::Static, "linter exited 2", 7);

        score_steps(&mut steps, &config).expect("scoring");

        assert_eq!(steps[2].score, None);
        assert_eq!(steps[2].error.as_deref(), Some("linter exited 2"));
    }
}
