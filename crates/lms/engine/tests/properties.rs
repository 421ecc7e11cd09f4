//! Property tests: progress and eligibility laws.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::*;
use lms_engine::aggregate;
use lms_types::{
    Eligibility, IneligibilityReason, NewTask, ProjectId, ProjectSnapshot, ReviewDecision,
    ReviewState, Submission, SubmissionId, SubmissionPayload, Task, TaskId, UserId,
};
use proptest::prelude::*;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_state() -> impl Strategy<Value = ReviewState> {
    prop_oneof![
        Just(ReviewState::Pending),
        Just(ReviewState::Approved),
        Just(ReviewState::Rejected),
    ]
}

fn snapshot_with(states: &[Option<ReviewState>]) -> ProjectSnapshot {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let project_id = ProjectId::new("p");
    let mut tasks = Vec::new();
    let mut active_submissions = Vec::new();
    for (i, state) in states.iter().enumerate() {
        let mut task = Task::from_request(
            NewTask::new(project_id.clone(), format!("task {i}")),
            UserId::new("m"),
            base,
        );
        task.id = TaskId::new(format!("t{i}"));
        if let Some(state) = state {
            active_submissions.push(Submission {
                id: SubmissionId::new(format!("s{i}")),
                student_id: UserId::new("s"),
                task_id: task.id.clone(),
                project_id: project_id.clone(),
                attempt: 1,
                payload: SubmissionPayload::text("x"),
                state: *state,
                grade: None,
                feedback: None,
                late: false,
                submitted_at: base + Duration::minutes(i as i64),
                reviewed_at: None,
                reviewed_by: None,
            });
        }
        tasks.push(task);
    }
    ProjectSnapshot {
        project_id,
        tasks,
        active_submissions,
    }
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Approving all N tasks is 100% and eligible.
    #[test]
    fn all_approved_is_complete(n in 1usize..40) {
        let snapshot = snapshot_with(&vec![Some(ReviewState::Approved); n]);
        let record = aggregate(&UserId::new("s"), &snapshot);
        prop_assert_eq!(record.completion_percentage, 100.0);
        prop_assert_eq!(record.eligibility(), Eligibility::Eligible);
    }

    /// Leaving exactly one task unapproved is never eligible.
    #[test]
    fn one_short_is_not_eligible(
        n in 1usize..40,
        gap in any::<prop::sample::Index>(),
        gap_state in prop_oneof![
            Just(None::<ReviewState>),
            Just(Some(ReviewState::Pending)),
            Just(Some(ReviewState::Rejected)),
        ],
    ) {
        let mut states = vec![Some(ReviewState::Approved); n];
        states[gap.index(n)] = gap_state;
        let record = aggregate(&UserId::new("s"), &snapshot_with(&states));
        prop_assert_eq!(record.approved_tasks as usize, n - 1);
        prop_assert!(record.completion_percentage < 100.0);
        prop_assert_eq!(
            record.eligibility(),
            Eligibility::NotEligible(IneligibilityReason::IncompleteTasks { unapproved: 1 })
        );
    }

    /// Aggregation is a pure function of the snapshot.
    #[test]
    fn aggregation_is_idempotent(states in prop::collection::vec(prop::option::of(arb_state()), 0..30)) {
        let snapshot = snapshot_with(&states);
        let first = aggregate(&UserId::new("s"), &snapshot);
        let second = aggregate(&UserId::new("s"), &snapshot);
        prop_assert_eq!(first.completion_percentage.to_bits(), second.completion_percentage.to_bits());
        prop_assert_eq!(first, second);
    }

    /// Percentage stays within bounds and matches the counts.
    #[test]
    fn percentage_tracks_counts(states in prop::collection::vec(prop::option::of(arb_state()), 0..30)) {
        let record = aggregate(&UserId::new("s"), &snapshot_with(&states));
        let approved = states.iter().filter(|s| **s == Some(ReviewState::Approved)).count();
        prop_assert_eq!(record.total_tasks as usize, states.len());
        prop_assert_eq!(record.approved_tasks as usize, approved);
        prop_assert!((0.0..=100.0).contains(&record.completion_percentage));
        if states.is_empty() {
            prop_assert_eq!(record.completion_percentage, 0.0);
        } else {
            let exact = approved as f64 / states.len() as f64 * 100.0;
            prop_assert!((record.completion_percentage - exact).abs() <= 0.005 + f64::EPSILON);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Through the engine: N of N approved certifies, N-1 of N does not.
    #[test]
    fn engine_eligibility_matches_approvals(n in 1usize..6, approve_all in any::<bool>()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let h = harness(Arc::new(RecordingRenderer::default())).await;
            let tasks = h.add_tasks(n).await;
            let approved = if approve_all { n } else { n - 1 };
            h.approve_all(&student(), &tasks[..approved]).await;
            if !approve_all {
                h.submit_and_review(&student(), &tasks[n - 1], Some(ReviewDecision::Rejected)).await;
            }

            let eligibility = h
                .engine
                .check_eligibility(&mentor(), &student(), &project())
                .await
                .unwrap();
            let issued = h
                .engine
                .issue_certificate(&mentor(), &student(), &project())
                .await;
            assert_eq!(eligibility.is_eligible(), approve_all);
            assert_eq!(issued.is_ok(), approve_all);
        });
    }
}
