//! Submission review state machine.
//!
//! ```text
//! submit ──▶ Pending ──review──▶ Approved | Rejected
//! ```
//!
//! Review is a compare-and-set against the store: the row must still be
//! `Pending` and must still be the active attempt for its (student, task)
//! pair. Of several concurrent reviewers exactly one wins; the others get
//! [`LmsError::InvalidState`].

use crate::access::{require_mentor, require_student_reader, AccessPolicy};
use crate::error::{EntityKind, LmsError, LmsResult};
use chrono::Utc;
use lms_storage::{LmsStorage, StorageError};
use lms_types::{
    GradePolicy, NewSubmission, ProjectId, ReviewDecision, ReviewOutcome, Submission,
    SubmissionId, SubmissionPayload, TaskId, UserId,
};
use std::sync::Arc;

/// Accepts submissions from students and review decisions from mentors.
#[derive(Clone)]
pub struct ReviewStateMachine {
    storage: Arc<dyn LmsStorage>,
    access: Arc<dyn AccessPolicy>,
    grade_policy: GradePolicy,
}

impl ReviewStateMachine {
    pub fn new(
        storage: Arc<dyn LmsStorage>,
        access: Arc<dyn AccessPolicy>,
        grade_policy: GradePolicy,
    ) -> Self {
        Self {
            storage,
            access,
            grade_policy,
        }
    }

    /// Append a new `Pending` attempt. It becomes the active submission for
    /// (actor, task) whatever state the previous attempt was in.
    pub async fn submit(
        &self,
        actor: &UserId,
        task_id: &TaskId,
        payload: SubmissionPayload,
    ) -> LmsResult<Submission> {
        let task = self
            .storage
            .get_task(task_id)
            .await?
            .ok_or_else(|| LmsError::not_found(EntityKind::Task, task_id))?;

        if !self
            .access
            .is_assigned_student(actor, &task.project_id)
            .await?
        {
            return Err(LmsError::forbidden(actor, "submit work for this task"));
        }
        if payload.is_blank() {
            return Err(LmsError::validation(
                "payload",
                "either text or a file reference is required",
            ));
        }

        let now = Utc::now();
        let submission = self
            .storage
            .append_submission(NewSubmission {
                id: SubmissionId::generate(),
                student_id: actor.clone(),
                task_id: task.id.clone(),
                project_id: task.project_id.clone(),
                payload,
                late: task.is_late(now),
                submitted_at: now,
            })
            .await?;

        tracing::info!(
            submission_id = %submission.id,
            student_id = %submission.student_id,
            task_id = %submission.task_id,
            attempt = submission.attempt,
            late = submission.late,
            "submission accepted"
        );
        Ok(submission)
    }

    /// Decide a pending submission. Only the mentor of the task's project may review.
    pub async fn review(
        &self,
        actor: &UserId,
        submission_id: &SubmissionId,
        decision: ReviewDecision,
        grade: Option<f64>,
        feedback: Option<String>,
    ) -> LmsResult<Submission> {
        let submission = self.load_submission(submission_id).await?;
        let task = self
            .storage
            .get_task(&submission.task_id)
            .await?
            .ok_or_else(|| LmsError::not_found(EntityKind::Task, &submission.task_id))?;
        require_mentor(
            self.access.as_ref(),
            actor,
            &task.project_id,
            "review submissions on this project",
        )
        .await?;

        if !submission.is_pending() {
            return Err(LmsError::InvalidState {
                submission_id: submission.id,
                state: submission.state,
                reason: "reviewed submissions cannot be reviewed again".to_string(),
            });
        }
        self.check_grade(decision, grade)?;

        let outcome = ReviewOutcome {
            decision,
            grade,
            feedback: feedback
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            reviewer: actor.clone(),
            reviewed_at: Utc::now(),
        };

        match self.storage.transition_review(submission_id, outcome).await {
            Ok(reviewed) => {
                tracing::info!(
                    submission_id = %reviewed.id,
                    student_id = %reviewed.student_id,
                    task_id = %reviewed.task_id,
                    reviewer = %actor,
                    state = %reviewed.state,
                    "review decided"
                );
                Ok(reviewed)
            }
            Err(StorageError::ReviewTransition(reason)) => {
                let current = self.load_submission(submission_id).await?;
                tracing::warn!(
                    submission_id = %submission_id,
                    reviewer = %actor,
                    state = %current.state,
                    "review rejected: {reason}"
                );
                Err(LmsError::InvalidState {
                    submission_id: current.id,
                    state: current.state,
                    reason,
                })
            }
            Err(StorageError::NotFound(_)) => {
                Err(LmsError::not_found(EntityKind::Submission, submission_id))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// One submission, readable by its author or the project mentor.
    pub async fn get_submission(
        &self,
        actor: &UserId,
        submission_id: &SubmissionId,
    ) -> LmsResult<Submission> {
        let submission = self.load_submission(submission_id).await?;
        require_student_reader(
            self.access.as_ref(),
            actor,
            &submission.student_id,
            &submission.project_id,
            "read this submission",
        )
        .await?;
        Ok(submission)
    }

    /// Every attempt by `student_id` at `task_id`, oldest first.
    ///
    /// History outlives the task: after a delete the attempts stay readable.
    pub async fn submission_history(
        &self,
        actor: &UserId,
        student_id: &UserId,
        task_id: &TaskId,
    ) -> LmsResult<Vec<Submission>> {
        let history = self.storage.list_submissions(student_id, task_id).await?;
        let project_id = match self.storage.get_task(task_id).await? {
            Some(task) => task.project_id,
            None => history
                .first()
                .map(|submission| submission.project_id.clone())
                .ok_or_else(|| LmsError::not_found(EntityKind::Task, task_id))?,
        };
        require_student_reader(
            self.access.as_ref(),
            actor,
            student_id,
            &project_id,
            "read this submission history",
        )
        .await?;
        Ok(history)
    }

    /// Active `Pending` submissions on the project's current tasks, oldest first.
    pub async fn pending_reviews(
        &self,
        actor: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<Vec<Submission>> {
        if self.storage.get_project(project_id).await?.is_none() {
            return Err(LmsError::not_found(EntityKind::Project, project_id));
        }
        require_mentor(
            self.access.as_ref(),
            actor,
            project_id,
            "view the review queue of this project",
        )
        .await?;

        let snapshot = self.storage.project_snapshot(project_id, None).await?;
        let mut pending = snapshot
            .active_submissions
            .into_iter()
            .filter(Submission::is_pending)
            .collect::<Vec<_>>();
        pending.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(pending)
    }

    fn check_grade(&self, decision: ReviewDecision, grade: Option<f64>) -> LmsResult<()> {
        match (decision, grade) {
            (ReviewDecision::Approved, None) => Err(LmsError::validation(
                "grade",
                "a grade is required to approve a submission",
            )),
            (_, Some(grade)) => self
                .grade_policy
                .check(grade)
                .map_err(|reason| LmsError::validation("grade", reason)),
            (ReviewDecision::Rejected, None) => Ok(()),
        }
    }

    async fn load_submission(&self, submission_id: &SubmissionId) -> LmsResult<Submission> {
        self.storage
            .get_submission(submission_id)
            .await?
            .ok_or_else(|| LmsError::not_found(EntityKind::Submission, submission_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::DirectoryAccessPolicy;
    use lms_storage::{InMemoryLmsStorage, ProjectDirectory, TaskStore};
    use lms_types::{NewTask, ProjectRecord, ReviewState, Task};

    struct Fixture {
        storage: Arc<InMemoryLmsStorage>,
        machine: ReviewStateMachine,
        task: Task,
    }

    async fn fixture() -> Fixture {
        let storage = Arc::new(InMemoryLmsStorage::new());
        storage
            .upsert_project(
                ProjectRecord::new(ProjectId::new("p1"), "Rust", "Systems", UserId::new("m1"))
                    .with_student(UserId::new("s1"))
                    .with_student(UserId::new("s2")),
            )
            .await
            .unwrap();
        let task = Task::from_request(
            NewTask::new(ProjectId::new("p1"), "Ownership"),
            UserId::new("m1"),
            Utc::now(),
        );
        storage.insert_task(task.clone()).await.unwrap();
        let access = Arc::new(DirectoryAccessPolicy::new(storage.clone()));
        let machine = ReviewStateMachine::new(storage.clone(), access, GradePolicy::default());
        Fixture {
            storage,
            machine,
            task,
        }
    }

    #[tokio::test]
    async fn submit_then_approve() {
        let f = fixture().await;
        let submission = f
            .machine
            .submit(&UserId::new("s1"), &f.task.id, SubmissionPayload::text("done"))
            .await
            .unwrap();
        assert_eq!(submission.state, ReviewState::Pending);
        assert_eq!(submission.attempt, 1);
        assert!(!submission.late);

        let reviewed = f
            .machine
            .review(
                &UserId::new("m1"),
                &submission.id,
                ReviewDecision::Approved,
                Some(90.0),
                Some("  nice  ".into()),
            )
            .await
            .unwrap();
        assert_eq!(reviewed.state, ReviewState::Approved);
        assert_eq!(reviewed.grade, Some(90.0));
        assert_eq!(reviewed.feedback.as_deref(), Some("nice"));
        assert_eq!(reviewed.reviewed_by, Some(UserId::new("m1")));
    }

    #[tokio::test]
    async fn unassigned_students_cannot_submit() {
        let f = fixture().await;
        let result = f
            .machine
            .submit(&UserId::new("stranger"), &f.task.id, SubmissionPayload::text("x"))
            .await;
        assert!(matches!(result, Err(LmsError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn blank_payload_is_rejected() {
        let f = fixture().await;
        let result = f
            .machine
            .submit(&UserId::new("s1"), &f.task.id, SubmissionPayload::text("   "))
            .await;
        assert!(matches!(
            result,
            Err(LmsError::Validation {
                field: "payload",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn late_submissions_are_flagged() {
        let f = fixture().await;
        let mut task = f.task.clone();
        task.deadline = Some(Utc::now() - chrono::Duration::hours(1));
        f.storage.update_task(task).await.unwrap();

        let submission = f
            .machine
            .submit(&UserId::new("s1"), &f.task.id, SubmissionPayload::file("files/1"))
            .await
            .unwrap();
        assert!(submission.late);
    }

    #[tokio::test]
    async fn approval_requires_a_grade_in_range() {
        let f = fixture().await;
        let submission = f
            .machine
            .submit(&UserId::new("s1"), &f.task.id, SubmissionPayload::text("x"))
            .await
            .unwrap();
        for grade in [None, Some(-1.0), Some(100.5)] {
            let result = f
                .machine
                .review(
                    &UserId::new("m1"),
                    &submission.id,
                    ReviewDecision::Approved,
                    grade,
                    None,
                )
                .await;
            assert!(matches!(
                result,
                Err(LmsError::Validation { field: "grade", .. })
            ));
        }

        let rejected = f
            .machine
            .review(
                &UserId::new("m1"),
                &submission.id,
                ReviewDecision::Rejected,
                None,
                Some("   ".into()),
            )
            .await
            .unwrap();
        assert_eq!(rejected.state, ReviewState::Rejected);
        assert_eq!(rejected.feedback, None);
    }

    #[tokio::test]
    async fn terminal_submissions_cannot_be_reviewed_again() {
        let f = fixture().await;
        let submission = f
            .machine
            .submit(&UserId::new("s1"), &f.task.id, SubmissionPayload::text("x"))
            .await
            .unwrap();
        f.machine
            .review(
                &UserId::new("m1"),
                &submission.id,
                ReviewDecision::Rejected,
                None,
                None,
            )
            .await
            .unwrap();

        for decision in [ReviewDecision::Approved, ReviewDecision::Rejected] {
            let result = f
                .machine
                .review(&UserId::new("m1"), &submission.id, decision, Some(50.0), None)
                .await;
            assert!(matches!(
                result,
                Err(LmsError::InvalidState {
                    state: ReviewState::Rejected,
                    ..
                })
            ));
        }
    }

    #[tokio::test]
    async fn superseded_pending_attempt_is_not_reviewable() {
        let f = fixture().await;
        let student = UserId::new("s1");
        let first = f
            .machine
            .submit(&student, &f.task.id, SubmissionPayload::text("v1"))
            .await
            .unwrap();
        let second = f
            .machine
            .submit(&student, &f.task.id, SubmissionPayload::text("v2"))
            .await
            .unwrap();
        assert_eq!(second.attempt, 2);

        let result = f
            .machine
            .review(
                &UserId::new("m1"),
                &first.id,
                ReviewDecision::Approved,
                Some(80.0),
                None,
            )
            .await;
        assert!(matches!(
            result,
            Err(LmsError::InvalidState {
                state: ReviewState::Pending,
                ..
            })
        ));

        let history = f
            .machine
            .submission_history(&student, &student, &f.task.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn students_only_see_their_own_submissions() {
        let f = fixture().await;
        let submission = f
            .machine
            .submit(&UserId::new("s1"), &f.task.id, SubmissionPayload::text("x"))
            .await
            .unwrap();
        assert!(f
            .machine
            .get_submission(&UserId::new("m1"), &submission.id)
            .await
            .is_ok());
        let result = f
            .machine
            .get_submission(&UserId::new("s2"), &submission.id)
            .await;
        assert!(matches!(result, Err(LmsError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn review_against_deleted_task_is_not_found() {
        let f = fixture().await;
        let submission = f
            .machine
            .submit(&UserId::new("s1"), &f.task.id, SubmissionPayload::text("x"))
            .await
            .unwrap();
        f.storage.delete_task(&f.task.id).await.unwrap();

        let result = f
            .machine
            .review(
                &UserId::new("m1"),
                &submission.id,
                ReviewDecision::Approved,
                Some(70.0),
                None,
            )
            .await;
        assert!(matches!(
            result,
            Err(LmsError::NotFound {
                entity: EntityKind::Task,
                ..
            })
        ));

        let history = f
            .machine
            .submission_history(&UserId::new("s1"), &UserId::new("s1"), &f.task.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn review_queue_lists_active_pending_oldest_first() {
        let f = fixture().await;
        let a = f
            .machine
            .submit(&UserId::new("s1"), &f.task.id, SubmissionPayload::text("a"))
            .await
            .unwrap();
        let b = f
            .machine
            .submit(&UserId::new("s2"), &f.task.id, SubmissionPayload::text("b"))
            .await
            .unwrap();

        let queue = f
            .machine
            .pending_reviews(&UserId::new("m1"), &ProjectId::new("p1"))
            .await
            .unwrap();
        assert_eq!(queue.len(), 2);
        assert!(queue[0].submitted_at <= queue[1].submitted_at);
        assert!(queue.iter().any(|s| s.id == a.id));
        assert!(queue.iter().any(|s| s.id == b.id));

        let result = f
            .machine
            .pending_reviews(&UserId::new("s1"), &ProjectId::new("p1"))
            .await;
        assert!(matches!(result, Err(LmsError::Forbidden { .. })));
    }
}
