//! Submissions and their review lifecycle.
//!
//! ```text
//! submit ──▶ Pending ──review(approve)──▶ Approved
//!               │
//!               └────review(reject)────▶ Rejected
//! ```
//!
//! Both outcomes are terminal for that submission instance. A new attempt
//! starts again at `Pending` and becomes the active submission for its
//! (student, task) pair.

use crate::{ProjectId, SubmissionId, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review state of one submission instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Pending,
    Approved,
    Rejected,
}

impl ReviewState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A mentor's verdict on a pending submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl From<ReviewDecision> for ReviewState {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Approved => ReviewState::Approved,
            ReviewDecision::Rejected => ReviewState::Rejected,
        }
    }
}

/// Submitted work. Opaque to the engine beyond "something was handed in".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Reference to a file held by the external file store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<String>,
}

impl SubmissionPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file_ref: None,
        }
    }

    pub fn file(file_ref: impl Into<String>) -> Self {
        Self {
            text: None,
            file_ref: Some(file_ref.into()),
        }
    }

    pub fn is_blank(&self) -> bool {
        let blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(|v| v.trim().is_empty())
                .unwrap_or(true)
        };
        blank(&self.text) && blank(&self.file_ref)
    }
}

/// One attempt by a student at a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub student_id: UserId,
    pub task_id: TaskId,
    /// Project of the task at submission time.
    pub project_id: ProjectId,
    /// 1-based position in the (student, task) history. The highest attempt is active.
    pub attempt: u32,
    pub payload: SubmissionPayload,
    pub state: ReviewState,
    /// Only set once the submission is reviewed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Submitted after the task deadline.
    #[serde(default)]
    pub late: bool,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<UserId>,
}

impl Submission {
    pub fn is_pending(&self) -> bool {
        self.state == ReviewState::Pending
    }

    pub fn is_approved(&self) -> bool {
        self.state == ReviewState::Approved
    }

    /// Build the stored record for a freshly appended attempt.
    pub fn from_new(new: NewSubmission, attempt: u32) -> Self {
        Self {
            id: new.id,
            student_id: new.student_id,
            task_id: new.task_id,
            project_id: new.project_id,
            attempt,
            payload: new.payload,
            state: ReviewState::Pending,
            grade: None,
            feedback: None,
            late: new.late,
            submitted_at: new.submitted_at,
            reviewed_at: None,
            reviewed_by: None,
        }
    }

    /// Record a review outcome on this submission.
    pub fn apply_review(&mut self, outcome: &ReviewOutcome) {
        self.state = outcome.decision.into();
        self.grade = outcome.grade;
        self.feedback = outcome.feedback.clone();
        self.reviewed_at = Some(outcome.reviewed_at);
        self.reviewed_by = Some(outcome.reviewer.clone());
    }
}

/// A submission about to be appended. Storage assigns the attempt number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub id: SubmissionId,
    pub student_id: UserId,
    pub task_id: TaskId,
    pub project_id: ProjectId,
    pub payload: SubmissionPayload,
    pub late: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Validated review result, ready to be applied to a pending submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub decision: ReviewDecision,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub reviewer: UserId,
    pub reviewed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_state_round_trips_through_names() {
        for state in [
            ReviewState::Pending,
            ReviewState::Approved,
            ReviewState::Rejected,
        ] {
            assert_eq!(ReviewState::parse(state.name()), Some(state));
        }
        assert_eq!(ReviewState::parse("graded"), None);
    }

    #[test]
    fn blank_payload_detection() {
        assert!(SubmissionPayload::default().is_blank());
        assert!(SubmissionPayload::text("   ").is_blank());
        assert!(!SubmissionPayload::file("blob://42").is_blank());
    }

    #[test]
    fn applying_review_fills_grade_and_reviewer() {
        let now = Utc::now();
        let mut submission = Submission::from_new(
            NewSubmission {
                id: SubmissionId::new("s1"),
                student_id: UserId::new("stu"),
                task_id: TaskId::new("t1"),
                project_id: ProjectId::new("p1"),
                payload: SubmissionPayload::text("answer"),
                late: false,
                submitted_at: now,
            },
            1,
        );
        assert!(submission.is_pending());
        assert_eq!(submission.grade, None);

        submission.apply_review(&ReviewOutcome {
            decision: ReviewDecision::Approved,
            grade: Some(92.5),
            feedback: Some("solid".into()),
            reviewer: UserId::new("mentor"),
            reviewed_at: now,
        });
        assert!(submission.is_approved());
        assert_eq!(submission.grade, Some(92.5));
        assert_eq!(submission.reviewed_by, Some(UserId::new("mentor")));
    }
}
