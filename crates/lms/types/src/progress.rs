//! Derived progress views.
//!
//! Nothing here is persisted as a source of truth. Records are recomputed
//! from a [`ProjectSnapshot`] every time they are read.

use crate::{ProjectId, Submission, Task, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consistent view of a project's current tasks and the active submissions
/// made against them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project_id: ProjectId,
    /// Current tasks in listing order.
    pub tasks: Vec<Task>,
    /// Active (highest-attempt) submission per (student, task), restricted to
    /// the tasks above. Orphaned submissions never appear here.
    pub active_submissions: Vec<Submission>,
}

/// Completion state of one student on one project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub student_id: UserId,
    pub project_id: ProjectId,
    pub total_tasks: u32,
    pub approved_tasks: u32,
    /// `approved / total * 100`, rounded to two decimals; `0` when there are no tasks.
    pub completion_percentage: f64,
    pub last_submission_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn new(
        student_id: UserId,
        project_id: ProjectId,
        total_tasks: u32,
        approved_tasks: u32,
        last_submission_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            student_id,
            project_id,
            total_tasks,
            approved_tasks,
            completion_percentage: completion_percentage(approved_tasks, total_tasks),
            last_submission_at,
        }
    }

    /// Number of current tasks not yet approved.
    pub fn unapproved_tasks(&self) -> u32 {
        self.total_tasks.saturating_sub(self.approved_tasks)
    }

    /// Eligibility follows directly from the counts.
    pub fn eligibility(&self) -> Eligibility {
        if self.total_tasks == 0 {
            Eligibility::NotEligible(IneligibilityReason::NoTasksDefined)
        } else if self.approved_tasks < self.total_tasks {
            Eligibility::NotEligible(IneligibilityReason::IncompleteTasks {
                unapproved: self.unapproved_tasks(),
            })
        } else {
            Eligibility::Eligible
        }
    }
}

/// Percentage of approved tasks, rounded half away from zero to two decimals.
pub fn completion_percentage(approved: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = f64::from(approved.min(total)) / f64::from(total) * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Whether a student may be issued a certificate for a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    NotEligible(IneligibilityReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IneligibilityReason {
    NoTasksDefined,
    IncompleteTasks { unapproved: u32 },
}

impl std::fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoTasksDefined => f.write_str("the project has no tasks"),
            Self::IncompleteTasks { unapproved } => {
                write!(f, "{unapproved} task(s) not yet approved")
            }
        }
    }
}

/// Dashboard figures for a student.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSummary {
    pub student_id: UserId,
    pub assigned_projects: u32,
    pub approved_tasks: u32,
    pub certificates: u32,
}

/// Dashboard figures for a mentor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorSummary {
    pub mentor_id: UserId,
    pub projects: u32,
    pub assigned_students: u32,
    pub pending_reviews: u32,
}
