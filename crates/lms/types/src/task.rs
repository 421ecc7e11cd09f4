//! Tasks: the units of work a project is made of.

use crate::{ProjectId, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A task belonging to exactly one project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    /// Explicit ordering key. Weighted tasks sort before unweighted ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    /// The mentor who authored the task.
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a fresh task record from a creation request.
    pub fn from_request(request: NewTask, owner_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::generate(),
            project_id: request.project_id,
            title: request.title.trim().to_string(),
            description: request.description,
            weight: request.weight,
            deadline: request.deadline,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update. Fields left as `None` in the patch are untouched.
    pub fn apply_patch(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(weight) = patch.weight {
            self.weight = weight;
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = deadline;
        }
        self.updated_at = now;
    }

    /// Whether a submission made at `at` is past this task's deadline.
    pub fn is_late(&self, at: DateTime<Utc>) -> bool {
        self.deadline.map(|deadline| at > deadline).unwrap_or(false)
    }

    /// Listing order: weighted tasks first by ascending weight, then the rest
    /// by creation time. Ties fall back to the id so the order is total.
    pub fn listing_order(a: &Task, b: &Task) -> Ordering {
        let key = |task: &Task| (task.weight.is_none(), task.weight, task.created_at);
        key(a).cmp(&key(b)).then_with(|| a.id.cmp(&b.id))
    }
}

/// Sort tasks into their stable listing order in place.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(Task::listing_order);
}

/// Request to create a task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Partial update of a task's mutable fields.
///
/// `weight` and `deadline` are doubly optional: `Some(None)` clears the value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub weight: Option<Option<u32>>,
    #[serde(default)]
    pub deadline: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.weight.is_none()
            && self.deadline.is_none()
    }
}
