use crate::{ProjectId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What the engine needs to know about an externally owned project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub title: String,
    /// Name of the subject category the project is filed under.
    pub category_name: String,
    pub mentor_id: UserId,
    #[serde(default)]
    pub assigned_students: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn new(
        id: ProjectId,
        title: impl Into<String>,
        category_name: impl Into<String>,
        mentor_id: UserId,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            category_name: category_name.into(),
            mentor_id,
            assigned_students: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_student(mut self, student_id: UserId) -> Self {
        self.assigned_students.insert(student_id);
        self
    }

    pub fn is_mentor(&self, user_id: &UserId) -> bool {
        &self.mentor_id == user_id
    }

    pub fn is_assigned(&self, user_id: &UserId) -> bool {
        self.assigned_students.contains(user_id)
    }
}
