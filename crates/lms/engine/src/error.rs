//! Error types for engine operations.

use lms_storage::StorageError;
use lms_types::{IneligibilityReason, ProjectId, ReviewState, SubmissionId, UserId};

/// Kind of entity a lookup failed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Task,
    Submission,
    Certificate,
    User,
    /// A (student, project) assignment.
    Enrollment,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Project => "project",
            Self::Task => "task",
            Self::Submission => "submission",
            Self::Certificate => "certificate",
            Self::User => "user",
            Self::Enrollment => "enrollment",
        };
        f.write_str(name)
    }
}

/// Errors returned by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum LmsError {
    #[error("invalid `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("{actor} is not allowed to {action}")]
    Forbidden { actor: UserId, action: &'static str },

    #[error("submission {submission_id} is {state}: {reason}")]
    InvalidState {
        submission_id: SubmissionId,
        state: ReviewState,
        reason: String,
    },

    #[error("student {student_id} is not eligible for a certificate on project {project_id}: {reason}")]
    NotEligible {
        student_id: UserId,
        project_id: ProjectId,
        reason: IneligibilityReason,
    },

    #[error("certificate already issued to student {student_id} for project {project_id}")]
    AlreadyIssued {
        student_id: UserId,
        project_id: ProjectId,
    },

    #[error("certificate rendering failed: {reason}")]
    RenderingFailed { reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl LmsError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: EntityKind, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn forbidden(actor: &UserId, action: &'static str) -> Self {
        Self::Forbidden {
            actor: actor.clone(),
            action,
        }
    }

    /// Whether the caller may simply retry the same request.
    ///
    /// Rendering failures never leave state behind. Backend faults are
    /// treated as transient; every other error is a decision.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RenderingFailed { .. } | Self::Storage(StorageError::Backend(_))
        )
    }
}

/// Result type alias for engine operations.
pub type LmsResult<T> = Result<T, LmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_entity_and_constraint() {
        let err = LmsError::not_found(EntityKind::Task, "t-1");
        assert_eq!(err.to_string(), "task not found: t-1");

        let err = LmsError::NotEligible {
            student_id: UserId::new("s"),
            project_id: ProjectId::new("p"),
            reason: IneligibilityReason::IncompleteTasks { unapproved: 2 },
        };
        assert!(err.to_string().ends_with("2 task(s) not yet approved"));
    }

    #[test]
    fn only_rendering_and_backend_faults_are_retryable() {
        assert!(LmsError::RenderingFailed {
            reason: "timeout".into()
        }
        .is_retryable());
        assert!(LmsError::Storage(StorageError::Backend("io".into())).is_retryable());
        assert!(!LmsError::Storage(StorageError::Conflict("dup".into())).is_retryable());
        assert!(!LmsError::AlreadyIssued {
            student_id: UserId::new("s"),
            project_id: ProjectId::new("p"),
        }
        .is_retryable());
    }
}
