//! Authorization predicates supplied by the caller.
//!
//! The engine never decides *who* a mentor is. It asks an [`AccessPolicy`]
//! and turns a `false` into [`LmsError::Forbidden`].

use crate::error::{LmsError, LmsResult};
use async_trait::async_trait;
use lms_storage::{ProjectDirectory, StorageResult};
use lms_types::{ProjectId, UserId};
use std::sync::Arc;

/// Role predicates over (user, project).
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn is_project_mentor(&self, user_id: &UserId, project_id: &ProjectId)
        -> StorageResult<bool>;

    async fn is_assigned_student(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> StorageResult<bool>;
}

/// Answers role questions from the project directory records.
pub struct DirectoryAccessPolicy<D: ?Sized> {
    directory: Arc<D>,
}

impl<D: ProjectDirectory + ?Sized> DirectoryAccessPolicy<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl<D: ProjectDirectory + ?Sized> AccessPolicy for DirectoryAccessPolicy<D> {
    async fn is_project_mentor(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> StorageResult<bool> {
        Ok(self
            .directory
            .get_project(project_id)
            .await?
            .map(|project| project.is_mentor(user_id))
            .unwrap_or(false))
    }

    async fn is_assigned_student(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> StorageResult<bool> {
        Ok(self
            .directory
            .get_project(project_id)
            .await?
            .map(|project| project.is_assigned(user_id))
            .unwrap_or(false))
    }
}

/// Fail unless `actor` mentors `project_id`.
pub(crate) async fn require_mentor(
    access: &dyn AccessPolicy,
    actor: &UserId,
    project_id: &ProjectId,
    action: &'static str,
) -> LmsResult<()> {
    if access.is_project_mentor(actor, project_id).await? {
        Ok(())
    } else {
        Err(LmsError::forbidden(actor, action))
    }
}

/// Fail unless `actor` may read `student_id`'s data on `project_id`:
/// either the student themself, or the project mentor.
pub(crate) async fn require_student_reader(
    access: &dyn AccessPolicy,
    actor: &UserId,
    student_id: &UserId,
    project_id: &ProjectId,
    action: &'static str,
) -> LmsResult<()> {
    if actor == student_id && access.is_assigned_student(actor, project_id).await? {
        return Ok(());
    }
    require_mentor(access, actor, project_id, action).await
}

/// Fail unless `student_id` is assigned to `project_id`.
pub(crate) async fn require_enrollment(
    access: &dyn AccessPolicy,
    student_id: &UserId,
    project_id: &ProjectId,
) -> LmsResult<()> {
    if access.is_assigned_student(student_id, project_id).await? {
        Ok(())
    } else {
        Err(LmsError::not_found(
            crate::error::EntityKind::Enrollment,
            format!("{student_id}@{project_id}"),
        ))
    }
}
