//! Task registry: owns the set of tasks belonging to each project.

use crate::access::{require_mentor, AccessPolicy};
use crate::error::{EntityKind, LmsError, LmsResult};
use chrono::Utc;
use lms_storage::{LmsStorage, StorageError};
use lms_types::{NewTask, ProjectId, Task, TaskId, TaskPatch, UserId};
use std::sync::Arc;

/// Create, edit, remove, and list the tasks of a project.
#[derive(Clone)]
pub struct TaskRegistry {
    storage: Arc<dyn LmsStorage>,
    access: Arc<dyn AccessPolicy>,
}

impl TaskRegistry {
    pub fn new(storage: Arc<dyn LmsStorage>, access: Arc<dyn AccessPolicy>) -> Self {
        Self { storage, access }
    }

    /// Create a task on a project the actor mentors.
    pub async fn create_task(&self, actor: &UserId, request: NewTask) -> LmsResult<Task> {
        validate_title(&request.title)?;

        if self.storage.get_project(&request.project_id).await?.is_none() {
            return Err(LmsError::validation(
                "project_id",
                format!("project {} does not exist", request.project_id),
            ));
        }
        require_mentor(
            self.access.as_ref(),
            actor,
            &request.project_id,
            "create tasks on this project",
        )
        .await?;

        let task = Task::from_request(request, actor.clone(), Utc::now());
        self.storage.insert_task(task.clone()).await?;

        tracing::info!(
            task_id = %task.id,
            project_id = %task.project_id,
            mentor_id = %actor,
            "task created"
        );
        Ok(task)
    }

    /// Apply a partial update to a task the actor owns.
    pub async fn update_task(
        &self,
        actor: &UserId,
        task_id: &TaskId,
        patch: TaskPatch,
    ) -> LmsResult<Task> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }

        let mut task = self.owned_task(actor, task_id, "update this task").await?;
        if patch.is_empty() {
            return Ok(task);
        }

        task.apply_patch(patch, Utc::now());
        self.storage
            .update_task(task.clone())
            .await
            .map_err(|e| task_not_found(e, task_id))?;

        tracing::info!(task_id = %task.id, project_id = %task.project_id, "task updated");
        Ok(task)
    }

    /// Hard-delete a task the actor owns. Its submissions stay in history
    /// but stop counting towards progress.
    pub async fn delete_task(&self, actor: &UserId, task_id: &TaskId) -> LmsResult<()> {
        let task = self.owned_task(actor, task_id, "delete this task").await?;
        self.storage
            .delete_task(task_id)
            .await
            .map_err(|e| task_not_found(e, task_id))?;

        tracing::info!(task_id = %task.id, project_id = %task.project_id, "task deleted");
        Ok(())
    }

    /// Tasks of a project in listing order. Visible to the mentor and assigned students.
    pub async fn list_tasks_for_project(
        &self,
        actor: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<Vec<Task>> {
        if self.storage.get_project(project_id).await?.is_none() {
            return Err(LmsError::not_found(EntityKind::Project, project_id));
        }
        let visible = self.access.is_project_mentor(actor, project_id).await?
            || self.access.is_assigned_student(actor, project_id).await?;
        if !visible {
            return Err(LmsError::forbidden(actor, "view tasks of this project"));
        }

        Ok(self.storage.list_tasks(project_id).await?)
    }

    async fn owned_task(
        &self,
        actor: &UserId,
        task_id: &TaskId,
        action: &'static str,
    ) -> LmsResult<Task> {
        let task = self
            .storage
            .get_task(task_id)
            .await?
            .ok_or_else(|| LmsError::not_found(EntityKind::Task, task_id))?;

        if &task.owner_id != actor {
            return Err(LmsError::forbidden(actor, action));
        }
        require_mentor(self.access.as_ref(), actor, &task.project_id, action).await?;
        Ok(task)
    }
}

fn validate_title(title: &str) -> LmsResult<()> {
    if title.trim().is_empty() {
        return Err(LmsError::validation("title", "must not be blank"));
    }
    Ok(())
}

fn task_not_found(err: StorageError, task_id: &TaskId) -> LmsError {
    match err {
        StorageError::NotFound(_) => LmsError::not_found(EntityKind::Task, task_id),
        other => other.into(),
    }
}
