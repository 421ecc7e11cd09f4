//! Progress aggregation.
//!
//! Progress is never stored. Every read takes a [`ProjectSnapshot`] from the
//! store and folds it with [`aggregate`], which is a pure function: the same
//! snapshot always yields the same record.

use crate::access::{require_enrollment, require_mentor, require_student_reader, AccessPolicy};
use crate::error::{EntityKind, LmsError, LmsResult};
use lms_storage::LmsStorage;
use lms_types::{ProgressRecord, ProjectId, ProjectRecord, ProjectSnapshot, UserId};
use std::collections::HashSet;
use std::sync::Arc;

/// Fold one student's active submissions in `snapshot` into a progress record.
///
/// Only submissions against tasks present in the snapshot are counted.
pub fn aggregate(student_id: &UserId, snapshot: &ProjectSnapshot) -> ProgressRecord {
    let task_ids: HashSet<_> = snapshot.tasks.iter().map(|task| &task.id).collect();
    let active = snapshot
        .active_submissions
        .iter()
        .filter(|submission| &submission.student_id == student_id)
        .filter(|submission| task_ids.contains(&submission.task_id));

    let mut approved = 0u32;
    let mut last_submission_at = None;
    for submission in active {
        if submission.is_approved() {
            approved += 1;
        }
        last_submission_at = last_submission_at.max(Some(submission.submitted_at));
    }

    ProgressRecord::new(
        student_id.clone(),
        snapshot.project_id.clone(),
        u32::try_from(snapshot.tasks.len()).unwrap_or(u32::MAX),
        approved,
        last_submission_at,
    )
}

/// Computes progress records on demand.
#[derive(Clone)]
pub struct ProgressAggregator {
    storage: Arc<dyn LmsStorage>,
    access: Arc<dyn AccessPolicy>,
}

impl ProgressAggregator {
    pub fn new(storage: Arc<dyn LmsStorage>, access: Arc<dyn AccessPolicy>) -> Self {
        Self { storage, access }
    }

    /// Progress of one student on one project.
    pub async fn compute_progress(
        &self,
        actor: &UserId,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<ProgressRecord> {
        self.project(project_id).await?;
        require_student_reader(
            self.access.as_ref(),
            actor,
            student_id,
            project_id,
            "view progress on this project",
        )
        .await?;
        require_enrollment(self.access.as_ref(), student_id, project_id).await?;

        self.progress_of(student_id, project_id).await
    }

    /// Progress of `student_id` without any access check. Callers must have
    /// authorized the read already.
    pub(crate) async fn progress_of(
        &self,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<ProgressRecord> {
        let snapshot = self
            .storage
            .project_snapshot(project_id, Some(student_id))
            .await?;
        Ok(aggregate(student_id, &snapshot))
    }

    /// One record per assigned student, including students with no submissions.
    ///
    /// With a project, the actor must mentor it. Without one, the overview
    /// spans every project the actor mentors, ordered by project then student.
    pub async fn compute_overview(
        &self,
        actor: &UserId,
        project_id: Option<&ProjectId>,
    ) -> LmsResult<Vec<ProgressRecord>> {
        let projects = match project_id {
            Some(project_id) => {
                let project = self.project(project_id).await?;
                require_mentor(
                    self.access.as_ref(),
                    actor,
                    project_id,
                    "view the progress overview of this project",
                )
                .await?;
                vec![project]
            }
            None => {
                let mut mentored = Vec::new();
                for project in self.storage.list_projects().await? {
                    if self.access.is_project_mentor(actor, &project.id).await? {
                        mentored.push(project);
                    }
                }
                mentored
            }
        };

        let mut records = Vec::new();
        for project in &projects {
            let snapshot = self.storage.project_snapshot(&project.id, None).await?;
            records.extend(
                project
                    .assigned_students
                    .iter()
                    .map(|student_id| aggregate(student_id, &snapshot)),
            );
        }

        tracing::debug!(
            actor = %actor,
            projects = projects.len(),
            records = records.len(),
            "progress overview computed"
        );
        Ok(records)
    }

    async fn project(&self, project_id: &ProjectId) -> LmsResult<ProjectRecord> {
        self.storage
            .get_project(project_id)
            .await?
            .ok_or_else(|| LmsError::not_found(EntityKind::Project, project_id))
    }
}
