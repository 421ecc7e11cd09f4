//! In-memory reference implementation of the storage traits.
//!
//! Deterministic and test-friendly. Locks are always taken in the order
//! tasks → submissions → certificates so multi-collection reads see one
//! consistent view without deadlocking.

use crate::traits::{CertificateStore, ProjectDirectory, SubmissionStore, TaskStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use lms_types::{
    sort_tasks, Certificate, NewSubmission, ProjectId, ProjectRecord, ProjectSnapshot,
    ReviewOutcome, Submission, SubmissionId, Task, TaskId, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// In-memory storage adapter.
#[derive(Default)]
pub struct InMemoryLmsStorage {
    projects: RwLock<HashMap<ProjectId, ProjectRecord>>,
    users: RwLock<HashMap<UserId, String>>,
    tasks: RwLock<HashMap<TaskId, Task>>,
    submissions: RwLock<SubmissionLog>,
    certificates: RwLock<HashMap<(UserId, ProjectId), Certificate>>,
}

#[derive(Default)]
struct SubmissionLog {
    by_id: HashMap<SubmissionId, Submission>,
    /// Attempt order per (student, task). Never rewritten.
    history: HashMap<(UserId, TaskId), Vec<SubmissionId>>,
}

impl SubmissionLog {
    fn active(&self, student_id: &UserId, task_id: &TaskId) -> Option<&Submission> {
        self.history
            .get(&(student_id.clone(), task_id.clone()))
            .and_then(|ids| ids.last())
            .and_then(|id| self.by_id.get(id))
    }
}

impl InMemoryLmsStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(collection: &str) -> StorageError {
    StorageError::Backend(format!("{collection} lock poisoned"))
}

#[async_trait]
impl ProjectDirectory for InMemoryLmsStorage {
    async fn get_project(&self, project_id: &ProjectId) -> StorageResult<Option<ProjectRecord>> {
        let guard = self.projects.read().map_err(|_| poisoned("projects"))?;
        Ok(guard.get(project_id).cloned())
    }

    async fn list_projects(&self) -> StorageResult<Vec<ProjectRecord>> {
        let guard = self.projects.read().map_err(|_| poisoned("projects"))?;
        let mut values = guard.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(values)
    }

    async fn display_name(&self, user_id: &UserId) -> StorageResult<Option<String>> {
        let guard = self.users.read().map_err(|_| poisoned("users"))?;
        Ok(guard.get(user_id).cloned())
    }

    async fn upsert_project(&self, project: ProjectRecord) -> StorageResult<()> {
        let mut guard = self.projects.write().map_err(|_| poisoned("projects"))?;
        guard.insert(project.id.clone(), project);
        Ok(())
    }

    async fn upsert_user(&self, user_id: UserId, display_name: String) -> StorageResult<()> {
        let mut guard = self.users.write().map_err(|_| poisoned("users"))?;
        guard.insert(user_id, display_name);
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryLmsStorage {
    async fn insert_task(&self, task: Task) -> StorageResult<()> {
        let mut guard = self.tasks.write().map_err(|_| poisoned("tasks"))?;
        if guard.contains_key(&task.id) {
            return Err(StorageError::Conflict(format!(
                "task {} already exists",
                task.id
            )));
        }
        guard.insert(task.id.clone(), task);
        Ok(())
    }

    async fn get_task(&self, task_id: &TaskId) -> StorageResult<Option<Task>> {
        let guard = self.tasks.read().map_err(|_| poisoned("tasks"))?;
        Ok(guard.get(task_id).cloned())
    }

    async fn update_task(&self, task: Task) -> StorageResult<()> {
        let mut guard = self.tasks.write().map_err(|_| poisoned("tasks"))?;
        let slot = guard
            .get_mut(&task.id)
            .ok_or_else(|| StorageError::NotFound(format!("task {} not found", task.id)))?;
        *slot = task;
        Ok(())
    }

    async fn delete_task(&self, task_id: &TaskId) -> StorageResult<()> {
        let mut guard = self.tasks.write().map_err(|_| poisoned("tasks"))?;
        guard
            .remove(task_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("task {task_id} not found")))
    }

    async fn list_tasks(&self, project_id: &ProjectId) -> StorageResult<Vec<Task>> {
        let guard = self.tasks.read().map_err(|_| poisoned("tasks"))?;
        let mut values = guard
            .values()
            .filter(|task| &task.project_id == project_id)
            .cloned()
            .collect::<Vec<_>>();
        sort_tasks(&mut values);
        Ok(values)
    }
}

#[async_trait]
impl SubmissionStore for InMemoryLmsStorage {
    async fn append_submission(&self, submission: NewSubmission) -> StorageResult<Submission> {
        let mut guard = self
            .submissions
            .write()
            .map_err(|_| poisoned("submissions"))?;
        if guard.by_id.contains_key(&submission.id) {
            return Err(StorageError::Conflict(format!(
                "submission {} already exists",
                submission.id
            )));
        }

        let key = (submission.student_id.clone(), submission.task_id.clone());
        let attempt = guard.history.get(&key).map(|ids| ids.len()).unwrap_or(0) + 1;
        let attempt = u32::try_from(attempt)
            .map_err(|_| StorageError::InvalidInput("attempt counter overflow".into()))?;

        let record = Submission::from_new(submission, attempt);
        guard.history.entry(key).or_default().push(record.id.clone());
        guard.by_id.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> StorageResult<Option<Submission>> {
        let guard = self
            .submissions
            .read()
            .map_err(|_| poisoned("submissions"))?;
        Ok(guard.by_id.get(submission_id).cloned())
    }

    async fn list_submissions(
        &self,
        student_id: &UserId,
        task_id: &TaskId,
    ) -> StorageResult<Vec<Submission>> {
        let guard = self
            .submissions
            .read()
            .map_err(|_| poisoned("submissions"))?;
        let history = guard
            .history
            .get(&(student_id.clone(), task_id.clone()))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| guard.by_id.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(history)
    }

    async fn active_submission(
        &self,
        student_id: &UserId,
        task_id: &TaskId,
    ) -> StorageResult<Option<Submission>> {
        let guard = self
            .submissions
            .read()
            .map_err(|_| poisoned("submissions"))?;
        Ok(guard.active(student_id, task_id).cloned())
    }

    async fn transition_review(
        &self,
        submission_id: &SubmissionId,
        outcome: ReviewOutcome,
    ) -> StorageResult<Submission> {
        let mut guard = self
            .submissions
            .write()
            .map_err(|_| poisoned("submissions"))?;

        let current = guard.by_id.get(submission_id).ok_or_else(|| {
            StorageError::NotFound(format!("submission {submission_id} not found"))
        })?;
        if !current.is_pending() {
            return Err(StorageError::ReviewTransition(format!(
                "submission {submission_id} is already {}",
                current.state
            )));
        }
        let is_active = guard
            .active(&current.student_id, &current.task_id)
            .map(|active| &active.id == submission_id)
            .unwrap_or(false);
        if !is_active {
            return Err(StorageError::ReviewTransition(format!(
                "submission {submission_id} has been superseded by a newer attempt"
            )));
        }

        let record = guard.by_id.get_mut(submission_id).ok_or_else(|| {
            StorageError::NotFound(format!("submission {submission_id} not found"))
        })?;
        record.apply_review(&outcome);
        Ok(record.clone())
    }

    async fn project_snapshot(
        &self,
        project_id: &ProjectId,
        student_id: Option<&UserId>,
    ) -> StorageResult<ProjectSnapshot> {
        let tasks_guard = self.tasks.read().map_err(|_| poisoned("tasks"))?;
        let submissions_guard = self
            .submissions
            .read()
            .map_err(|_| poisoned("submissions"))?;

        let mut tasks = tasks_guard
            .values()
            .filter(|task| &task.project_id == project_id)
            .cloned()
            .collect::<Vec<_>>();
        sort_tasks(&mut tasks);
        let task_ids: HashSet<&TaskId> = tasks.iter().map(|task| &task.id).collect();

        let mut active_submissions = submissions_guard
            .history
            .iter()
            .filter(|((student, task), _)| {
                task_ids.contains(task) && student_id.map(|s| s == student).unwrap_or(true)
            })
            .filter_map(|(_, ids)| ids.last())
            .filter_map(|id| submissions_guard.by_id.get(id).cloned())
            .collect::<Vec<_>>();
        active_submissions.sort_by(|a, b| {
            (&a.student_id, &a.task_id).cmp(&(&b.student_id, &b.task_id))
        });

        Ok(ProjectSnapshot {
            project_id: project_id.clone(),
            tasks,
            active_submissions,
        })
    }
}

#[async_trait]
impl CertificateStore for InMemoryLmsStorage {
    async fn insert_certificate(&self, certificate: Certificate) -> StorageResult<()> {
        let mut guard = self
            .certificates
            .write()
            .map_err(|_| poisoned("certificates"))?;
        let key = (certificate.student_id.clone(), certificate.project_id.clone());
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "certificate for student {} on project {} already exists",
                certificate.student_id, certificate.project_id
            )));
        }
        guard.insert(key, certificate);
        Ok(())
    }

    async fn get_certificate(
        &self,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> StorageResult<Option<Certificate>> {
        let guard = self
            .certificates
            .read()
            .map_err(|_| poisoned("certificates"))?;
        Ok(guard
            .get(&(student_id.clone(), project_id.clone()))
            .cloned())
    }

    async fn list_certificates(&self, student_id: &UserId) -> StorageResult<Vec<Certificate>> {
        let guard = self
            .certificates
            .read()
            .map_err(|_| poisoned("certificates"))?;
        let mut values = guard
            .values()
            .filter(|certificate| &certificate.student_id == student_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lms_types::{
        ArtifactHandle, CertificateId, NewTask, ReviewDecision, ReviewState, SubmissionPayload,
    };

    fn new_submission(student: &str, task: &str) -> NewSubmission {
        NewSubmission {
            id: SubmissionId::generate(),
            student_id: UserId::new(student),
            task_id: TaskId::new(task),
            project_id: ProjectId::new("p1"),
            payload: SubmissionPayload::text("work"),
            late: false,
            submitted_at: Utc::now(),
        }
    }

    fn outcome(decision: ReviewDecision) -> ReviewOutcome {
        ReviewOutcome {
            decision,
            grade: Some(80.0),
            feedback: None,
            reviewer: UserId::new("mentor"),
            reviewed_at: Utc::now(),
        }
    }

    async fn seed_task(storage: &InMemoryLmsStorage, id: &str) -> Task {
        let mut task = Task::from_request(
            NewTask::new(ProjectId::new("p1"), id),
            UserId::new("mentor"),
            Utc::now(),
        );
        task.id = TaskId::new(id);
        storage.insert_task(task.clone()).await.unwrap();
        task
    }

    #[tokio::test]
    async fn attempts_are_numbered_per_pair() {
        let storage = InMemoryLmsStorage::new();
        let first = storage
            .append_submission(new_submission("s1", "t1"))
            .await
            .unwrap();
        let second = storage
            .append_submission(new_submission("s1", "t1"))
            .await
            .unwrap();
        let other = storage
            .append_submission(new_submission("s2", "t1"))
            .await
            .unwrap();

        assert_eq!((first.attempt, second.attempt, other.attempt), (1, 2, 1));
        let active = storage
            .active_submission(&UserId::new("s1"), &TaskId::new("t1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, second.id);
        let history = storage
            .list_submissions(&UserId::new("s1"), &TaskId::new("t1"))
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, first.id);
    }

    #[tokio::test]
    async fn review_transition_checks_expected_state() {
        let storage = InMemoryLmsStorage::new();
        let submission = storage
            .append_submission(new_submission("s1", "t1"))
            .await
            .unwrap();

        let reviewed = storage
            .transition_review(&submission.id, outcome(ReviewDecision::Rejected))
            .await
            .unwrap();
        assert_eq!(reviewed.state, ReviewState::Rejected);

        let again = storage
            .transition_review(&submission.id, outcome(ReviewDecision::Approved))
            .await;
        assert!(matches!(again, Err(StorageError::ReviewTransition(_))));
    }

    #[tokio::test]
    async fn superseded_pending_submission_cannot_be_reviewed() {
        let storage = InMemoryLmsStorage::new();
        let stale = storage
            .append_submission(new_submission("s1", "t1"))
            .await
            .unwrap();
        storage
            .append_submission(new_submission("s1", "t1"))
            .await
            .unwrap();

        let result = storage
            .transition_review(&stale.id, outcome(ReviewDecision::Approved))
            .await;
        assert!(matches!(result, Err(StorageError::ReviewTransition(_))));
    }

    #[tokio::test]
    async fn snapshot_excludes_orphaned_submissions() {
        let storage = InMemoryLmsStorage::new();
        seed_task(&storage, "t1").await;
        seed_task(&storage, "t2").await;
        storage
            .append_submission(new_submission("s1", "t1"))
            .await
            .unwrap();
        storage
            .append_submission(new_submission("s1", "t2"))
            .await
            .unwrap();

        storage.delete_task(&TaskId::new("t2")).await.unwrap();

        let snapshot = storage
            .project_snapshot(&ProjectId::new("p1"), Some(&UserId::new("s1")))
            .await
            .unwrap();
        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.active_submissions.len(), 1);
        assert_eq!(snapshot.active_submissions[0].task_id, TaskId::new("t1"));

        // The orphan stays in history.
        let history = storage
            .list_submissions(&UserId::new("s1"), &TaskId::new("t2"))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn certificate_pair_is_unique() {
        let storage = InMemoryLmsStorage::new();
        let certificate = Certificate {
            id: CertificateId::generate(),
            student_id: UserId::new("s1"),
            project_id: ProjectId::new("p1"),
            issued_at: Utc::now(),
            artifact: ArtifactHandle::new("artifact-1"),
            issued_by: UserId::new("mentor"),
        };
        storage.insert_certificate(certificate.clone()).await.unwrap();

        let duplicate = Certificate {
            id: CertificateId::generate(),
            ..certificate
        };
        let result = storage.insert_certificate(duplicate).await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));
        assert_eq!(
            storage
                .list_certificates(&UserId::new("s1"))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn deleting_unknown_task_is_not_found() {
        let storage = InMemoryLmsStorage::new();
        let result = storage.delete_task(&TaskId::new("missing")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
