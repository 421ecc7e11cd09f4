use crate::StorageResult;
use async_trait::async_trait;
use lms_types::{
    Certificate, NewSubmission, ProjectId, ProjectRecord, ProjectSnapshot, ReviewOutcome,
    Submission, SubmissionId, Task, TaskId, UserId,
};

/// Read access to the externally owned project and user directory.
///
/// The writers exist so adapters can be seeded; the engine only reads.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn get_project(&self, project_id: &ProjectId) -> StorageResult<Option<ProjectRecord>>;

    /// All known projects, ordered by id.
    async fn list_projects(&self) -> StorageResult<Vec<ProjectRecord>>;

    async fn display_name(&self, user_id: &UserId) -> StorageResult<Option<String>>;

    async fn upsert_project(&self, project: ProjectRecord) -> StorageResult<()>;

    async fn upsert_user(&self, user_id: UserId, display_name: String) -> StorageResult<()>;
}

/// Storage interface for task records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task. Fails with `Conflict` if the id is taken.
    async fn insert_task(&self, task: Task) -> StorageResult<()>;

    async fn get_task(&self, task_id: &TaskId) -> StorageResult<Option<Task>>;

    /// Replace an existing task record. Fails with `NotFound` if absent.
    async fn update_task(&self, task: Task) -> StorageResult<()>;

    /// Hard-delete a task. Submissions referencing it are left in place.
    async fn delete_task(&self, task_id: &TaskId) -> StorageResult<()>;

    /// Tasks currently belonging to a project, in listing order.
    async fn list_tasks(&self, project_id: &ProjectId) -> StorageResult<Vec<Task>>;
}

/// Storage interface for the append-only submission history.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Append a new attempt for (student, task) and return the stored record.
    ///
    /// The attempt number is allocated atomically with the insert.
    async fn append_submission(&self, submission: NewSubmission) -> StorageResult<Submission>;

    async fn get_submission(&self, submission_id: &SubmissionId)
        -> StorageResult<Option<Submission>>;

    /// Full history for (student, task), oldest attempt first.
    async fn list_submissions(
        &self,
        student_id: &UserId,
        task_id: &TaskId,
    ) -> StorageResult<Vec<Submission>>;

    /// Highest attempt for (student, task), if any.
    async fn active_submission(
        &self,
        student_id: &UserId,
        task_id: &TaskId,
    ) -> StorageResult<Option<Submission>>;

    /// Compare-and-set review transition.
    ///
    /// Applies `outcome` only if the submission is still `Pending` and is the
    /// active attempt for its pair. Otherwise returns `ReviewTransition`
    /// (or `NotFound` if the id is unknown). Exactly one of several
    /// concurrent callers can succeed.
    async fn transition_review(
        &self,
        submission_id: &SubmissionId,
        outcome: ReviewOutcome,
    ) -> StorageResult<Submission>;

    /// Current tasks of a project plus the active submissions against them,
    /// read as one consistent view. `student_id` narrows the submissions.
    async fn project_snapshot(
        &self,
        project_id: &ProjectId,
        student_id: Option<&UserId>,
    ) -> StorageResult<ProjectSnapshot>;
}

/// Storage interface for issued certificates.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Insert a certificate. A second certificate for the same
    /// (student, project) fails with `Conflict`.
    async fn insert_certificate(&self, certificate: Certificate) -> StorageResult<()>;

    async fn get_certificate(
        &self,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> StorageResult<Option<Certificate>>;

    /// Certificates held by a student, oldest first.
    async fn list_certificates(&self, student_id: &UserId) -> StorageResult<Vec<Certificate>>;
}

/// Storage bundle used by the engine.
pub trait LmsStorage:
    ProjectDirectory + TaskStore + SubmissionStore + CertificateStore + Send + Sync
{
}

impl<T> LmsStorage for T where
    T: ProjectDirectory + TaskStore + SubmissionStore + CertificateStore + Send + Sync
{
}
