//! Facade composing the four engine components over one storage bundle.

use crate::access::{AccessPolicy, DirectoryAccessPolicy};
use crate::certificate::CertificateGate;
use crate::config::EngineConfig;
use crate::error::LmsResult;
use crate::progress::ProgressAggregator;
use crate::registry::TaskRegistry;
use crate::renderer::CertificateRenderer;
use crate::review::ReviewStateMachine;
use lms_storage::LmsStorage;
use lms_types::{
    Certificate, Eligibility, MentorSummary, NewTask, ProgressRecord, ProjectId, ProjectRecord,
    ReviewDecision, StudentSummary, Submission, SubmissionId, SubmissionPayload, Task, TaskId,
    TaskPatch, UserId,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Learning progress and certification engine.
///
/// Every operation takes the acting user first and checks it against the
/// [`AccessPolicy`] before touching state.
#[derive(Clone)]
pub struct LearningEngine {
    storage: Arc<dyn LmsStorage>,
    access: Arc<dyn AccessPolicy>,
    tasks: TaskRegistry,
    reviews: ReviewStateMachine,
    progress: ProgressAggregator,
    certificates: CertificateGate,
}

impl LearningEngine {
    pub fn new(
        storage: Arc<dyn LmsStorage>,
        access: Arc<dyn AccessPolicy>,
        renderer: Arc<dyn CertificateRenderer>,
        config: EngineConfig,
    ) -> LmsResult<Self> {
        config.validate()?;
        Ok(Self {
            tasks: TaskRegistry::new(storage.clone(), access.clone()),
            reviews: ReviewStateMachine::new(storage.clone(), access.clone(), config.grade_policy),
            progress: ProgressAggregator::new(storage.clone(), access.clone()),
            certificates: CertificateGate::new(
                storage.clone(),
                access.clone(),
                renderer,
                config.render_timeout(),
            ),
            storage,
            access,
        })
    }

    /// Build an engine whose roles come from the storage's own project directory.
    pub fn with_directory_access(
        storage: Arc<dyn LmsStorage>,
        renderer: Arc<dyn CertificateRenderer>,
        config: EngineConfig,
    ) -> LmsResult<Self> {
        let access = Arc::new(DirectoryAccessPolicy::new(storage.clone()));
        Self::new(storage, access, renderer, config)
    }

    // Task registry

    pub async fn create_task(&self, actor: &UserId, request: NewTask) -> LmsResult<Task> {
        self.tasks.create_task(actor, request).await
    }

    pub async fn update_task(
        &self,
        actor: &UserId,
        task_id: &TaskId,
        patch: TaskPatch,
    ) -> LmsResult<Task> {
        self.tasks.update_task(actor, task_id, patch).await
    }

    pub async fn delete_task(&self, actor: &UserId, task_id: &TaskId) -> LmsResult<()> {
        self.tasks.delete_task(actor, task_id).await
    }

    pub async fn list_tasks_for_project(
        &self,
        actor: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<Vec<Task>> {
        self.tasks.list_tasks_for_project(actor, project_id).await
    }

    // Review state machine

    pub async fn submit(
        &self,
        actor: &UserId,
        task_id: &TaskId,
        payload: SubmissionPayload,
    ) -> LmsResult<Submission> {
        self.reviews.submit(actor, task_id, payload).await
    }

    pub async fn review(
        &self,
        actor: &UserId,
        submission_id: &SubmissionId,
        decision: ReviewDecision,
        grade: Option<f64>,
        feedback: Option<String>,
    ) -> LmsResult<Submission> {
        self.reviews
            .review(actor, submission_id, decision, grade, feedback)
            .await
    }

    pub async fn get_submission(
        &self,
        actor: &UserId,
        submission_id: &SubmissionId,
    ) -> LmsResult<Submission> {
        self.reviews.get_submission(actor, submission_id).await
    }

    pub async fn submission_history(
        &self,
        actor: &UserId,
        student_id: &UserId,
        task_id: &TaskId,
    ) -> LmsResult<Vec<Submission>> {
        self.reviews
            .submission_history(actor, student_id, task_id)
            .await
    }

    pub async fn pending_reviews(
        &self,
        actor: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<Vec<Submission>> {
        self.reviews.pending_reviews(actor, project_id).await
    }

    // Progress

    pub async fn compute_progress(
        &self,
        actor: &UserId,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<ProgressRecord> {
        self.progress
            .compute_progress(actor, student_id, project_id)
            .await
    }

    pub async fn compute_overview(
        &self,
        actor: &UserId,
        project_id: Option<&ProjectId>,
    ) -> LmsResult<Vec<ProgressRecord>> {
        self.progress.compute_overview(actor, project_id).await
    }

    // Certificates

    pub async fn check_eligibility(
        &self,
        actor: &UserId,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<Eligibility> {
        self.certificates
            .check_eligibility(actor, student_id, project_id)
            .await
    }

    pub async fn issue_certificate(
        &self,
        actor: &UserId,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<Certificate> {
        self.certificates
            .issue_certificate(actor, student_id, project_id)
            .await
    }

    pub async fn get_certificate(
        &self,
        actor: &UserId,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<Certificate> {
        self.certificates
            .get_certificate(actor, student_id, project_id)
            .await
    }

    // Dashboards

    /// Figures for the acting student across every project they are assigned to.
    pub async fn student_summary(&self, actor: &UserId) -> LmsResult<StudentSummary> {
        let projects = self.projects_for(actor, Role::Student).await?;

        let mut approved_tasks = 0u32;
        for project in &projects {
            let record = self.progress.progress_of(actor, &project.id).await?;
            approved_tasks = approved_tasks.saturating_add(record.approved_tasks);
        }
        let certificates = self.storage.list_certificates(actor).await?;

        Ok(StudentSummary {
            student_id: actor.clone(),
            assigned_projects: count(projects.len()),
            approved_tasks,
            certificates: count(certificates.len()),
        })
    }

    /// Figures for the acting mentor across every project they mentor.
    pub async fn mentor_summary(&self, actor: &UserId) -> LmsResult<MentorSummary> {
        let projects = self.projects_for(actor, Role::Mentor).await?;

        let mut students = BTreeSet::new();
        let mut pending_reviews = 0usize;
        for project in &projects {
            students.extend(project.assigned_students.iter().cloned());
            let snapshot = self.storage.project_snapshot(&project.id, None).await?;
            pending_reviews += snapshot
                .active_submissions
                .iter()
                .filter(|submission| submission.is_pending())
                .count();
        }

        Ok(MentorSummary {
            mentor_id: actor.clone(),
            projects: count(projects.len()),
            assigned_students: count(students.len()),
            pending_reviews: count(pending_reviews),
        })
    }

    async fn projects_for(&self, actor: &UserId, role: Role) -> LmsResult<Vec<ProjectRecord>> {
        let mut kept = Vec::new();
        for project in self.storage.list_projects().await? {
            let holds = match role {
                Role::Mentor => self.access.is_project_mentor(actor, &project.id).await?,
                Role::Student => self.access.is_assigned_student(actor, &project.id).await?,
            };
            if holds {
                kept.push(project);
            }
        }
        Ok(kept)
    }
}

#[derive(Clone, Copy)]
enum Role {
    Mentor,
    Student,
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
