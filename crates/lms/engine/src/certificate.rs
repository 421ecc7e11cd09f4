//! Certificate issuance gate.
//!
//! Per (student, project) the gate moves `NotEligible -> Eligible -> Issued`.
//! Issuance for one pair is serialized in process by a keyed mutex and across
//! processes by the store's uniqueness constraint; a losing writer always
//! sees [`LmsError::AlreadyIssued`].

use crate::access::{require_enrollment, require_mentor, require_student_reader, AccessPolicy};
use crate::error::{EntityKind, LmsError, LmsResult};
use crate::progress::ProgressAggregator;
use crate::renderer::CertificateRenderer;
use chrono::Utc;
use dashmap::DashMap;
use lms_storage::{LmsStorage, StorageError};
use lms_types::{
    Certificate, CertificateData, CertificateId, Eligibility, ProjectId, ProjectRecord, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

type PairKey = (UserId, ProjectId);
type PairLocks = DashMap<PairKey, Arc<Mutex<()>>>;

/// Share of a pair's issuance lock. The map entry is dropped with its last
/// holder, including callers whose future was cancelled mid-issuance.
struct PairSlot<'a> {
    locks: &'a PairLocks,
    key: PairKey,
    lock: Arc<Mutex<()>>,
}

impl<'a> PairSlot<'a> {
    fn acquire(locks: &'a PairLocks, key: PairKey) -> Self {
        let lock = locks.entry(key.clone()).or_default().value().clone();
        Self { locks, key, lock }
    }
}

impl Drop for PairSlot<'_> {
    fn drop(&mut self) {
        // Release our share first so the last holder sees a count of one.
        drop(std::mem::take(&mut self.lock));
        self.locks
            .remove_if(&self.key, |_, entry| Arc::strong_count(entry) == 1);
    }
}

/// Decides eligibility and issues certificates.
#[derive(Clone)]
pub struct CertificateGate {
    storage: Arc<dyn LmsStorage>,
    access: Arc<dyn AccessPolicy>,
    renderer: Arc<dyn CertificateRenderer>,
    progress: ProgressAggregator,
    render_timeout: Duration,
    issuing: Arc<PairLocks>,
}

impl CertificateGate {
    pub fn new(
        storage: Arc<dyn LmsStorage>,
        access: Arc<dyn AccessPolicy>,
        renderer: Arc<dyn CertificateRenderer>,
        render_timeout: Duration,
    ) -> Self {
        let progress = ProgressAggregator::new(storage.clone(), access.clone());
        Self {
            storage,
            access,
            renderer,
            progress,
            render_timeout,
            issuing: Arc::new(DashMap::new()),
        }
    }

    /// Whether `student_id` has every current task of the project approved.
    pub async fn check_eligibility(
        &self,
        actor: &UserId,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<Eligibility> {
        self.project(project_id).await?;
        require_student_reader(
            self.access.as_ref(),
            actor,
            student_id,
            project_id,
            "check certificate eligibility on this project",
        )
        .await?;
        require_enrollment(self.access.as_ref(), student_id, project_id).await?;

        let record = self.progress.progress_of(student_id, project_id).await?;
        Ok(record.eligibility())
    }

    /// Issue the certificate for (student, project) on behalf of the project mentor.
    ///
    /// Eligibility is recomputed under the pair lock. Nothing is stored unless
    /// rendering succeeds within the configured timeout.
    pub async fn issue_certificate(
        &self,
        actor: &UserId,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<Certificate> {
        let project = self.project(project_id).await?;
        require_mentor(
            self.access.as_ref(),
            actor,
            project_id,
            "issue certificates on this project",
        )
        .await?;
        require_enrollment(self.access.as_ref(), student_id, project_id).await?;

        let slot = PairSlot::acquire(&self.issuing, (student_id.clone(), project_id.clone()));
        let _guard = slot.lock.lock().await;
        self.issue_locked(actor, student_id, &project).await
    }

    async fn issue_locked(
        &self,
        actor: &UserId,
        student_id: &UserId,
        project: &ProjectRecord,
    ) -> LmsResult<Certificate> {
        if self
            .storage
            .get_certificate(student_id, &project.id)
            .await?
            .is_some()
        {
            tracing::warn!(
                student_id = %student_id,
                project_id = %project.id,
                "issuance rejected: certificate already exists"
            );
            return Err(already_issued(student_id, &project.id));
        }

        let record = self.progress.progress_of(student_id, &project.id).await?;
        if let Eligibility::NotEligible(reason) = record.eligibility() {
            tracing::warn!(
                student_id = %student_id,
                project_id = %project.id,
                %reason,
                "issuance rejected: not eligible"
            );
            return Err(LmsError::NotEligible {
                student_id: student_id.clone(),
                project_id: project.id.clone(),
                reason,
            });
        }

        let student_name = self
            .storage
            .display_name(student_id)
            .await?
            .ok_or_else(|| LmsError::not_found(EntityKind::User, student_id))?;
        let issued_at = Utc::now();
        let data = CertificateData {
            student_name,
            project_title: project.title.clone(),
            category_name: project.category_name.clone(),
            completion_date: issued_at.date_naive(),
        };

        let artifact = match tokio::time::timeout(self.render_timeout, self.renderer.render(&data))
            .await
        {
            Ok(Ok(artifact)) => artifact,
            Ok(Err(err)) => {
                tracing::error!(
                    student_id = %student_id,
                    project_id = %project.id,
                    error = %err,
                    "certificate rendering failed"
                );
                return Err(LmsError::RenderingFailed {
                    reason: err.to_string(),
                });
            }
            Err(_) => {
                tracing::error!(
                    student_id = %student_id,
                    project_id = %project.id,
                    timeout_ms = self.render_timeout.as_millis() as u64,
                    "certificate rendering timed out"
                );
                return Err(LmsError::RenderingFailed {
                    reason: format!(
                        "renderer did not finish within {:?}",
                        self.render_timeout
                    ),
                });
            }
        };

        let certificate = Certificate {
            id: CertificateId::generate(),
            student_id: student_id.clone(),
            project_id: project.id.clone(),
            issued_at,
            artifact,
            issued_by: actor.clone(),
        };
        match self.storage.insert_certificate(certificate.clone()).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => {
                tracing::warn!(
                    student_id = %student_id,
                    project_id = %project.id,
                    "issuance lost to a concurrent writer"
                );
                return Err(already_issued(student_id, &project.id));
            }
            Err(other) => return Err(other.into()),
        }

        tracing::info!(
            certificate_id = %certificate.id,
            student_id = %student_id,
            project_id = %project.id,
            issued_by = %actor,
            artifact = %certificate.artifact,
            "certificate issued"
        );
        Ok(certificate)
    }

    /// The certificate for (student, project), if one was issued.
    pub async fn get_certificate(
        &self,
        actor: &UserId,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> LmsResult<Certificate> {
        self.project(project_id).await?;
        require_student_reader(
            self.access.as_ref(),
            actor,
            student_id,
            project_id,
            "read certificates on this project",
        )
        .await?;

        self.storage
            .get_certificate(student_id, project_id)
            .await?
            .ok_or_else(|| {
                LmsError::not_found(EntityKind::Certificate, format!("{student_id}@{project_id}"))
            })
    }

    async fn project(&self, project_id: &ProjectId) -> LmsResult<ProjectRecord> {
        self.storage
            .get_project(project_id)
            .await?
            .ok_or_else(|| LmsError::not_found(EntityKind::Project, project_id))
    }
}

fn already_issued(student_id: &UserId, project_id: &ProjectId) -> LmsError {
    LmsError::AlreadyIssued {
        student_id: student_id.clone(),
        project_id: project_id.clone(),
    }
}
