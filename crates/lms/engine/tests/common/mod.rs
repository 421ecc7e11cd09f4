#![allow(dead_code)]

use async_trait::async_trait;
use lms_engine::{CertificateRenderer, EngineConfig, LearningEngine, RenderError};
use lms_storage::{InMemoryLmsStorage, ProjectDirectory};
use lms_types::{
    ArtifactHandle, CertificateData, NewTask, ProjectId, ProjectRecord, ReviewDecision,
    SubmissionPayload, Task, UserId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PROJECT: &str = "rust-101";
pub const MENTOR: &str = "mentor-ada";
pub const STUDENT: &str = "student-sam";
pub const OTHER_STUDENT: &str = "student-kim";

pub fn mentor() -> UserId {
    UserId::new(MENTOR)
}

pub fn student() -> UserId {
    UserId::new(STUDENT)
}

pub fn other_student() -> UserId {
    UserId::new(OTHER_STUDENT)
}

pub fn project() -> ProjectId {
    ProjectId::new(PROJECT)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Renders successfully and remembers every data record it saw.
#[derive(Default)]
pub struct RecordingRenderer {
    rendered: Mutex<Vec<CertificateData>>,
    delay: Option<Duration>,
}

impl RecordingRenderer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            rendered: Mutex::new(Vec::new()),
            delay: Some(delay),
        }
    }

    pub fn rendered(&self) -> Vec<CertificateData> {
        self.rendered.lock().unwrap().clone()
    }
}

#[async_trait]
impl CertificateRenderer for RecordingRenderer {
    async fn render(&self, data: &CertificateData) -> Result<ArtifactHandle, RenderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut rendered = self.rendered.lock().unwrap();
        rendered.push(data.clone());
        Ok(ArtifactHandle::new(format!(
            "certificates/{}.pdf",
            rendered.len()
        )))
    }
}

/// Fails every call.
#[derive(Default)]
pub struct FailingRenderer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CertificateRenderer for FailingRenderer {
    async fn render(&self, _data: &CertificateData) -> Result<ArtifactHandle, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RenderError::new("pdf backend unavailable"))
    }
}

/// Never finishes within any reasonable timeout.
pub struct SlowRenderer;

#[async_trait]
impl CertificateRenderer for SlowRenderer {
    async fn render(&self, _data: &CertificateData) -> Result<ArtifactHandle, RenderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ArtifactHandle::new("never"))
    }
}

pub struct Harness {
    pub storage: Arc<InMemoryLmsStorage>,
    pub engine: LearningEngine,
}

/// One project mentored by [`MENTOR`] with [`STUDENT`] and [`OTHER_STUDENT`] assigned.
pub async fn harness(renderer: Arc<dyn CertificateRenderer>) -> Harness {
    harness_with_config(renderer, EngineConfig::default()).await
}

pub async fn harness_with_config(
    renderer: Arc<dyn CertificateRenderer>,
    config: EngineConfig,
) -> Harness {
    init_tracing();
    let storage = Arc::new(InMemoryLmsStorage::new());
    storage
        .upsert_project(
            ProjectRecord::new(project(), "Rust Fundamentals", "Programming", mentor())
                .with_student(student())
                .with_student(other_student()),
        )
        .await
        .unwrap();
    storage
        .upsert_user(student(), "Sam Student".into())
        .await
        .unwrap();
    storage
        .upsert_user(other_student(), "Kim Student".into())
        .await
        .unwrap();

    let engine = LearningEngine::with_directory_access(storage.clone(), renderer, config).unwrap();
    Harness { storage, engine }
}

impl Harness {
    pub async fn add_task(&self, title: &str) -> Task {
        self.engine
            .create_task(&mentor(), NewTask::new(project(), title))
            .await
            .unwrap()
    }

    pub async fn add_tasks(&self, n: usize) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(n);
        for i in 0..n {
            tasks.push(self.add_task(&format!("Task {}", i + 1)).await);
        }
        tasks
    }

    /// Submit as `student_id` and review with `decision`. `None` leaves it pending.
    pub async fn submit_and_review(
        &self,
        student_id: &UserId,
        task: &Task,
        decision: Option<ReviewDecision>,
    ) {
        let submission = self
            .engine
            .submit(student_id, &task.id, SubmissionPayload::text("my answer"))
            .await
            .unwrap();
        if let Some(decision) = decision {
            let grade = match decision {
                ReviewDecision::Approved => Some(85.0),
                ReviewDecision::Rejected => None,
            };
            self.engine
                .review(&mentor(), &submission.id, decision, grade, None)
                .await
                .unwrap();
        }
    }

    pub async fn approve_all(&self, student_id: &UserId, tasks: &[Task]) {
        for task in tasks {
            self.submit_and_review(student_id, task, Some(ReviewDecision::Approved))
                .await;
        }
    }
}
