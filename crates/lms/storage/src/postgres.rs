//! PostgreSQL adapter for the storage traits.
//!
//! Designed as the transactional source of truth:
//! - review transitions are a single conditional `UPDATE` (compare-and-set)
//! - certificate uniqueness is a `UNIQUE (student_id, project_id)` constraint
//! - attempt numbers are allocated inside the insert and retried on conflict
//! - progress snapshots are read in one `REPEATABLE READ` transaction

use crate::traits::{CertificateStore, ProjectDirectory, SubmissionStore, TaskStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lms_types::{
    sort_tasks, ArtifactHandle, Certificate, CertificateId, NewSubmission, ProjectId,
    ProjectRecord, ProjectSnapshot, ReviewOutcome, ReviewState, Submission, SubmissionId,
    SubmissionPayload, Task, TaskId, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::{BTreeSet, HashMap};

const ATTEMPT_ALLOCATION_RETRIES: usize = 5;

const TASK_COLUMNS: &str = "task_id, project_id, title, description, weight, deadline, owner_id, created_at, updated_at";

const SUBMISSION_COLUMNS: &str = "submission_id, student_id, task_id, project_id, attempt, payload, state, grade, feedback, late, submitted_at, reviewed_at, reviewed_by";

const CERTIFICATE_COLUMNS: &str =
    "certificate_id, student_id, project_id, issued_at, artifact, issued_by";

/// PostgreSQL-backed storage adapter.
#[derive(Clone)]
pub struct PostgresLmsStorage {
    pool: PgPool,
}

impl PostgresLmsStorage {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS lms_users (
                user_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS lms_projects (
                project_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                category_name TEXT NOT NULL,
                mentor_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS lms_project_students (
                project_id TEXT NOT NULL,
                student_id TEXT NOT NULL,
                PRIMARY KEY (project_id, student_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS lms_tasks (
                task_id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                weight BIGINT,
                deadline TIMESTAMPTZ,
                owner_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS lms_tasks_project_idx ON lms_tasks (project_id)",
            // No foreign key to lms_tasks: deleting a task must leave its history behind.
            r#"
            CREATE TABLE IF NOT EXISTS lms_submissions (
                submission_id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                task_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                attempt INTEGER NOT NULL,
                payload JSONB NOT NULL,
                state TEXT NOT NULL,
                grade DOUBLE PRECISION,
                feedback TEXT,
                late BOOLEAN NOT NULL DEFAULT FALSE,
                submitted_at TIMESTAMPTZ NOT NULL,
                reviewed_at TIMESTAMPTZ,
                reviewed_by TEXT,
                UNIQUE (student_id, task_id, attempt)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS lms_certificates (
                certificate_id TEXT PRIMARY KEY,
                student_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                issued_at TIMESTAMPTZ NOT NULL,
                artifact TEXT NOT NULL,
                issued_by TEXT NOT NULL,
                UNIQUE (student_id, project_id)
            )
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    async fn assigned_students(&self) -> StorageResult<HashMap<String, BTreeSet<UserId>>> {
        let rows = sqlx::query("SELECT project_id, student_id FROM lms_project_students")
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        let mut by_project: HashMap<String, BTreeSet<UserId>> = HashMap::new();
        for row in rows {
            let project_id: String = row.try_get("project_id").map_err(backend)?;
            let student_id: String = row.try_get("student_id").map_err(backend)?;
            by_project
                .entry(project_id)
                .or_default()
                .insert(UserId::new(student_id));
        }
        Ok(by_project)
    }
}

#[async_trait]
impl ProjectDirectory for PostgresLmsStorage {
    async fn get_project(&self, project_id: &ProjectId) -> StorageResult<Option<ProjectRecord>> {
        let row = sqlx::query(
            "SELECT project_id, title, category_name, mentor_id, created_at FROM lms_projects WHERE project_id = $1",
        )
        .bind(project_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let students = sqlx::query(
            "SELECT student_id FROM lms_project_students WHERE project_id = $1 ORDER BY student_id",
        )
        .bind(project_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?
        .into_iter()
        .map(|row| row.try_get::<String, _>("student_id").map(UserId::new))
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(backend)?;

        project_row_to_record(row, students).map(Some)
    }

    async fn list_projects(&self) -> StorageResult<Vec<ProjectRecord>> {
        let mut assignments = self.assigned_students().await?;
        let rows = sqlx::query(
            "SELECT project_id, title, category_name, mentor_id, created_at FROM lms_projects ORDER BY project_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                let project_id: String = row.try_get("project_id").map_err(backend)?;
                let students = assignments.remove(&project_id).unwrap_or_default();
                project_row_to_record(row, students)
            })
            .collect()
    }

    async fn display_name(&self, user_id: &UserId) -> StorageResult<Option<String>> {
        let row = sqlx::query("SELECT display_name FROM lms_users WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|row| row.try_get::<String, _>("display_name").map_err(backend))
            .transpose()
    }

    async fn upsert_project(&self, project: ProjectRecord) -> StorageResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            r#"
            INSERT INTO lms_projects (project_id, title, category_name, mentor_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (project_id) DO UPDATE
               SET title = EXCLUDED.title,
                   category_name = EXCLUDED.category_name,
                   mentor_id = EXCLUDED.mentor_id
            "#,
        )
        .bind(project.id.as_str())
        .bind(&project.title)
        .bind(&project.category_name)
        .bind(project.mentor_id.as_str())
        .bind(project.created_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        sqlx::query("DELETE FROM lms_project_students WHERE project_id = $1")
            .bind(project.id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        for student in &project.assigned_students {
            sqlx::query("INSERT INTO lms_project_students (project_id, student_id) VALUES ($1, $2)")
                .bind(project.id.as_str())
                .bind(student.as_str())
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)
    }

    async fn upsert_user(&self, user_id: UserId, display_name: String) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO lms_users (user_id, display_name) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET display_name = EXCLUDED.display_name
            "#,
        )
        .bind(user_id.as_str())
        .bind(display_name)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for PostgresLmsStorage {
    async fn insert_task(&self, task: Task) -> StorageResult<()> {
        sqlx::query(&format!(
            "INSERT INTO lms_tasks ({TASK_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(task.id.as_str())
        .bind(task.project_id.as_str())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.weight.map(i64::from))
        .bind(task.deadline)
        .bind(task.owner_id.as_str())
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;
        Ok(())
    }

    async fn get_task(&self, task_id: &TaskId) -> StorageResult<Option<Task>> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM lms_tasks WHERE task_id = $1"
        ))
        .bind(task_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(task_row_to_record).transpose()
    }

    async fn update_task(&self, task: Task) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE lms_tasks
               SET title = $1,
                   description = $2,
                   weight = $3,
                   deadline = $4,
                   updated_at = $5
             WHERE task_id = $6
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.weight.map(i64::from))
        .bind(task.deadline)
        .bind(task.updated_at)
        .bind(task.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("task {} not found", task.id)));
        }
        Ok(())
    }

    async fn delete_task(&self, task_id: &TaskId) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM lms_tasks WHERE task_id = $1")
            .bind(task_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("task {task_id} not found")));
        }
        Ok(())
    }

    async fn list_tasks(&self, project_id: &ProjectId) -> StorageResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM lms_tasks WHERE project_id = $1"
        ))
        .bind(project_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut tasks = rows
            .into_iter()
            .map(task_row_to_record)
            .collect::<StorageResult<Vec<_>>>()?;
        sort_tasks(&mut tasks);
        Ok(tasks)
    }
}

#[async_trait]
impl SubmissionStore for PostgresLmsStorage {
    async fn append_submission(&self, submission: NewSubmission) -> StorageResult<Submission> {
        let payload = serde_json::to_value(&submission.payload)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        // The attempt number is derived in the same statement; two concurrent
        // appends for one pair collide on the unique key and the loser retries.
        for retry in 0..ATTEMPT_ALLOCATION_RETRIES {
            let result = sqlx::query(
                r#"
                INSERT INTO lms_submissions
                    (submission_id, student_id, task_id, project_id, attempt, payload, state, late, submitted_at)
                SELECT $1, $2, $3, $4, COALESCE(MAX(attempt), 0) + 1, $5, 'pending', $6, $7
                  FROM lms_submissions
                 WHERE student_id = $2 AND task_id = $3
                RETURNING attempt
                "#,
            )
            .bind(submission.id.as_str())
            .bind(submission.student_id.as_str())
            .bind(submission.task_id.as_str())
            .bind(submission.project_id.as_str())
            .bind(&payload)
            .bind(submission.late)
            .bind(submission.submitted_at)
            .fetch_one(&self.pool)
            .await;

            match result {
                Ok(row) => {
                    let attempt: i32 = row.try_get("attempt").map_err(backend)?;
                    let attempt = u32::try_from(attempt).map_err(|_| {
                        StorageError::Serialization(format!("negative attempt {attempt}"))
                    })?;
                    return Ok(Submission::from_new(submission, attempt));
                }
                Err(err) if is_unique_violation(&err) => {
                    tracing::debug!(
                        submission_id = %submission.id,
                        retry,
                        "attempt allocation collided, retrying"
                    );
                }
                Err(err) => return Err(backend(err)),
            }
        }

        Err(StorageError::Conflict(format!(
            "could not allocate an attempt for submission {} after {ATTEMPT_ALLOCATION_RETRIES} tries",
            submission.id
        )))
    }

    async fn get_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> StorageResult<Option<Submission>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM lms_submissions WHERE submission_id = $1"
        ))
        .bind(submission_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(submission_row_to_record).transpose()
    }

    async fn list_submissions(
        &self,
        student_id: &UserId,
        task_id: &TaskId,
    ) -> StorageResult<Vec<Submission>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM lms_submissions WHERE student_id = $1 AND task_id = $2 ORDER BY attempt ASC"
        ))
        .bind(student_id.as_str())
        .bind(task_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(submission_row_to_record).collect()
    }

    async fn active_submission(
        &self,
        student_id: &UserId,
        task_id: &TaskId,
    ) -> StorageResult<Option<Submission>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM lms_submissions WHERE student_id = $1 AND task_id = $2 ORDER BY attempt DESC LIMIT 1"
        ))
        .bind(student_id.as_str())
        .bind(task_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(submission_row_to_record).transpose()
    }

    async fn transition_review(
        &self,
        submission_id: &SubmissionId,
        outcome: ReviewOutcome,
    ) -> StorageResult<Submission> {
        let next_state: ReviewState = outcome.decision.into();
        let row = sqlx::query(&format!(
            r#"
            UPDATE lms_submissions AS s
               SET state = $1,
                   grade = $2,
                   feedback = $3,
                   reviewed_at = $4,
                   reviewed_by = $5
             WHERE s.submission_id = $6
               AND s.state = 'pending'
               AND s.attempt = (
                    SELECT MAX(s2.attempt)
                      FROM lms_submissions s2
                     WHERE s2.student_id = s.student_id
                       AND s2.task_id = s.task_id
               )
            RETURNING {SUBMISSION_COLUMNS}
            "#
        ))
        .bind(next_state.name())
        .bind(outcome.grade)
        .bind(outcome.feedback.as_deref())
        .bind(outcome.reviewed_at)
        .bind(outcome.reviewer.as_str())
        .bind(submission_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        if let Some(row) = row {
            return submission_row_to_record(row);
        }

        match self.get_submission(submission_id).await? {
            Some(current) if !current.is_pending() => Err(StorageError::ReviewTransition(
                format!("submission {submission_id} is already {}", current.state),
            )),
            Some(_) => Err(StorageError::ReviewTransition(format!(
                "submission {submission_id} has been superseded by a newer attempt"
            ))),
            None => Err(StorageError::NotFound(format!(
                "submission {submission_id} not found"
            ))),
        }
    }

    async fn project_snapshot(
        &self,
        project_id: &ProjectId,
        student_id: Option<&UserId>,
    ) -> StorageResult<ProjectSnapshot> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let task_rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM lms_tasks WHERE project_id = $1"
        ))
        .bind(project_id.as_str())
        .fetch_all(&mut *tx)
        .await
        .map_err(backend)?;

        let submission_rows = sqlx::query(&format!(
            r#"
            SELECT {SUBMISSION_COLUMNS}
              FROM lms_submissions s
             WHERE s.task_id IN (SELECT task_id FROM lms_tasks WHERE project_id = $1)
               AND ($2::TEXT IS NULL OR s.student_id = $2)
               AND s.attempt = (
                    SELECT MAX(s2.attempt)
                      FROM lms_submissions s2
                     WHERE s2.student_id = s.student_id
                       AND s2.task_id = s.task_id
               )
             ORDER BY s.student_id, s.task_id
            "#
        ))
        .bind(project_id.as_str())
        .bind(student_id.map(|id| id.as_str()))
        .fetch_all(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        let mut tasks = task_rows
            .into_iter()
            .map(task_row_to_record)
            .collect::<StorageResult<Vec<_>>>()?;
        sort_tasks(&mut tasks);
        let active_submissions = submission_rows
            .into_iter()
            .map(submission_row_to_record)
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(ProjectSnapshot {
            project_id: project_id.clone(),
            tasks,
            active_submissions,
        })
    }
}

#[async_trait]
impl CertificateStore for PostgresLmsStorage {
    async fn insert_certificate(&self, certificate: Certificate) -> StorageResult<()> {
        sqlx::query(&format!(
            "INSERT INTO lms_certificates ({CERTIFICATE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(certificate.id.as_str())
        .bind(certificate.student_id.as_str())
        .bind(certificate.project_id.as_str())
        .bind(certificate.issued_at)
        .bind(certificate.artifact.as_str())
        .bind(certificate.issued_by.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;
        Ok(())
    }

    async fn get_certificate(
        &self,
        student_id: &UserId,
        project_id: &ProjectId,
    ) -> StorageResult<Option<Certificate>> {
        let row = sqlx::query(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM lms_certificates WHERE student_id = $1 AND project_id = $2"
        ))
        .bind(student_id.as_str())
        .bind(project_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(certificate_row_to_record).transpose()
    }

    async fn list_certificates(&self, student_id: &UserId) -> StorageResult<Vec<Certificate>> {
        let rows = sqlx::query(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM lms_certificates WHERE student_id = $1 ORDER BY issued_at ASC"
        ))
        .bind(student_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.into_iter().map(certificate_row_to_record).collect()
    }
}

fn project_row_to_record(row: PgRow, students: BTreeSet<UserId>) -> StorageResult<ProjectRecord> {
    Ok(ProjectRecord {
        id: ProjectId::new(row.try_get::<String, _>("project_id").map_err(backend)?),
        title: row.try_get("title").map_err(backend)?,
        category_name: row.try_get("category_name").map_err(backend)?,
        mentor_id: UserId::new(row.try_get::<String, _>("mentor_id").map_err(backend)?),
        assigned_students: students,
        created_at: row.try_get("created_at").map_err(backend)?,
    })
}

fn task_row_to_record(row: PgRow) -> StorageResult<Task> {
    let weight: Option<i64> = row.try_get("weight").map_err(backend)?;
    let weight = weight
        .map(u32::try_from)
        .transpose()
        .map_err(|_| StorageError::Serialization("task weight out of range".to_string()))?;

    Ok(Task {
        id: TaskId::new(row.try_get::<String, _>("task_id").map_err(backend)?),
        project_id: ProjectId::new(row.try_get::<String, _>("project_id").map_err(backend)?),
        title: row.try_get("title").map_err(backend)?,
        description: row.try_get("description").map_err(backend)?,
        weight,
        deadline: row.try_get("deadline").map_err(backend)?,
        owner_id: UserId::new(row.try_get::<String, _>("owner_id").map_err(backend)?),
        created_at: row.try_get("created_at").map_err(backend)?,
        updated_at: row.try_get("updated_at").map_err(backend)?,
    })
}

fn submission_row_to_record(row: PgRow) -> StorageResult<Submission> {
    let payload: serde_json::Value = row.try_get("payload").map_err(backend)?;
    let payload: SubmissionPayload = serde_json::from_value(payload)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    let raw_state: String = row.try_get("state").map_err(backend)?;
    let state = ReviewState::parse(&raw_state).ok_or_else(|| {
        StorageError::Serialization(format!("unknown review state `{raw_state}`"))
    })?;
    let attempt: i32 = row.try_get("attempt").map_err(backend)?;
    let attempt = u32::try_from(attempt)
        .map_err(|_| StorageError::Serialization(format!("negative attempt {attempt}")))?;
    let reviewed_by: Option<String> = row.try_get("reviewed_by").map_err(backend)?;
    let reviewed_at: Option<DateTime<Utc>> = row.try_get("reviewed_at").map_err(backend)?;

    Ok(Submission {
        id: SubmissionId::new(row.try_get::<String, _>("submission_id").map_err(backend)?),
        student_id: UserId::new(row.try_get::<String, _>("student_id").map_err(backend)?),
        task_id: TaskId::new(row.try_get::<String, _>("task_id").map_err(backend)?),
        project_id: ProjectId::new(row.try_get::<String, _>("project_id").map_err(backend)?),
        attempt,
        payload,
        state,
        grade: row.try_get("grade").map_err(backend)?,
        feedback: row.try_get("feedback").map_err(backend)?,
        late: row.try_get("late").map_err(backend)?,
        submitted_at: row.try_get("submitted_at").map_err(backend)?,
        reviewed_at,
        reviewed_by: reviewed_by.map(UserId::new),
    })
}

fn certificate_row_to_record(row: PgRow) -> StorageResult<Certificate> {
    Ok(Certificate {
        id: CertificateId::new(row.try_get::<String, _>("certificate_id").map_err(backend)?),
        student_id: UserId::new(row.try_get::<String, _>("student_id").map_err(backend)?),
        project_id: ProjectId::new(row.try_get::<String, _>("project_id").map_err(backend)?),
        issued_at: row.try_get("issued_at").map_err(backend)?,
        artifact: ArtifactHandle::new(row.try_get::<String, _>("artifact").map_err(backend)?),
        issued_by: UserId::new(row.try_get::<String, _>("issued_by").map_err(backend)?),
    })
}

fn backend(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StorageError::Conflict(db_err.message().to_string());
        }
    }
    backend(err)
}
