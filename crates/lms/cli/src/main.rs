use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use lms_engine::{CertificateRenderer, EngineConfig, LearningEngine, RenderError};
use lms_storage::StorageConfig;
use lms_types::{ArtifactHandle, CertificateData, ProjectId, TaskId, UserId};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StorageMode {
    Postgres,
    /// Fresh in-process store. It starts empty, so it only exercises the
    /// command surface.
    Memory,
}

#[derive(Debug, Parser)]
#[command(name = "lmsctl", version, about = "Inspect learning progress and certificates")]
struct Cli {
    /// Storage backend. `memory` starts empty and is only useful for smoke tests.
    #[arg(long, value_enum, default_value_t = StorageMode::Postgres, env = "LMS_STORAGE")]
    storage: StorageMode,
    /// PostgreSQL url. Falls back to DATABASE_URL.
    #[arg(long, env = "LMS_DATABASE_URL")]
    database_url: Option<String>,
    /// Max PostgreSQL pool connections.
    #[arg(long, default_value_t = 5, env = "LMS_PG_MAX_CONNECTIONS")]
    pg_max_connections: u32,
    /// User the queries are performed as.
    #[arg(long, env = "LMS_ACTOR")]
    actor: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect to the configured store and create missing tables
    InitSchema,
    /// List the tasks of a project
    Tasks {
        #[arg(long)]
        project: String,
    },
    /// Progress of one student on one project
    Progress {
        #[arg(long)]
        student: String,
        #[arg(long)]
        project: String,
    },
    /// Progress of every assigned student, for one project or all mentored projects
    Overview {
        #[arg(long)]
        project: Option<String>,
    },
    /// Certificate eligibility of one student on one project
    Eligibility {
        #[arg(long)]
        student: String,
        #[arg(long)]
        project: String,
    },
    /// Show an issued certificate
    Certificate {
        #[arg(long)]
        student: String,
        #[arg(long)]
        project: String,
    },
    /// Every attempt by a student at a task
    History {
        #[arg(long)]
        student: String,
        #[arg(long)]
        task: String,
    },
    /// Pending submissions waiting for review
    Pending {
        #[arg(long)]
        project: String,
    },
    /// Dashboard figures for the actor
    Summary {
        #[arg(value_enum)]
        role: SummaryRole,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SummaryRole {
    Student,
    Mentor,
}

/// The CLI never issues certificates.
struct UnavailableRenderer;

#[async_trait]
impl CertificateRenderer for UnavailableRenderer {
    async fn render(&self, _data: &CertificateData) -> Result<ArtifactHandle, RenderError> {
        Err(RenderError::new("certificate rendering is not available in lmsctl"))
    }
}

fn resolve_storage(cli: &Cli) -> anyhow::Result<StorageConfig> {
    let resolved_url = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let storage = match cli.storage {
        StorageMode::Memory => StorageConfig::Memory,
        StorageMode::Postgres => {
            let database_url = resolved_url.ok_or_else(|| {
                anyhow::anyhow!("storage=postgres requires --database-url or DATABASE_URL")
            })?;
            StorageConfig::postgres(database_url, cli.pg_max_connections)
        }
    };
    Ok(storage)
}

fn schema_status(config: &StorageConfig) -> &'static str {
    match config {
        StorageConfig::Memory => "memory store keeps no schema; nothing to create",
        StorageConfig::Postgres { .. } => "schema ready",
    }
}

fn require_actor(cli: &Cli) -> anyhow::Result<UserId> {
    cli.actor
        .as_deref()
        .map(UserId::new)
        .ok_or_else(|| anyhow::anyhow!("this command requires --actor or LMS_ACTOR"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "lms_engine=info,lms_storage=info,warn".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let storage_config = resolve_storage(&cli)?;
    let storage = lms_storage::open(&storage_config).await?;

    if let Command::InitSchema = cli.command {
        info!(backend = storage_config.label(), "{}", schema_status(&storage_config));
        return Ok(());
    }

    let renderer = std::sync::Arc::new(UnavailableRenderer);
    let engine = LearningEngine::with_directory_access(storage, renderer, EngineConfig::default())?;
    let actor = require_actor(&cli)?;

    match &cli.command {
        Command::InitSchema => {}
        Command::Tasks { project } => {
            let tasks = engine
                .list_tasks_for_project(&actor, &ProjectId::new(project.as_str()))
                .await?;
            print_json(&tasks)?;
        }
        Command::Progress { student, project } => {
            let record = engine
                .compute_progress(
                    &actor,
                    &UserId::new(student.as_str()),
                    &ProjectId::new(project.as_str()),
                )
                .await?;
            print_json(&record)?;
        }
        Command::Overview { project } => {
            let project = project.as_deref().map(ProjectId::new);
            let records = engine.compute_overview(&actor, project.as_ref()).await?;
            print_json(&records)?;
        }
        Command::Eligibility { student, project } => {
            let eligibility = engine
                .check_eligibility(
                    &actor,
                    &UserId::new(student.as_str()),
                    &ProjectId::new(project.as_str()),
                )
                .await?;
            print_json(&eligibility)?;
        }
        Command::Certificate { student, project } => {
            let certificate = engine
                .get_certificate(
                    &actor,
                    &UserId::new(student.as_str()),
                    &ProjectId::new(project.as_str()),
                )
                .await?;
            print_json(&certificate)?;
        }
        Command::History { student, task } => {
            let history = engine
                .submission_history(
                    &actor,
                    &UserId::new(student.as_str()),
                    &TaskId::new(task.as_str()),
                )
                .await?;
            print_json(&history)?;
        }
        Command::Pending { project } => {
            let queue = engine
                .pending_reviews(&actor, &ProjectId::new(project.as_str()))
                .await?;
            print_json(&queue)?;
        }
        Command::Summary { role } => match role {
            SummaryRole::Student => print_json(&engine.student_summary(&actor).await?)?,
            SummaryRole::Mentor => print_json(&engine.mentor_summary(&actor).await?)?,
        },
    }

    Ok(())
}
