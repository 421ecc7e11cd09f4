//! Storage contracts for the learning progress and certification engine.
//!
//! - task records owned by projects
//! - append-only submission history with compare-and-set review transitions
//! - certificates, unique per (student, project)
//! - a read-mostly view of the external project/user directory
//!
//! Postgres is the transactional source of truth in production. The in-memory
//! adapter implements the same contracts for tests and local runs.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryLmsStorage;
#[cfg(feature = "postgres")]
pub use postgres::PostgresLmsStorage;
pub use traits::{CertificateStore, LmsStorage, ProjectDirectory, SubmissionStore, TaskStore};

use std::sync::Arc;

/// Storage backend configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StorageConfig {
    /// Keep everything in process memory.
    #[default]
    Memory,
    /// Use PostgreSQL. Requires the `postgres` feature.
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn postgres(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self::Postgres {
            database_url: database_url.into(),
            max_connections,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

/// Open the configured backend. Postgres schema is created on connect.
pub async fn open(config: &StorageConfig) -> StorageResult<Arc<dyn LmsStorage>> {
    tracing::info!(backend = config.label(), "opening lms storage");
    match config {
        StorageConfig::Memory => Ok(Arc::new(InMemoryLmsStorage::new())),
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let store =
                PostgresLmsStorage::connect_with_options(database_url, *max_connections, 5).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(StorageError::InvalidInput(
            "postgres storage requested but lms-storage was built without the `postgres` feature"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_opens() {
        let storage = open(&StorageConfig::memory()).await.unwrap();
        assert!(storage.list_projects().await.unwrap().is_empty());
    }

    #[test]
    fn labels() {
        assert_eq!(StorageConfig::default().label(), "memory");
        assert_eq!(StorageConfig::postgres("postgres://x", 4).label(), "postgres");
    }
}
