//! # LMS Engine - Progress Tracking and Certification
//!
//! Decision core of the learning platform: which tasks a project has, how a
//! submission moves through review, how far a student has progressed, and
//! when a certificate may be issued.
//!
//! ## Key Components
//!
//! - [`TaskRegistry`]: create, edit, delete and list project tasks
//! - [`ReviewStateMachine`]: `Pending -> Approved | Rejected` per submission
//! - [`ProgressAggregator`]: pure on-read progress over a consistent snapshot
//! - [`CertificateGate`]: eligibility checks and at-most-once issuance
//! - [`LearningEngine`]: facade wiring the four together
//!
//! ## Boundaries
//!
//! Identity, transport and file storage belong to the surrounding service.
//! The engine consumes an [`AccessPolicy`] for role checks, an
//! [`lms_storage::LmsStorage`] bundle for persistence and a
//! [`CertificateRenderer`] for artifacts.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use lms_engine::{CertificateRenderer, EngineConfig, LearningEngine, RenderError};
//! use lms_storage::InMemoryLmsStorage;
//! use lms_types::{ArtifactHandle, CertificateData, NewTask, ProjectId, UserId};
//!
//! struct PdfRenderer;
//!
//! #[async_trait]
//! impl CertificateRenderer for PdfRenderer {
//!     async fn render(&self, data: &CertificateData) -> Result<ArtifactHandle, RenderError> {
//!         Ok(ArtifactHandle::new(format!("certificates/{}.pdf", data.student_name)))
//!     }
//! }
//!
//! # async fn example() -> Result<(), lms_engine::LmsError> {
//! let storage = Arc::new(InMemoryLmsStorage::new());
//! let engine =
//!     LearningEngine::with_directory_access(storage, Arc::new(PdfRenderer), EngineConfig::default())?;
//!
//! let mentor = UserId::new("mentor-1");
//! let task = engine
//!     .create_task(&mentor, NewTask::new(ProjectId::new("rust-101"), "Borrow checker"))
//!     .await?;
//! # let _ = task;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod access;
pub mod certificate;
pub mod config;
mod engine;
pub mod error;
pub mod progress;
pub mod registry;
pub mod renderer;
pub mod review;

pub use access::{AccessPolicy, DirectoryAccessPolicy};
pub use certificate::CertificateGate;
pub use config::EngineConfig;
pub use engine::LearningEngine;
pub use error::{EntityKind, LmsError, LmsResult};
pub use progress::{aggregate, ProgressAggregator};
pub use registry::TaskRegistry;
pub use renderer::{CertificateRenderer, RenderError};
pub use review::ReviewStateMachine;
