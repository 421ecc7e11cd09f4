//! Completion certificates.

use crate::{CertificateId, ProjectId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Opaque handle to an artifact produced by the certificate renderer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactHandle(pub String);

impl ArtifactHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable proof that a student completed a project.
///
/// At most one exists per (student, project). There is no update or delete path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub student_id: UserId,
    pub project_id: ProjectId,
    pub issued_at: DateTime<Utc>,
    pub artifact: ArtifactHandle,
    pub issued_by: UserId,
}

/// Data record handed to the renderer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateData {
    pub student_name: String,
    pub project_title: String,
    pub category_name: String,
    pub completion_date: NaiveDate,
}
