//! Certificate renderer collaborator.

use async_trait::async_trait;
use lms_types::{ArtifactHandle, CertificateData};

/// Failure reported by a renderer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct RenderError(pub String);

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Turns a certificate data record into a stored artifact.
///
/// Implementations may be slow or fail. The engine bounds each call with a
/// timeout and persists nothing unless the call succeeds.
#[async_trait]
pub trait CertificateRenderer: Send + Sync {
    async fn render(&self, data: &CertificateData) -> Result<ArtifactHandle, RenderError>;
}
