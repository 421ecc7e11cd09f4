use crate::error::{LmsError, LmsResult};
use lms_types::GradePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine tuning knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Range enforced on review grades.
    pub grade_policy: GradePolicy,
    /// Upper bound on a single certificate render call, in milliseconds.
    pub render_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grade_policy: GradePolicy::default(),
            render_timeout_ms: 30_000,
        }
    }
}

impl EngineConfig {
    pub fn with_grade_policy(mut self, grade_policy: GradePolicy) -> Self {
        self.grade_policy = grade_policy;
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn validate(&self) -> LmsResult<()> {
        if !self.grade_policy.is_well_formed() {
            return Err(LmsError::validation(
                "grade_policy",
                format!(
                    "bounds must be finite with min <= max, got {}..={}",
                    self.grade_policy.min, self.grade_policy.max
                ),
            ));
        }
        if self.render_timeout_ms == 0 {
            return Err(LmsError::validation(
                "render_timeout_ms",
                "must be at least one millisecond",
            ));
        }
        Ok(())
    }
}
