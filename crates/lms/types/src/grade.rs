//! Grade bounds applied when a mentor reviews a submission.

use serde::{Deserialize, Serialize};

/// Inclusive numeric range a grade must fall in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradePolicy {
    pub min: f64,
    pub max: f64,
}

impl Default for GradePolicy {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
        }
    }
}

impl GradePolicy {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// The bounds themselves must be finite and ordered.
    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    /// Check a grade against the range, returning a description of the problem.
    pub fn check(&self, grade: f64) -> Result<(), String> {
        if !grade.is_finite() {
            return Err(format!("grade must be a finite number, got {grade}"));
        }
        if grade < self.min || grade > self.max {
            return Err(format!(
                "grade {grade} is outside the allowed range {}..={}",
                self.min, self.max
            ));
        }
        Ok(())
    }
}
