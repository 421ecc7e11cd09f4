//! Domain types for the learning progress and certification engine.
//!
//! # Key Concepts
//!
//! - **Task**: a unit of work owned by a project and authored by its mentor.
//! - **Submission**: one attempt by a student at a task. Attempts form an
//!   append-only history per (student, task); the highest attempt is the
//!   *active* submission.
//! - **ProgressRecord**: a derived, never-persisted view of how many of a
//!   project's current tasks a student has had approved.
//! - **Certificate**: the immutable, at-most-once record that a student
//!   completed a project.
//!
//! The types here carry no I/O. Persistence lives in `lms-storage` and the
//! decision logic in `lms-engine`.

#![deny(unsafe_code)]

mod certificate;
mod grade;
mod ids;
mod progress;
mod project;
mod submission;
mod task;

pub use certificate::*;
pub use grade::*;
pub use ids::*;
pub use progress::*;
pub use project::*;
pub use submission::*;
pub use task::*;
