//! Error types for the keeper core.
//!
//! Most degraded conditions in this crate (missing files, corrupt state,
//! unreachable collaborators) are absorbed at the component boundary and
//! surface as `None` or a default value. The types here cover the cases
//! that still need to travel across a `Result`.

use thiserror::Error;

/// Failure while reading or writing a backing file.
#[derive(Error, Debug)]
#[error("Persistence error during {operation}: {reason}")]
pub struct PersistenceError {
    pub operation: String,
    pub reason: String,
}

impl PersistenceError {
    pub fn new(operation: &str, reason: impl ToString) -> Self {
        Self {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn from_io(operation: &str, err: std::io::Error) -> Self {
        Self::new(operation, err)
    }
}

/// Failure while inspecting the OS process table.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to run process listing: {0}")]
    Listing(String),
    #[error("Process listing exited with status {0}")]
    ListingStatus(i32),
}

/// Failure reported by the external scheduler collaborator.
///
/// Callers in this crate treat any of these as "no jobs available" and
/// never propagate them past the resume bridge.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler unavailable: {0}")]
    Unavailable(String),
    #[error("Scheduler job not found: {0}")]
    JobNotFound(String),
}

/// Failure reported by the external session-data collaborator.
#[derive(Error, Debug)]
pub enum SessionSourceError {
    #[error("Session not found: {project_id}/{session_id}")]
    NotFound {
        project_id: String,
        session_id: String,
    },
    #[error("Failed to read session data: {0}")]
    Io(String),
}

/// Failure reported by the external session-lifecycle collaborator.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Session process not found: {0}")]
    NotFound(String),
    #[error("Lifecycle operation failed: {0}")]
    Failed(String),
}
