use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RestJobError {
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to create execution handle for job {job_id}: {reason}")]
    HandleCreation { job_id: Uuid, reason: String },

    #[error("No executor registered for provider {0:?}")]
    UnknownProvider(String),

    #[error("Job {job_id} did not terminate within {timeout:?} after cancellation")]
    CancelTimedOut { job_id: Uuid, timeout: Duration },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors reported by a [`JobStore`](crate::store::JobStore) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no job with id {0}")]
    NotFound(Uuid),

    #[error("job {0} already exists")]
    Duplicate(Uuid),

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, RestJobError>;
