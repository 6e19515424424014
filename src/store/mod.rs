//! Job record persistence.
//!
//! The scheduler only talks to storage through [`JobStore`]. A durable
//! backend plugs in by implementing the trait; [`MemoryJobStore`] keeps
//! records in process memory and is what the bundled server runs with.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::scheduler::{Job, JobState};

pub use memory::MemoryJobStore;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job record.
    async fn create(&self, job: Job) -> Result<Job, StoreError>;

    async fn get_by_uuid(&self, id: &Uuid) -> Result<Option<Job>, StoreError>;

    /// All jobs currently in `state`, oldest first.
    async fn list_by_state(&self, state: JobState) -> Result<Vec<Job>, StoreError>;

    /// Every job record, oldest first.
    async fn list_all(&self) -> Result<Vec<Job>, StoreError>;

    /// Write a new state for the job and return the updated record.
    /// Each call is applied atomically.
    async fn persist_state_change(&self, id: &Uuid, state: JobState) -> Result<Job, StoreError>;
}
