use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::scheduler::{Job, JobState};
use crate::store::JobStore;

#[derive(Debug, Default)]
struct Records {
    jobs: HashMap<Uuid, Job>,
    /// Ids in creation order.
    order: Vec<Uuid>,
}

impl Records {
    fn in_creation_order(&self, keep: impl Fn(&Job) -> bool) -> Vec<Job> {
        self.order
            .iter()
            .filter_map(|id| self.jobs.get(id))
            .filter(|job| keep(*job))
            .cloned()
            .collect()
    }
}

/// In-process job store. Records live as long as the process does.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: RwLock<Records>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: Job) -> Result<Job, StoreError> {
        let mut records = self.records.write().await;
        if records.jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate(job.id));
        }
        records.order.push(job.id);
        records.jobs.insert(job.id, job.clone());
        tracing::debug!(job_id = %job.id, provider = %job.provider, "Job created");
        Ok(job)
    }

    async fn get_by_uuid(&self, id: &Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.records.read().await.jobs.get(id).cloned())
    }

    async fn list_by_state(&self, state: JobState) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .in_creation_order(move |job| job.state == state))
    }

    async fn list_all(&self) -> Result<Vec<Job>, StoreError> {
        Ok(self.records.read().await.in_creation_order(|_| true))
    }

    async fn persist_state_change(&self, id: &Uuid, state: JobState) -> Result<Job, StoreError> {
        let mut records = self.records.write().await;
        let job = records.jobs.get_mut(id).ok_or(StoreError::NotFound(*id))?;
        let previous = job.state;
        job.state = state;
        job.updated_at = Utc::now();
        tracing::debug!(job_id = %id, from = %previous, to = %state, "Job state changed");
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let store = MemoryJobStore::new();
        let job = Job::new("shell", "true");
        store.create(job.clone()).await.unwrap();

        let err = store.create(job.clone()).await.unwrap_err();
        assert_eq!(err, StoreError::Duplicate(job.id));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn list_by_state_is_oldest_first() {
        let store = MemoryJobStore::new();
        let first = store.create(Job::new("shell", "1")).await.unwrap();
        let second = store.create(Job::new("shell", "2")).await.unwrap();
        store
            .create(Job::new("shell", "3").with_state(JobState::Completed))
            .await
            .unwrap();

        let created = store.list_by_state(JobState::Created).await.unwrap();
        let ids: Vec<Uuid> = created.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);

        let all: Vec<Uuid> = store.list_all().await.unwrap().iter().map(|j| j.id).collect();
        assert_eq!(all.len(), 3);
        assert_eq!(&all[..2], &[first.id, second.id]);
    }

    #[tokio::test]
    async fn persist_state_change_updates_record() {
        let store = MemoryJobStore::new();
        let job = store.create(Job::new("shell", "true")).await.unwrap();

        let updated = store
            .persist_state_change(&job.id, JobState::Queued)
            .await
            .unwrap();
        assert_eq!(updated.state, JobState::Queued);
        assert!(updated.updated_at >= job.updated_at);

        let fetched = store.get_by_uuid(&job.id).await.unwrap().unwrap();
        assert_eq!(fetched.state, JobState::Queued);
    }

    #[tokio::test]
    async fn persist_state_change_unknown_id() {
        let store = MemoryJobStore::new();
        let id = Uuid::new_v4();
        let err = store
            .persist_state_change(&id, JobState::Canceled)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound(id));
    }
}
