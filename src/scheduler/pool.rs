use std::sync::Arc;

use uuid::Uuid;

use crate::scheduler::job::Job;
use crate::worker::ExecutionHandle;

/// A dispatched job and the handle running it.
#[derive(Clone)]
pub struct PoolEntry {
    pub job: Job,
    pub handle: Arc<dyn ExecutionHandle>,
}

impl std::fmt::Debug for PoolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolEntry")
            .field("job_id", &self.job.id)
            .field("executing", &self.handle.is_executing())
            .finish()
    }
}

/// Bounded set of running jobs, one slot per concurrently executing handle.
#[derive(Debug)]
pub struct WorkerPool {
    entries: Vec<PoolEntry>,
    max_slots: usize,
}

impl WorkerPool {
    pub fn with_slots(max_slots: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max_slots),
            max_slots,
        }
    }

    /// Occupy a slot. Returns the entry back if every slot is taken.
    pub fn insert(&mut self, entry: PoolEntry) -> std::result::Result<(), PoolEntry> {
        if !self.has_free_slot() {
            return Err(entry);
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<PoolEntry> {
        let index = self.entries.iter().position(|e| e.job.id == *id)?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, id: &Uuid) -> Option<&PoolEntry> {
        self.entries.iter().find(|e| e.job.id == *id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.get(id).is_some()
    }

    /// Drop every entry whose handle has stopped executing and return the evicted job ids.
    pub fn evict_finished(&mut self) -> Vec<Uuid> {
        let mut evicted = Vec::new();
        self.entries.retain(|entry| {
            let executing = entry.handle.is_executing();
            if !executing {
                evicted.push(entry.job.id);
            }
            executing
        });
        evicted
    }

    /// Snapshot of the jobs currently occupying slots, in dispatch order.
    pub fn jobs(&self) -> Vec<Job> {
        self.entries.iter().map(|e| e.job.clone()).collect()
    }

    pub fn has_free_slot(&self) -> bool {
        self.entries.len() < self.max_slots
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_slots
    }
}
