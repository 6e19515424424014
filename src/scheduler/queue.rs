use std::collections::VecDeque;

use uuid::Uuid;

use crate::scheduler::job::Job;

/// Bounded FIFO of admitted jobs waiting for a worker slot.
#[derive(Debug)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
    max_jobs: usize,
}

impl JobQueue {
    pub fn with_capacity(max_jobs: usize) -> Self {
        Self {
            jobs: VecDeque::new(),
            max_jobs,
        }
    }

    /// Append a job to the tail. Returns false if the queue is at capacity.
    pub fn push(&mut self, job: Job) -> bool {
        if self.is_full() {
            return false;
        }
        self.jobs.push_back(job);
        true
    }

    /// The oldest admitted job, left in place.
    pub fn front(&self) -> Option<&Job> {
        self.jobs.front()
    }

    /// Remove and return the oldest admitted job.
    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    /// Remove the job with the given id, wherever it sits in the queue.
    pub fn remove(&mut self, id: &Uuid) -> Option<Job> {
        let index = self.jobs.iter().position(|j| j.id == *id)?;
        self.jobs.remove(index)
    }

    pub fn get(&self, id: &Uuid) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == *id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.get(id).is_some()
    }

    /// Snapshot of queued jobs, head first.
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.max_jobs
    }

    pub fn capacity(&self) -> usize {
        self.max_jobs
    }
}
