use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ManagerConfig;
use crate::error::{RestJobError, Result, StoreError};
use crate::scheduler::job::{Job, JobState};
use crate::scheduler::pool::{PoolEntry, WorkerPool};
use crate::scheduler::queue::JobQueue;
use crate::store::JobStore;
use crate::worker::{ExecutionHandle, HandleFactory};

/// What one scheduler tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub admitted: usize,
    pub dispatched: Option<Uuid>,
}

/// Where a cancelled job was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Removed from the queue before it ever ran.
    Dequeued,
    /// Was running; its execution has been stopped and its slot released.
    Stopped,
    /// Neither queued nor running. The state was overwritten anyway.
    NotTracked,
}

#[derive(Debug, Clone)]
pub struct Cancellation {
    pub outcome: CancelOutcome,
    pub job: Job,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStats {
    pub queued: usize,
    pub running: usize,
    pub max_queue_size: usize,
    pub max_concurrent_jobs: usize,
}

/// Queue and pool share one lock so a job id is never in both.
#[derive(Debug)]
struct ManagerState {
    queue: JobQueue,
    pool: WorkerPool,
}

/// Admits pending jobs from the store into a bounded queue, runs a bounded
/// number of them at once, and reclaims slots when executions end.
///
/// The manager does nothing on its own until [`start`](Self::start) spawns its
/// two periodic tasks; [`tick`](Self::tick) and [`sweep`](Self::sweep) can also
/// be driven directly.
pub struct JobManager {
    config: ManagerConfig,
    store: Arc<dyn JobStore>,
    factory: Arc<dyn HandleFactory>,
    state: Mutex<ManagerState>,
}

impl JobManager {
    pub fn new(
        config: ManagerConfig,
        store: Arc<dyn JobStore>,
        factory: Arc<dyn HandleFactory>,
    ) -> Result<Self> {
        config.validate()?;

        tracing::debug!(
            max_concurrent_jobs = config.max_concurrent_jobs,
            max_queue_size = config.max_queue_size,
            queue_check_interval = ?config.queue_check_interval,
            cleanup_interval = ?config.cleanup_interval,
            cancel_grace_period = ?config.cancel_grace_period,
            cancel_timeout = ?config.cancel_timeout,
            "Initializing job manager"
        );

        let state = ManagerState {
            queue: JobQueue::with_capacity(config.max_queue_size),
            pool: WorkerPool::with_slots(config.max_concurrent_jobs),
        };

        Ok(Self {
            config,
            store,
            factory,
            state: Mutex::new(state),
        })
    }

    /// Spawn the scheduler loop and the cleanup sweep.
    ///
    /// Both loops run their first pass immediately and stop once `shutdown`
    /// is cancelled.
    pub fn start(self: &Arc<Self>, shutdown: CancellationToken) -> ManagerTasks {
        let manager = self.clone();
        let token = shutdown.clone();
        let scheduler = tokio::spawn(async move {
            manager.scheduler_loop(token).await;
        });

        let manager = self.clone();
        let cleanup = tokio::spawn(async move {
            manager.cleanup_loop(shutdown).await;
        });

        ManagerTasks { scheduler, cleanup }
    }

    async fn scheduler_loop(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.queue_check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Scheduler loop stopped");
                    break;
                }
                _ = interval.tick() => {
                    tracing::debug!("Polling for new jobs");
                    match self.tick().await {
                        Ok(report) => {
                            if report.admitted > 0 || report.dispatched.is_some() {
                                tracing::debug!(
                                    admitted = report.admitted,
                                    dispatched = ?report.dispatched,
                                    "Scheduler tick"
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Scheduler tick failed");
                        }
                    }
                }
            }
        }
    }

    async fn cleanup_loop(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.cleanup_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Cleanup sweep stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Admit one job to the tail of the queue.
    ///
    /// Returns `false` without touching the job when it is already queued or
    /// running, or when the queue is full. A full queue is normal backpressure:
    /// the job stays pending in the store and is offered again next tick.
    pub async fn admit(&self, job: Job) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.admit_locked(&mut state, job).await
    }

    async fn admit_locked(&self, state: &mut ManagerState, job: Job) -> Result<bool> {
        if state.queue.contains(&job.id) || state.pool.contains(&job.id) {
            tracing::debug!(job_id = %job.id, "Job already tracked, skipping admission");
            return Ok(false);
        }
        if state.queue.is_full() {
            tracing::debug!(job_id = %job.id, "Job queue at capacity, job left pending");
            return Ok(false);
        }

        let queued = self
            .store
            .persist_state_change(&job.id, JobState::Queued)
            .await?;
        tracing::debug!(job_id = %queued.id, "Adding job to queue");
        state.queue.push(queued);
        Ok(true)
    }

    /// One scheduler pass: admit every pending job the store reports, then
    /// dispatch at most one queued job.
    ///
    /// The whole pass, including the store poll, runs under the state lock so
    /// it cannot interleave with a cancellation.
    pub async fn tick(&self) -> Result<TickReport> {
        let mut state = self.state.lock().await;
        let mut report = TickReport::default();

        for pending in JobState::PENDING {
            for job in self.store.list_by_state(pending).await? {
                if self.admit_locked(&mut state, job).await? {
                    report.admitted += 1;
                }
            }
        }

        report.dispatched = self.dispatch_locked(&mut state).await?;
        Ok(report)
    }

    /// The head job leaves the queue only after the store has moved it out of
    /// `queued`, so a failed write leaves it at the head for the next tick.
    async fn dispatch_locked(&self, state: &mut ManagerState) -> Result<Option<Uuid>> {
        if !state.pool.has_free_slot() {
            return Ok(None);
        }
        let Some(job) = state.queue.front().cloned() else {
            return Ok(None);
        };

        let handle = match self.factory.create(job.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    error = %e,
                    "Failed to create execution handle"
                );
                self.store
                    .persist_state_change(&job.id, JobState::Failed)
                    .await?;
                state.queue.pop();
                return Err(e);
            }
        };

        let running = self
            .store
            .persist_state_change(&job.id, JobState::Running)
            .await?;
        state.queue.pop();
        let job_id = running.id;

        state
            .pool
            .insert(PoolEntry {
                job: running,
                handle: handle.clone(),
            })
            .map_err(|_| RestJobError::Internal(format!("no free worker slot for job {}", job_id)))?;
        handle.start();

        tracing::info!(job_id = %job_id, provider = %handle.job().provider, "Job dispatched");
        Ok(Some(job_id))
    }

    /// Release the slot of every execution that has ended, whatever its outcome.
    /// Returns how many slots were freed.
    pub async fn sweep(&self) -> usize {
        let evicted = self.state.lock().await.pool.evict_finished();
        for job_id in &evicted {
            tracing::debug!(job_id = %job_id, "Execution finished, slot released");
        }
        evicted.len()
    }

    /// Stop a job wherever it is and mark it canceled.
    ///
    /// A queued job is dropped from the queue. A running job is signalled,
    /// given the grace period, then waited on for at most the cancel timeout;
    /// neither wait holds the state lock. If it still has not exited, this
    /// returns [`RestJobError::CancelTimedOut`] and leaves its state alone.
    ///
    /// The `canceled` state is written even when the job is neither queued nor
    /// running, so it overwrites a job that has already completed or failed.
    pub async fn cancel(&self, id: &Uuid) -> Result<Cancellation> {
        tracing::debug!(job_id = %id, "Canceling job");

        let handle = {
            let mut state = self.state.lock().await;
            match state.pool.get(id).map(|entry| entry.handle.clone()) {
                Some(handle) => {
                    handle.request_cancel();
                    handle
                }
                None => {
                    // Dequeue only once the canceled state is stored
                    let job = self.mark_canceled(id).await?;
                    let outcome = if state.queue.remove(id).is_some() {
                        CancelOutcome::Dequeued
                    } else {
                        CancelOutcome::NotTracked
                    };
                    tracing::info!(job_id = %id, outcome = ?outcome, "Job canceled");
                    return Ok(Cancellation { outcome, job });
                }
            }
        };

        self.await_stopped(id, handle.as_ref()).await?;

        let mut state = self.state.lock().await;
        let job = self.mark_canceled(id).await?;
        state.pool.remove(id);
        tracing::info!(job_id = %id, outcome = ?CancelOutcome::Stopped, "Job canceled");
        Ok(Cancellation {
            outcome: CancelOutcome::Stopped,
            job,
        })
    }

    async fn await_stopped(&self, id: &Uuid, handle: &dyn ExecutionHandle) -> Result<()> {
        tokio::time::sleep(self.config.cancel_grace_period).await;
        if handle.await_termination(self.config.cancel_timeout).await {
            return Ok(());
        }
        tracing::warn!(
            job_id = %id,
            timeout = ?self.config.cancel_timeout,
            "Job did not stop after cancellation"
        );
        Err(RestJobError::CancelTimedOut {
            job_id: *id,
            timeout: self.config.cancel_timeout,
        })
    }

    async fn mark_canceled(&self, id: &Uuid) -> Result<Job> {
        self.store
            .persist_state_change(id, JobState::Canceled)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(id) => RestJobError::JobNotFound(id),
                other => other.into(),
            })
    }

    /// Cancel everything still queued or running. Used when the service stops.
    /// Returns how many jobs were canceled.
    pub async fn shutdown(&self) -> usize {
        let ids: Vec<Uuid> = {
            let state = self.state.lock().await;
            let mut ids: Vec<Uuid> = state.queue.jobs().iter().map(|job| job.id).collect();
            ids.extend(state.pool.jobs().iter().map(|job| job.id));
            ids
        };

        let mut canceled = 0;
        for id in ids {
            match self.cancel(&id).await {
                Ok(_) => canceled += 1,
                Err(e) => {
                    tracing::warn!(job_id = %id, error = %e, "Failed to cancel job on shutdown")
                }
            }
        }
        canceled
    }

    /// Jobs currently occupying a worker slot, in dispatch order.
    pub async fn running_jobs(&self) -> Vec<Job> {
        self.state.lock().await.pool.jobs()
    }

    /// Jobs waiting for a slot, oldest admitted first.
    pub async fn queued_jobs(&self) -> Vec<Job> {
        self.state.lock().await.queue.jobs()
    }

    pub async fn running_job(&self, id: &Uuid) -> Option<Job> {
        self.state.lock().await.pool.get(id).map(|e| e.job.clone())
    }

    pub async fn queued_job(&self, id: &Uuid) -> Option<Job> {
        self.state.lock().await.queue.get(id).cloned()
    }

    pub async fn is_running(&self, id: &Uuid) -> bool {
        self.state.lock().await.pool.contains(id)
    }

    pub async fn is_queued(&self, id: &Uuid) -> bool {
        self.state.lock().await.queue.contains(id)
    }

    pub async fn stats(&self) -> ManagerStats {
        let state = self.state.lock().await;
        ManagerStats {
            queued: state.queue.len(),
            running: state.pool.len(),
            max_queue_size: state.queue.capacity(),
            max_concurrent_jobs: state.pool.capacity(),
        }
    }
}

/// The two periodic tasks spawned by [`JobManager::start`].
pub struct ManagerTasks {
    scheduler: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

impl ManagerTasks {
    /// Wait for both loops to exit. They exit once the shutdown token passed
    /// to [`JobManager::start`] is cancelled.
    pub async fn join(self) {
        if let Err(e) = self.scheduler.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }
        if let Err(e) = self.cleanup.await {
            tracing::error!(error = %e, "Cleanup task failed");
        }
    }
}
