pub mod job;
pub mod manager;
pub mod pool;
pub mod queue;

pub use job::{Job, JobState};
pub use manager::{
    CancelOutcome, Cancellation, JobManager, ManagerStats, ManagerTasks, TickReport,
};
pub use pool::{PoolEntry, WorkerPool};
pub use queue::JobQueue;
