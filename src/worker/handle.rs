use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::scheduler::Job;

/// One running job's execution.
///
/// A handle owns the task that runs the job. It reports its own terminal
/// state (`completed` / `failed`) to the store when execution ends on its
/// own; when stopped through [`request_cancel`](Self::request_cancel) it
/// leaves the terminal write to the caller.
#[async_trait]
pub trait ExecutionHandle: Send + Sync {
    /// Begin execution on a separate task. Must not block.
    fn start(&self);

    /// Ask the execution to stop. Cooperative and non-blocking.
    fn request_cancel(&self);

    /// Wait until execution has ended, up to `timeout`.
    /// Returns false if the execution was still running when the timeout elapsed.
    async fn await_termination(&self, timeout: Duration) -> bool;

    /// True from `start` until the execution has ended.
    fn is_executing(&self) -> bool;

    fn job(&self) -> &Job;
}

/// Builds a fresh handle for every dispatched job.
pub trait HandleFactory: Send + Sync {
    fn create(&self, job: Job) -> Result<Arc<dyn ExecutionHandle>>;
}
