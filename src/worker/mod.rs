//! Job execution.
//!
//! - [`ExecutionHandle`]: one running job, with cooperative cancellation and
//!   a bounded wait for termination
//! - [`HandleFactory`]: builds a handle for each dispatched job
//! - [`ShellExecutor`]: runs a job's payload as `sh -c <payload>`
//! - [`ProviderRegistry`]: picks the factory by the job's `provider`
//!
//! # Execution Flow
//!
//! 1. The scheduler pops a job and asks the factory for a handle
//! 2. [`ExecutionHandle::start`] spawns the job on its own task
//! 3. On exit the handle records `completed` or `failed` in the store
//! 4. The cleanup sweep sees `is_executing() == false` and frees the slot

pub mod executor;
pub mod handle;
pub mod registry;

pub use executor::{ExecutionResult, ProcessHandle, ShellExecutor, SHELL_PROVIDER};
pub use handle::{ExecutionHandle, HandleFactory};
pub use registry::ProviderRegistry;
