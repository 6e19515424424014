use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::error::{RestJobError, Result};
use crate::scheduler::{Job, JobState};
use crate::store::JobStore;
use crate::worker::{ExecutionHandle, HandleFactory};

/// Provider name the shell executor is registered under by default.
pub const SHELL_PROVIDER: &str = "shell";

/// Result of running one payload
#[derive(Debug)]
pub struct ExecutionResult {
    pub job_id: Uuid,
    pub state: JobState,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub error: Option<String>,
}

/// Runs job payloads as shell commands in child processes.
#[derive(Clone)]
pub struct ShellExecutor {
    config: ExecutorConfig,
    store: Arc<dyn JobStore>,
}

impl ShellExecutor {
    pub fn new(config: ExecutorConfig, store: Arc<dyn JobStore>) -> Self {
        Self { config, store }
    }

    /// Run `payload` to completion and collect its output.
    pub async fn run(&self, job_id: Uuid, payload: &str) -> ExecutionResult {
        let result = match self.spawn(job_id, payload) {
            Ok(child) => child.wait_with_output().await,
            Err(e) => Err(e),
        };
        Self::process_output(job_id, result)
    }

    /// Like [`run`](Self::run), but gives up once `cancel` fires.
    ///
    /// The payload runs in its own process group and the whole group is killed
    /// on cancellation, so processes the shell forked stop with it.
    /// Returns `None` when cancelled.
    pub async fn run_until_cancelled(
        &self,
        job_id: Uuid,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Option<ExecutionResult> {
        let child = match self.spawn(job_id, payload) {
            Ok(child) => child,
            Err(e) => return Some(Self::process_output(job_id, Err(e))),
        };
        let pid = child.id();

        tokio::select! {
            result = child.wait_with_output() => Some(Self::process_output(job_id, result)),
            _ = cancel.cancelled() => {
                if let Some(pid) = pid {
                    kill_process_group(job_id, pid);
                }
                None
            }
        }
    }

    fn spawn(&self, job_id: Uuid, payload: &str) -> std::io::Result<Child> {
        tracing::info!(job_id = %job_id, shell = %self.config.shell, "Executing job");

        Command::new(&self.config.shell)
            .arg("-c")
            .arg(payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
    }

    /// True if the configured shell exists, either as a path or on `PATH`.
    fn shell_available(&self) -> bool {
        let shell = Path::new(&self.config.shell);
        if shell.components().count() > 1 {
            return shell.is_file();
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(shell).is_file()))
            .unwrap_or(false)
    }

    fn process_output(
        job_id: Uuid,
        result: std::result::Result<std::process::Output, std::io::Error>,
    ) -> ExecutionResult {
        match result {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let exit_code = output.status.code();

                let (state, error) = if output.status.success() {
                    (JobState::Completed, None)
                } else if stderr.is_empty() {
                    (JobState::Failed, Some(format!("Exit code: {:?}", exit_code)))
                } else {
                    (JobState::Failed, Some(stderr))
                };

                tracing::info!(
                    job_id = %job_id,
                    state = %state,
                    exit_code = ?exit_code,
                    "Job finished"
                );

                ExecutionResult {
                    job_id,
                    state,
                    exit_code,
                    output: if stdout.is_empty() { None } else { Some(stdout) },
                    error,
                }
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Job execution failed");
                ExecutionResult {
                    job_id,
                    state: JobState::Failed,
                    exit_code: None,
                    output: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn kill_process_group(job_id: Uuid, pid: u32) {
    let Ok(pgid) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => tracing::debug!(job_id = %job_id, pgid, "Killed job process group"),
        // Already gone
        Err(Errno::ESRCH) => {}
        Err(e) => {
            tracing::warn!(job_id = %job_id, pgid, error = %e, "Failed to kill job process group")
        }
    }
}

impl HandleFactory for ShellExecutor {
    fn create(&self, job: Job) -> Result<Arc<dyn ExecutionHandle>> {
        if !self.shell_available() {
            return Err(RestJobError::HandleCreation {
                job_id: job.id,
                reason: format!("shell {:?} not found", self.config.shell),
            });
        }
        Ok(Arc::new(ProcessHandle::new(job, self.clone())))
    }
}

/// Handle for one payload running under [`ShellExecutor`].
pub struct ProcessHandle {
    job: Job,
    executor: ShellExecutor,
    cancel: CancellationToken,
    started: AtomicBool,
    executing: Arc<AtomicBool>,
    done: Arc<watch::Sender<bool>>,
}

impl ProcessHandle {
    fn new(job: Job, executor: ShellExecutor) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            job,
            executor,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            executing: Arc::new(AtomicBool::new(false)),
            done: Arc::new(done),
        }
    }
}

#[async_trait]
impl ExecutionHandle for ProcessHandle {
    fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.executing.store(true, Ordering::SeqCst);

        let job_id = self.job.id;
        let payload = self.job.payload.clone();
        let executor = self.executor.clone();
        let cancel = self.cancel.clone();
        let executing = self.executing.clone();
        let done = self.done.clone();

        tokio::spawn(async move {
            match executor.run_until_cancelled(job_id, &payload, &cancel).await {
                Some(result) => {
                    if let Some(ref output) = result.output {
                        tracing::debug!(
                            job_id = %job_id,
                            bytes = output.len(),
                            "Job produced output"
                        );
                    }
                    if result.state == JobState::Failed {
                        tracing::warn!(
                            job_id = %job_id,
                            exit_code = ?result.exit_code,
                            error = result.error.as_deref().unwrap_or(""),
                            "Job failed"
                        );
                    }
                    if let Err(e) = executor
                        .store
                        .persist_state_change(&job_id, result.state)
                        .await
                    {
                        tracing::error!(job_id = %job_id, error = %e, "Failed to record job result");
                    }
                }
                None => {
                    tracing::info!(job_id = %job_id, "Job execution cancelled");
                }
            }

            executing.store(false, Ordering::SeqCst);
            done.send_replace(true);
        });
    }

    fn request_cancel(&self) {
        self.cancel.cancel();
    }

    async fn await_termination(&self, timeout: Duration) -> bool {
        if !self.started.load(Ordering::SeqCst) {
            return true;
        }
        let mut rx = self.done.subscribe();
        tokio::time::timeout(timeout, async move {
            rx.wait_for(|finished| *finished).await.is_ok()
        })
        .await
        .unwrap_or(false)
    }

    fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    fn job(&self) -> &Job {
        &self.job
    }
}
