use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{RestJobError, Result};

/// Limits and timers for the job manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Maximum number of jobs executing at once. Must be at least 1.
    pub max_concurrent_jobs: usize,
    /// Maximum number of admitted jobs waiting for a slot.
    /// Zero means nothing is ever admitted.
    pub max_queue_size: usize,
    /// How often the scheduler polls the store and dispatches.
    pub queue_check_interval: Duration,
    /// How often finished executions are evicted from the pool.
    pub cleanup_interval: Duration,
    /// Pause between signalling a running job and waiting for it to exit.
    pub cancel_grace_period: Duration,
    /// Upper bound on the wait for a cancelled job to exit.
    pub cancel_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_queue_size: 100,
            queue_check_interval: Duration::from_secs(15),
            cleanup_interval: Duration::from_secs(5),
            cancel_grace_period: Duration::from_secs(2),
            cancel_timeout: Duration::from_secs(30),
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(RestJobError::InvalidConfig(
                "max_concurrent_jobs must be at least 1".to_string(),
            ));
        }
        if self.queue_check_interval.is_zero() {
            return Err(RestJobError::InvalidConfig(
                "queue_check_interval must be non-zero".to_string(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(RestJobError::InvalidConfig(
                "cleanup_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the shell command executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Shell used to run payloads as `<shell> -c <payload>`.
    pub shell: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub manager: ManagerConfig,
    pub executor: ExecutorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            manager: ManagerConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_manager(mut self, manager: ManagerConfig) -> Self {
        self.manager = manager;
        self
    }
}
