use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::{self, ApiState};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::scheduler::JobManager;
use crate::store::{JobStore, MemoryJobStore};
use crate::worker::{ProviderRegistry, ShellExecutor, SHELL_PROVIDER};

/// Wires the store, the job manager and the HTTP surface together.
pub struct Server {
    pub config: ServerConfig,
    pub store: Arc<dyn JobStore>,
    pub manager: Arc<JobManager>,
    providers: Vec<String>,
}

impl Server {
    /// Build a server backed by an in-memory store.
    pub fn new(config: ServerConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(MemoryJobStore::new()))
    }

    pub fn with_store(config: ServerConfig, store: Arc<dyn JobStore>) -> Result<Self> {
        let mut registry = ProviderRegistry::new();
        registry.register(
            SHELL_PROVIDER,
            Arc::new(ShellExecutor::new(config.executor.clone(), store.clone())),
        );
        let providers = registry
            .providers()
            .into_iter()
            .map(str::to_string)
            .collect();

        let manager = Arc::new(JobManager::new(
            config.manager.clone(),
            store.clone(),
            Arc::new(registry),
        )?);

        Ok(Self {
            config,
            store,
            manager,
            providers,
        })
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            store: self.store.clone(),
            manager: self.manager.clone(),
            providers: Arc::new(self.providers.clone()),
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// 1. Spawns the scheduler loop and the cleanup sweep
    /// 2. Serves the HTTP API on the configured address
    /// 3. On shutdown, stops accepting requests, waits for both loops to exit
    ///    and cancels every job still queued or running
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the HTTP server fails.
    /// The periodic loops log their own errors.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let tasks = self.manager.start(shutdown.clone());

        let listener = match tokio::net::TcpListener::bind(self.config.listen_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(
                    addr = %self.config.listen_addr,
                    error = %e,
                    "Failed to bind API server"
                );
                shutdown.cancel();
                tasks.join().await;
                return Err(e.into());
            }
        };
        tracing::info!(addr = %self.config.listen_addr, "Starting API server");

        let app = api::router(self.api_state());
        let token = shutdown.clone();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
        if let Err(ref e) = served {
            tracing::error!(error = %e, "API server failed");
            shutdown.cancel();
        }

        tasks.join().await;
        let canceled = self.manager.shutdown().await;
        tracing::info!(canceled, "Job manager stopped");

        served.map_err(Into::into)
    }
}
