use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use restjob::config::{ExecutorConfig, ManagerConfig, ServerConfig};
use restjob::server::Server;
use restjob::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "restjob")]
#[command(version)]
#[command(about = "A job queue that runs a bounded number of submitted jobs at once")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the job server
    Server(ServerArgs),
}

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Address to bind the HTTP API to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on for HTTP
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Maximum number of jobs executing at once
    #[arg(long, default_value = "2")]
    max_concurrent_jobs: usize,

    /// Maximum number of jobs waiting in the queue
    #[arg(long, default_value = "100")]
    max_queue_size: usize,

    /// Seconds between polls for new jobs
    #[arg(long, default_value = "15")]
    queue_check_interval_secs: u64,

    /// Seconds between sweeps for finished jobs
    #[arg(long, default_value = "5")]
    cleanup_interval_secs: u64,

    /// Milliseconds to wait after signalling a running job before waiting on it
    #[arg(long, default_value = "2000")]
    cancel_grace_ms: u64,

    /// Seconds to wait for a cancelled job to exit
    #[arg(long, default_value = "30")]
    cancel_timeout_secs: u64,

    /// Shell used to run job payloads
    #[arg(long, default_value = "sh")]
    shell: String,
}

impl ServerArgs {
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let listen_addr: SocketAddr = format!("{}:{}", self.host, self.port).parse()?;
        Ok(ServerConfig {
            listen_addr,
            manager: ManagerConfig {
                max_concurrent_jobs: self.max_concurrent_jobs,
                max_queue_size: self.max_queue_size,
                queue_check_interval: Duration::from_secs(self.queue_check_interval_secs),
                cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
                cancel_grace_period: Duration::from_millis(self.cancel_grace_ms),
                cancel_timeout: Duration::from_secs(self.cancel_timeout_secs),
            },
            executor: ExecutorConfig { shell: self.shell },
        })
    }
}

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = args.into_config()?;
    tracing::info!(
        addr = %config.listen_addr,
        max_concurrent_jobs = config.manager.max_concurrent_jobs,
        max_queue_size = config.manager.max_queue_size,
        "Starting restjob server"
    );

    let server = Server::new(config)?;
    let shutdown = install_shutdown_handler();
    server.run(shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => {
            run_server(server_args).await?;
        }
    }

    Ok(())
}
