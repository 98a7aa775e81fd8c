//! Orchestrator CLI
//!
//! Runs the sync scheduler as a service, or performs one-off orchestration
//! runs and sync passes.

use anyhow::Context;
use clap::{Parser, Subcommand};
use orchestrator::config::{self, AppConfig, LogFormat};
use orchestrator::{JobKind, Platform};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Multi-agent orchestrator and n8n to Langfuse trace sync", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to the configuration file (overrides the default search)
    #[arg(short, long, env = "CONFIG_PATH", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sync scheduler and run until interrupted
    Serve,

    /// Send one request to the agent roster and print the run as JSON
    Ask {
        /// User message
        message: String,
        /// Session id (generated when omitted)
        #[arg(short, long)]
        session_id: Option<String>,
        /// User id
        #[arg(short, long)]
        user_id: Option<String>,
    },

    /// Run a single pass of one sync job: discover, collect or export
    Sync {
        job: JobKind,
    },

    /// Print the number of records waiting for trace export
    Pending,

    /// Register a workflow as an execution source
    AddSource {
        /// Workflow id on the n8n side
        id: String,
        /// Display name
        #[arg(short, long, default_value = "")]
        name: String,
        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_file(path),
        None => config::load(),
    }
    .context("Failed to load configuration")?;
    init_tracing(&config);

    let platform = Platform::from_config(&config)
        .await
        .context("Failed to initialize platform")?;

    match cli.command {
        Commands::Serve => serve(&platform).await?,
        Commands::Ask {
            message,
            session_id,
            user_id,
        } => {
            let run = platform.run_orchestration(&message, session_id, user_id).await?;
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        Commands::Sync { job } => {
            let report = platform.run_job(job).await?;
            println!("{}: {}", job, report);
        }
        Commands::Pending => {
            println!("{}", platform.unprocessed_count().await?);
        }
        Commands::AddSource {
            id,
            name,
            description,
        } => {
            let source = platform
                .register_source(&id, &name, description.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&source)?);
        }
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    match config.log.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Fmt => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn serve(platform: &Platform) -> anyhow::Result<()> {
    tracing::info!(jobs = ?platform.scheduler().job_names(), "Starting sync service");
    platform.start_scheduler().await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    platform.stop_scheduler().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
