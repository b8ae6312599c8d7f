//! `queuectl`: enqueue shell commands, run workers against them, inspect
//! and recover from failures.

mod commands;
mod pidfile;

use anyhow::Result;
use clap::{Parser, Subcommand};
use queuectl_core::{ConfigManager, QueueManager, RuntimeConfig, Store};

#[derive(Parser)]
#[command(name = "queuectl", version, about = "A durable, multi-process background job queue", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a new job for processing.
    Enqueue(commands::enqueue::EnqueueArgs),
    /// Manage worker processes that execute jobs.
    Worker {
        #[command(subcommand)]
        command: commands::worker::WorkerCommand,
    },
    /// Show queue status and worker information.
    Status,
    /// List jobs with optional filtering and sorting.
    List(commands::list::ListArgs),
    /// Manage the Dead Letter Queue.
    Dlq {
        #[command(subcommand)]
        command: commands::dlq::DlqCommand,
    },
    /// Read and write runtime configuration.
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommand,
    },
}

/// Opens the default-location store to read configuration, then reopens at
/// `config.db_path` for the command's actual work. Mirrors the reference
/// CLI's two-stage `ConfigManager(Database('.data/queuectl.db'))` dance.
pub(crate) async fn bootstrap() -> Result<(QueueManager, RuntimeConfig)> {
    let bootstrap_store = Store::open(queuectl_core::DEFAULT_DB_PATH).await?;
    let config = ConfigManager::new(&bootstrap_store).runtime_config().await?;

    let store = if config.db_path == queuectl_core::DEFAULT_DB_PATH {
        bootstrap_store
    } else {
        Store::open(&config.db_path).await?
    };
    Ok((QueueManager::new(store), config))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Enqueue(args) => commands::enqueue::run(args).await,
        Commands::Worker { command } => commands::worker::run(command).await,
        Commands::Status => commands::status::run().await,
        Commands::List(args) => commands::list::run(args).await,
        Commands::Dlq { command } => commands::dlq::run(command).await,
        Commands::Config { command } => commands::config::run(command).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
