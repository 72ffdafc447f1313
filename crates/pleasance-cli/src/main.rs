//! Pleasance CLI — entry point.
//!
//! # Commands
//!
//! - `pleasance health` — probe the LLM proxy
//! - `pleasance generate [N]` — generate sections for up to N queued subjects
//! - `pleasance review [N]` — review sections of up to N processed subjects
//! - `pleasance worker [--batch-size N]` — drain the queue batch by batch
//! - `pleasance job [--file PATH]` — run one job envelope (file or stdin)
//! - `pleasance status` — show configuration and chains

mod commands;
mod helpers;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pleasance_catalog::CatalogClient;
use pleasance_core::config::{load_config, Config};
use pleasance_engine::{BatchOrchestrator, ContentGenerator, JobDispatcher, QueueWorker};
use pleasance_providers::{ChainRegistry, FallbackExecutor, ProxyClient};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Pleasance — encyclopedia content generation through an LLM proxy
#[derive(Parser)]
#[command(name = "pleasance", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.pleasance/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    logs: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the LLM proxy is reachable
    Health,

    /// Generate all sections for queued subjects
    Generate {
        /// Number of subjects to take from the queue
        #[arg(default_value_t = 10)]
        count: usize,
    },

    /// Review existing sections of processed subjects
    Review {
        /// Number of subjects to review
        #[arg(default_value_t = 5)]
        count: usize,
    },

    /// Process the queue until it is empty
    Worker {
        /// Subjects per batch (default: batch.size from config)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Run a single job envelope and print the result
    Job {
        /// Read the envelope from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show configuration and chains
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.logs, cli.json_logs);

    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Health => commands::health(&Engine::build(&config)?).await,
        Commands::Generate { count } => commands::generate(&Engine::build(&config)?, count).await,
        Commands::Review { count } => commands::review(&Engine::build(&config)?, count).await,
        Commands::Worker { batch_size } => {
            let batch_size = batch_size.unwrap_or(config.batch.size);
            commands::worker(&Engine::build(&config)?, batch_size).await
        }
        Commands::Job { file } => commands::job(&Engine::build(&config)?, file.as_deref()).await,
        Commands::Status => status::run(&config, cli.config.as_deref()),
    }
}

// ─────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────

/// Everything a command may need, built once from the configuration.
pub struct Engine {
    pub orchestrator: Arc<BatchOrchestrator>,
    pub worker: QueueWorker,
    pub dispatcher: Arc<JobDispatcher>,
    pub has_credentials: bool,
}

impl Engine {
    pub fn build(config: &Config) -> Result<Self> {
        let proxy = ProxyClient::new(&config.proxy).context("failed to create proxy client")?;
        let chains = ChainRegistry::from_config(&config.chains);
        let executor = FallbackExecutor::new(Arc::new(proxy), Arc::new(chains));

        let generator = ContentGenerator::from_config(executor, config);
        let orchestrator = Arc::new(BatchOrchestrator::from_config(
            Arc::new(generator),
            &config.batch,
        ));

        let catalog =
            CatalogClient::new(&config.catalog).context("failed to create content API client")?;

        Ok(Self {
            worker: QueueWorker::new(catalog, Arc::clone(&orchestrator)),
            dispatcher: Arc::new(JobDispatcher::new(Arc::clone(&orchestrator))),
            orchestrator,
            has_credentials: config.catalog.has_credentials(),
        })
    }
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("pleasance=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    }
}
