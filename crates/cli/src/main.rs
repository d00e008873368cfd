//! GPU cluster top
//!
//! A command-line tool showing allocation and live usage of CPUs, memory
//! and GPUs (including fractionally shared GPUs) for every node of a
//! Kubernetes cluster.

mod client;
mod cluster;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::top::{self, TopNodeOptions};
use output::{LogFormat, OutputFormat};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// GPU cluster top
#[derive(Parser)]
#[command(name = "gtop")]
#[command(author, version, about = "Node and GPU resource usage of a Kubernetes cluster", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Log format for diagnostics written to stderr
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show resource usage
    #[command(subcommand)]
    Top(TopCommands),

    /// Print the version
    Version,
}

#[derive(Subcommand)]
pub enum TopCommands {
    /// Show allocation and usage of every node
    Node(TopNodeArgs),
}

#[derive(Args)]
pub struct TopNodeArgs {
    /// Skip the metrics backend and show allocation only
    #[arg(long)]
    pub no_metrics: bool,

    /// Show a per-GPU table for each node
    #[arg(long)]
    pub details: bool,

    /// Prometheus base URL (skips in-cluster service discovery)
    #[arg(long, env = "GTOP_PROMETHEUS_URL")]
    pub prometheus_url: Option<String>,
}

fn init_tracing(verbose: bool, log_format: LogFormat) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    match log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let config = config::Config::load()?;
    let format = cli.format.or(config.default_format).unwrap_or_default();

    match cli.command {
        Commands::Top(TopCommands::Node(args)) => {
            let options = TopNodeOptions {
                no_metrics: args.no_metrics,
                details: args.details,
                prometheus_url: args.prometheus_url,
            };
            top::top_nodes(&config, cli.kubeconfig.as_deref(), options, format).await?;
        }
        Commands::Version => {
            println!("gtop {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
