//! # Command line.
//!
//! ```text
//! topovisor run    [-c config.yml]                       supervise the topology
//! topovisor check  [-c config.yml]                       load and validate, then exit
//! topovisor push   [-c config.yml] --queue <name> <data> enqueue into a spool queue
//! topovisor worker  -c <path> --name <name>              (spawned by `run`)
//! ```
//!
//! Embedders with their own targets call [`run`] from their `main` with their own
//! registries; the spawned workers re-enter the same binary and see the same tables.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::SupervisorBuilder;
use crate::strategy::Strategies;
use crate::targets::Targets;
use crate::topology::Topology;

/// Runs a topology of worker processes and keeps them alive.
#[derive(Debug, Parser)]
#[command(name = "topovisor", version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Supervise every worker of the topology until SIGINT/SIGTERM/SIGQUIT (SIGUSR1 reloads).
    Run {
        /// Topology file.
        #[arg(short, long, default_value = "config.yml")]
        config: PathBuf,
    },
    /// Load and validate the topology, then exit.
    Check {
        /// Topology file.
        #[arg(short, long, default_value = "config.yml")]
        config: PathBuf,
    },
    /// Enqueue a payload into a spool queue declared in the topology.
    Push {
        /// Topology file.
        #[arg(short, long, default_value = "config.yml")]
        config: PathBuf,
        /// Top-level entry holding the queue.
        #[arg(long)]
        queue: String,
        /// Payload.
        payload: String,
    },
    /// Boot one worker (spawned by `run`).
    #[command(hide = true)]
    Worker {
        /// Topology file.
        #[arg(short, long)]
        config: PathBuf,
        /// Worker name.
        #[arg(long)]
        name: String,
    },
}

/// Parses the command line, installs logging and runs the chosen command.
pub fn run(strategies: Strategies, targets: Targets) -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "cannot start the async runtime");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(execute(cli, strategies, targets)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "topovisor failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn execute(cli: Cli, strategies: Strategies, targets: Targets) -> anyhow::Result<()> {
    match cli.command {
        Command::Run { config } => {
            let supervisor = SupervisorBuilder::load(&config)
                .await?
                .with_strategies(strategies)
                .with_targets(targets)
                .build()
                .with_context(|| format!("invalid topology {}", config.display()))?;
            tracing::info!(
                config = %config.display(),
                workers = supervisor.topology().workers().len(),
                pid = std::process::id(),
                "supervisor started"
            );
            supervisor.run().await?;
            Ok(())
        }
        Command::Check { config } => {
            let topology = Topology::load(&config).await?;
            topology
                .validate(&strategies, &targets)
                .with_context(|| format!("invalid topology {}", config.display()))?;
            println!("{}: {} workers ok", config.display(), topology.workers().len());
            Ok(())
        }
        Command::Push {
            config,
            queue,
            payload,
        } => {
            let topology = Topology::load(&config).await?;
            let id = topology.queue(&queue)?.push(payload).await?;
            println!("{id}");
            Ok(())
        }
        Command::Worker { config, name } => {
            crate::worker::boot(&config, &name, &strategies, &targets).await?;
            Ok(())
        }
    }
}
