//! Neutryx Observe CLI - drives the pricer_observable notification engine
//!
//! # Commands
//!
//! - `neutryx-observe demo` - Quotes -> curve -> instruments under each delivery mode
//! - `neutryx-observe stress --threads N --rounds R` - Race teardown against notification
//! - `neutryx-observe check` - Print the effective configuration
//!
//! # Configuration
//!
//! Settings are merged from (lowest to highest priority) defaults, the TOML
//! file given with `--config`, `NEUTRYX_*` environment variables and the
//! command-line flags below.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pricer_observable::{build_config, CliArgs as ConfigCliArgs};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod market;

pub use error::{CliError, Result};

use commands::stress::StressParams;

/// Neutryx observer/observable engine CLI
#[derive(Parser)]
#[command(name = "neutryx-observe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (TOML format)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initial update mode (enabled, deferring)
    #[arg(long, global = true)]
    mode: Option<String>,

    /// Re-entrancy policy (allow, suppress)
    #[arg(long, global = true)]
    reentrancy: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the quote -> curve -> instrument demonstration
    Demo {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Race observer teardown against notification
    Stress {
        /// Worker threads (defaults to the number of CPUs)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Number of operations to run
        #[arg(short, long, default_value = "10000")]
        rounds: usize,

        /// Number of observables
        #[arg(short, long, default_value = "8")]
        sources: usize,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Check configuration
    Check {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

impl From<&Cli> for ConfigCliArgs {
    fn from(cli: &Cli) -> Self {
        ConfigCliArgs {
            config_file: cli.config.clone(),
            mode: cli.mode.clone(),
            reentrancy: cli.reentrancy.clone(),
            log_level: cli.log_level.clone(),
        }
    }
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = build_config(&ConfigCliArgs::from(&cli))?;
    if cli.verbose {
        config.log_level = pricer_observable::LogLevel::Debug;
    }

    init_tracing(config.log_level.as_filter_str());

    if cli.verbose {
        info!("Verbose mode enabled");
    }
    info!(
        initial_mode = %config.initial_mode,
        reentrancy = %config.reentrancy,
        log_level = %config.log_level,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Demo { format } => commands::demo::run(&config, &format),
        Commands::Stress {
            threads,
            rounds,
            sources,
            format,
        } => {
            let defaults = StressParams::default();
            let params = StressParams {
                threads: threads.unwrap_or(defaults.threads),
                rounds,
                sources,
                ..defaults
            };
            commands::stress::run(&config, params, &format)
        }
        Commands::Check { format } => commands::check::run(&config, &format),
    }
}
