//! Check command implementation
//!
//! Prints the effective configuration after merging file, environment and
//! command-line sources.

use pricer_observable::{ObservableConfig, ObservableSettings};
use serde::Serialize;
use tracing::info;

use super::OutputFormat;
use crate::Result;

#[derive(Debug, Serialize)]
struct CheckReport {
    version: &'static str,
    initial_mode: String,
    reentrancy: String,
    log_level: String,
    default_threads: usize,
}

impl CheckReport {
    fn new(config: &ObservableConfig) -> Self {
        let settings = ObservableSettings::from_config(config);
        Self {
            version: env!("CARGO_PKG_VERSION"),
            initial_mode: settings.mode().to_string(),
            reentrancy: settings.reentrancy().to_string(),
            log_level: config.log_level.to_string(),
            default_threads: num_cpus::get(),
        }
    }
}

/// Run the check command
pub fn run(config: &ObservableConfig, format: &str) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    let report = CheckReport::new(config);
    info!("Configuration check");

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            println!("neutryx-observe {}", report.version);
            println!("  initial mode:    {}", report.initial_mode);
            println!("  reentrancy:      {}", report.reentrancy);
            println!("  log level:       {}", report.log_level);
            println!("  default threads: {}", report.default_threads);
        }
    }

    Ok(())
}
