//! Stress command: races observer teardown against notification.
//!
//! Every round either creates a short-lived observer, links it to two
//! sources and drops it, notifies a source, toggles deferred delivery, or
//! re-links one of a fixed set of surviving observers. Afterwards the run
//! is checked for two properties:
//!
//! - no observer was called after its teardown started
//! - every surviving link is present on both sides
//!
//! Teardown starts once the last strong handle is gone, and the lifetime
//! guard only calls an observer through a handle it has just upgraded. The
//! `violations` count therefore stays at zero unless that guarantee is
//! broken; it is a tripwire, not a measure of contention.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use pricer_observable::{
    link, unlink, Observable, ObservableConfig, ObservableSettings, Observer, ObserverLinks,
    UpdateError,
};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::OutputFormat;
use crate::{CliError, Result};

/// Stress run parameters
#[derive(Debug, Clone, Copy)]
pub struct StressParams {
    pub threads: usize,
    pub rounds: usize,
    pub sources: usize,
    pub survivors: usize,
}

impl Default for StressParams {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            rounds: 10_000,
            sources: 8,
            survivors: 16,
        }
    }
}

/// Outcome of a stress run
#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub threads: usize,
    pub rounds: usize,
    pub notifications: usize,
    pub deliveries: usize,
    pub teardowns: usize,
    pub flushes: usize,
    pub violations: usize,
    pub symmetric: bool,
}

#[derive(Default)]
struct Counters {
    notifications: AtomicUsize,
    deliveries: AtomicUsize,
    teardowns: AtomicUsize,
    flushes: AtomicUsize,
    violations: AtomicUsize,
}

struct Probe {
    links: ObserverLinks,
    torn_down: AtomicBool,
    counters: Arc<Counters>,
}

impl Probe {
    fn new(counters: &Arc<Counters>) -> Arc<Self> {
        Arc::new(Self {
            links: ObserverLinks::new(),
            torn_down: AtomicBool::new(false),
            counters: Arc::clone(counters),
        })
    }
}

impl Observer for Probe {
    fn links(&self) -> &ObserverLinks {
        &self.links
    }

    fn update(&self) -> std::result::Result<(), UpdateError> {
        self.counters.deliveries.fetch_add(1, Ordering::Relaxed);
        if self.torn_down.load(Ordering::SeqCst) {
            self.counters.violations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.torn_down.store(true, Ordering::SeqCst);
        self.counters.teardowns.fetch_add(1, Ordering::Relaxed);
    }
}

fn round(
    i: usize,
    settings: &ObservableSettings,
    sources: &[Arc<Observable>],
    survivors: &[Arc<Probe>],
    counters: &Arc<Counters>,
) -> Result<()> {
    let source = &sources[i % sources.len()];
    match i % 8 {
        0..=2 => {
            let probe = Probe::new(counters);
            link(&probe, source);
            link(&probe, &sources[(i / 8 + 1) % sources.len()]);
        }
        3 | 4 => {
            counters.notifications.fetch_add(1, Ordering::Relaxed);
            source.notify_observers()?;
        }
        5 => {
            let probe = &survivors[i % survivors.len()];
            link(probe, source);
            unlink(probe.as_ref(), &sources[(i / 8 + 2) % sources.len()]);
        }
        6 => settings.disable_updates(true),
        _ => {
            settings.enable_updates()?;
            counters.flushes.fetch_add(1, Ordering::Relaxed);
        }
    }
    Ok(())
}

fn is_symmetric(sources: &[Arc<Observable>], survivors: &[Arc<Probe>]) -> bool {
    let mut listener_side = 0;
    for probe in survivors {
        for source in sources {
            if probe.links.is_linked_to(source) != source.is_linked(probe.links.id()) {
                warn!(
                    observer = %probe.links.id(),
                    observable = %source.id(),
                    "Asymmetric link"
                );
                return false;
            }
        }
        listener_side += probe.links.len();
    }
    let source_side: usize = sources.iter().map(|s| s.observer_count()).sum();
    listener_side == source_side
}

/// Executes a stress run and returns its report.
pub fn execute(config: &ObservableConfig, params: StressParams) -> Result<StressReport> {
    if params.threads == 0 || params.sources == 0 || params.survivors == 0 {
        return Err(CliError::InvalidArgument(
            "threads, sources and survivors must be positive".to_string(),
        ));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.threads)
        .build()
        .map_err(|e| CliError::ThreadPool(e.to_string()))?;

    let settings = Arc::new(ObservableSettings::from_config(config));
    let sources: Vec<_> = (0..params.sources)
        .map(|_| Arc::new(Observable::with_settings(Arc::clone(&settings))))
        .collect();
    let counters = Arc::new(Counters::default());
    let survivors: Vec<_> = (0..params.survivors)
        .map(|_| Probe::new(&counters))
        .collect();

    pool.install(|| {
        (0..params.rounds)
            .into_par_iter()
            .try_for_each(|i| round(i, &settings, &sources, &survivors, &counters))
    })?;

    let flushed = settings.enable_updates()?;
    debug!(delivered = flushed.delivered, skipped = flushed.skipped, "Final flush");

    let symmetric = is_symmetric(&sources, &survivors);
    let report = StressReport {
        threads: params.threads,
        rounds: params.rounds,
        notifications: counters.notifications.load(Ordering::SeqCst),
        deliveries: counters.deliveries.load(Ordering::SeqCst),
        teardowns: counters.teardowns.load(Ordering::SeqCst),
        flushes: counters.flushes.load(Ordering::SeqCst) + 1,
        violations: counters.violations.load(Ordering::SeqCst),
        symmetric,
    };

    drop(survivors);
    if let Some(source) = sources.iter().find(|s| s.observer_count() != 0) {
        return Err(CliError::Verification(format!(
            "{} still has {} observers after every observer was dropped",
            source.id(),
            source.observer_count()
        )));
    }

    Ok(report)
}

/// Runs the stress command.
pub fn run(config: &ObservableConfig, params: StressParams, format: &str) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    info!(
        threads = params.threads,
        rounds = params.rounds,
        sources = params.sources,
        "Starting stress run"
    );

    let report = execute(config, params)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            println!("{:<16} {:>10}", "threads", report.threads);
            println!("{:<16} {:>10}", "rounds", report.rounds);
            println!("{:<16} {:>10}", "notifications", report.notifications);
            println!("{:<16} {:>10}", "deliveries", report.deliveries);
            println!("{:<16} {:>10}", "teardowns", report.teardowns);
            println!("{:<16} {:>10}", "flushes", report.flushes);
            println!("{:<16} {:>10}", "violations", report.violations);
            println!("{:<16} {:>10}", "symmetric", report.symmetric);
            println!("(violations must be 0: a non-zero count means a torn-down observer was called)");
        }
    }

    if report.violations > 0 {
        return Err(CliError::Verification(format!(
            "{} deliveries reached observers after teardown",
            report.violations
        )));
    }
    if !report.symmetric {
        return Err(CliError::Verification(
            "link registry is not symmetric".to_string(),
        ));
    }

    info!("Stress run passed");
    Ok(())
}
