//! # pricer_observable: Dependency Notification for Pricing Object Graphs
//!
//! ## Role
//!
//! Quotes, curves, models and instruments form a graph in which a change at
//! the leaves must invalidate cached results further up. This crate provides
//! that plumbing:
//! - Observable sources that broadcast "I have changed" (`sync::Observable`)
//! - The observer capability and its link bookkeeping (`sync::Observer`,
//!   `sync::ObserverLinks`)
//! - Bidirectional link management: `link`, `unlink`, `unlink_all`, `rebind`
//! - Batched delivery: drop or defer notifications between
//!   `disable_updates` and `enable_updates` (`sync::ObservableSettings`)
//! - Error types: `UpdateError`, `NotifyError`, `ConfigError` (`error`)
//! - Configuration loading from TOML, environment and CLI (`config`)
//!
//! ## Variants
//!
//! | Module   | Handles            | Use when                                 |
//! |----------|--------------------|------------------------------------------|
//! | `sync`   | `Arc`, `Mutex`     | the graph is shared across threads       |
//! | `unsync` | `Rc`, `RefCell`    | the graph lives on one thread            |
//!
//! The `sync` API is re-exported at the crate root.
//!
//! ## Usage Examples
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use pricer_observable::{link, Observable, ObservableSettings, Observer, ObserverLinks, UpdateError};
//!
//! struct Instrument {
//!     links: ObserverLinks,
//!     recalculations: AtomicUsize,
//! }
//!
//! impl Observer for Instrument {
//!     fn links(&self) -> &ObserverLinks {
//!         &self.links
//!     }
//!     fn update(&self) -> Result<(), UpdateError> {
//!         self.recalculations.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! let settings = Arc::new(ObservableSettings::new());
//! let spot = Arc::new(Observable::with_settings(Arc::clone(&settings)));
//! let vol = Arc::new(Observable::with_settings(Arc::clone(&settings)));
//! let option = Arc::new(Instrument {
//!     links: ObserverLinks::new(),
//!     recalculations: AtomicUsize::new(0),
//! });
//! link(&option, &spot);
//! link(&option, &vol);
//!
//! // Bump both inputs inside a batch: the instrument is refreshed once.
//! settings.disable_updates(true);
//! spot.notify_observers().unwrap();
//! vol.notify_observers().unwrap();
//! settings.enable_updates().unwrap();
//! assert_eq!(option.recalculations.load(Ordering::SeqCst), 1);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod config;
pub mod error;
pub mod id;
pub mod mode;
pub mod registry;
pub mod sync;
pub mod unsync;

mod reentrancy;

pub use config::{build_config, CliArgs, LogLevel, ObservableConfig};
pub use error::{ConfigError, NotifyError, UpdateError, UpdateFailure};
pub use id::{ObservableId, ObserverId};
pub use mode::{FlushReport, ReentrancyPolicy, UpdateMode};
pub use registry::{LinkStatus, LinkTable};
pub use sync::{
    disable_updates, enable_updates, link, link_optional, rebind, relink_from, unlink,
    unlink_all, unlink_optional, LifetimeGuard, Observable, ObservableSettings, Observer,
    ObserverLinks, UpdatesDisabled,
};
