//! Thread-safe observer/observable engine.
//!
//! Observables hold shared [`LifetimeGuard`]s rather than observers, and every
//! delivery re-validates the guard under its lock immediately before calling
//! `update()`. Observers may therefore be dropped on any thread while other
//! threads notify, without ever being called after teardown has started.
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use pricer_observable::sync::{link, Observable, ObservableSettings, Observer, ObserverLinks};
//! use pricer_observable::UpdateError;
//!
//! struct CachedNpv {
//!     links: ObserverLinks,
//!     stale: AtomicBool,
//! }
//!
//! impl Observer for CachedNpv {
//!     fn links(&self) -> &ObserverLinks {
//!         &self.links
//!     }
//!     fn update(&self) -> Result<(), UpdateError> {
//!         self.stale.store(true, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! let settings = Arc::new(ObservableSettings::new());
//! let spot = Arc::new(Observable::with_settings(Arc::clone(&settings)));
//! let npv = Arc::new(CachedNpv { links: ObserverLinks::new(), stale: AtomicBool::new(false) });
//!
//! link(&npv, &spot);
//! spot.notify_observers().unwrap();
//! assert!(npv.stale.load(Ordering::SeqCst));
//! ```

mod guard;
mod observable;
mod observer;
mod settings;

pub use guard::LifetimeGuard;
pub use observable::Observable;
pub use observer::{
    link, link_optional, rebind, relink_from, unlink, unlink_all, unlink_optional, Observer,
    ObserverLinks,
};
pub use settings::{ObservableSettings, UpdatesDisabled};

use crate::error::NotifyError;
use crate::mode::FlushReport;

/// Disables updates on the global settings.
///
/// See [`ObservableSettings::disable_updates`].
pub fn disable_updates(deferred: bool) {
    ObservableSettings::global().disable_updates(deferred);
}

/// Re-enables updates on the global settings, flushing deferred ones.
///
/// See [`ObservableSettings::enable_updates`].
pub fn enable_updates() -> Result<FlushReport, NotifyError> {
    ObservableSettings::global().enable_updates()
}
