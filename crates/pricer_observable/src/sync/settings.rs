//! Thread-safe notification settings: enable, drop or defer updates.
//!
//! Bracket a batch of mutations with `disable_updates(true)` /
//! `enable_updates()` so that observers touched many times are refreshed
//! exactly once:
//!
//! ```rust
//! use std::sync::Arc;
//! use pricer_observable::sync::{ObservableSettings, Observable};
//!
//! let settings = Arc::new(ObservableSettings::new());
//! let quote = Observable::with_settings(Arc::clone(&settings));
//!
//! settings.disable_updates(true);
//! quote.notify_observers().unwrap(); // queued, nothing delivered
//! let report = settings.enable_updates().unwrap();
//! assert_eq!(report.attempted, 0); // nobody was linked
//! ```

use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::guard::LifetimeGuard;
use crate::config::ObservableConfig;
use crate::error::{NotifyError, UpdateFailure};
use crate::id::ObserverId;
use crate::mode::{Delivery, FlushReport, ReentrancyPolicy, UpdateMode};
use crate::registry::LinkTable;

struct SettingsState {
    mode: UpdateMode,
    pending: LinkTable<ObserverId, Weak<LifetimeGuard>>,
}

/// Delivery state machine shared by a group of observables.
///
/// Observables created with [`Observable::new`](super::Observable::new) use
/// the process-wide [`ObservableSettings::global`] instance; tests and
/// isolated object graphs pass their own instance to
/// [`Observable::with_settings`](super::Observable::with_settings).
pub struct ObservableSettings {
    state: Mutex<SettingsState>,
    reentrancy: ReentrancyPolicy,
}

impl Default for ObservableSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservableSettings {
    /// Creates settings in the `Enabled` state with re-entrancy allowed.
    pub fn new() -> Self {
        Self::with_policy(UpdateMode::Enabled, ReentrancyPolicy::Allow)
    }

    /// Creates settings with an explicit initial mode and re-entrancy policy.
    pub fn with_policy(mode: UpdateMode, reentrancy: ReentrancyPolicy) -> Self {
        Self {
            state: Mutex::new(SettingsState {
                mode,
                pending: LinkTable::new(),
            }),
            reentrancy,
        }
    }

    /// Creates settings from a loaded configuration.
    pub fn from_config(config: &ObservableConfig) -> Self {
        Self::with_policy(config.initial_mode, config.reentrancy)
    }

    /// Process-wide default settings, created on first use.
    pub fn global() -> &'static Arc<ObservableSettings> {
        static GLOBAL: OnceLock<Arc<ObservableSettings>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ObservableSettings::new()))
    }

    /// Current delivery mode.
    pub fn mode(&self) -> UpdateMode {
        self.state.lock().mode
    }

    /// Whether notifications are delivered immediately.
    pub fn updates_enabled(&self) -> bool {
        self.mode().updates_enabled()
    }

    /// Whether disabled notifications are queued for a later flush.
    pub fn updates_deferred(&self) -> bool {
        self.mode().updates_deferred()
    }

    /// Re-entrancy policy applied by observables using these settings.
    #[inline]
    pub fn reentrancy(&self) -> ReentrancyPolicy {
        self.reentrancy
    }

    /// Number of distinct observers awaiting a deferred flush.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Stops immediate delivery.
    ///
    /// With `deferred = false` notifications are dropped; with
    /// `deferred = true` the notified observers are remembered and refreshed
    /// once by the next [`enable_updates`](Self::enable_updates).
    pub fn disable_updates(&self, deferred: bool) {
        let mut state = self.state.lock();
        state.mode = UpdateMode::disabled(deferred);
        debug!(mode = %state.mode, "Observer updates disabled");
    }

    /// Disables updates until the returned scope is dropped or finished.
    pub fn disable_scoped(&self, deferred: bool) -> UpdatesDisabled<'_> {
        self.disable_updates(deferred);
        UpdatesDisabled {
            settings: self,
            finished: false,
        }
    }

    /// Re-enables immediate delivery and flushes deferred notifications.
    ///
    /// Every distinct pending observer is attempted exactly once, even if
    /// some of them fail. The pending set is cleared before any observer
    /// runs, so observers may notify again from inside `update()`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::DeferredFlush`] listing every failed observer
    /// if at least one `update()` failed.
    pub fn enable_updates(&self) -> Result<FlushReport, NotifyError> {
        let pending = {
            let mut state = self.state.lock();
            state.mode = UpdateMode::Enabled;
            state.pending.drain()
        };

        let mut report = FlushReport {
            attempted: pending.len(),
            ..FlushReport::default()
        };
        let mut failures = Vec::new();

        for (observer, guard) in pending {
            let Some(guard) = guard.upgrade() else {
                report.skipped += 1;
                continue;
            };
            match guard.update() {
                Ok(true) => report.delivered += 1,
                Ok(false) => report.skipped += 1,
                Err(error) => {
                    warn!(%observer, %error, "Deferred observer update failed");
                    failures.push(UpdateFailure { observer, error });
                }
            }
        }

        debug!(
            attempted = report.attempted,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = failures.len(),
            "Observer updates enabled"
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(NotifyError::DeferredFlush {
                attempted: report.attempted,
                failures,
            })
        }
    }

    /// Resolves a captured observer snapshot against the current mode.
    ///
    /// Returns the guards to deliver to now; deferred guards are queued
    /// under the same lock that `enable_updates` uses to switch modes, so a
    /// concurrent flush can never miss them.
    pub(crate) fn resolve(&self, guards: Vec<Arc<LifetimeGuard>>) -> Vec<Arc<LifetimeGuard>> {
        let mut state = self.state.lock();
        match state.mode.delivery() {
            Delivery::Immediate => guards,
            Delivery::Drop => {
                trace!(observers = guards.len(), "Notification dropped");
                Vec::new()
            }
            Delivery::Defer => {
                for guard in &guards {
                    state
                        .pending
                        .insert(guard.observer_id(), Arc::downgrade(guard));
                }
                trace!(
                    observers = guards.len(),
                    pending = state.pending.len(),
                    "Notification deferred"
                );
                Vec::new()
            }
        }
    }

    /// Drops any pending deferred delivery for `observer`.
    pub(crate) fn forget(&self, observer: ObserverId) {
        self.state.lock().pending.remove(&observer);
    }
}

impl std::fmt::Debug for ObservableSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ObservableSettings")
            .field("mode", &state.mode)
            .field("pending", &state.pending.len())
            .field("reentrancy", &self.reentrancy)
            .finish()
    }
}

/// RAII scope returned by [`ObservableSettings::disable_scoped`].
///
/// Dropping the scope re-enables updates and logs a flush failure;
/// [`finish`](Self::finish) returns the flush result instead.
#[must_use = "updates are re-enabled as soon as the scope is dropped"]
pub struct UpdatesDisabled<'a> {
    settings: &'a ObservableSettings,
    finished: bool,
}

impl UpdatesDisabled<'_> {
    /// Re-enables updates and returns the flush result.
    pub fn finish(mut self) -> Result<FlushReport, NotifyError> {
        self.finished = true;
        self.settings.enable_updates()
    }
}

impl Drop for UpdatesDisabled<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(error) = self.settings.enable_updates() {
            warn!(%error, "Deferred flush failed when leaving disabled scope");
        }
    }
}
