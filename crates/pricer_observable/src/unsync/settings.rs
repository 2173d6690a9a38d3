//! Single-threaded notification settings.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use super::observer::Observer;
use crate::config::ObservableConfig;
use crate::error::{NotifyError, UpdateFailure};
use crate::id::ObserverId;
use crate::mode::{Delivery, FlushReport, ReentrancyPolicy, UpdateMode};
use crate::registry::LinkTable;

type Pending = LinkTable<ObserverId, Weak<dyn Observer>>;

/// Delivery state machine for single-threaded object graphs.
///
/// Same contract as [`crate::sync::ObservableSettings`], with `Cell` and
/// `RefCell` in place of locks. The default instance is per thread.
pub struct ObservableSettings {
    mode: Cell<UpdateMode>,
    pending: RefCell<Pending>,
    reentrancy: ReentrancyPolicy,
}

thread_local! {
    static GLOBAL: Rc<ObservableSettings> = Rc::new(ObservableSettings::new());
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
            mode: Cell::new(mode),
            pending: RefCell::new(LinkTable::new()),
            reentrancy,
        }
    }

    /// Creates settings from a loaded configuration.
    pub fn from_config(config: &ObservableConfig) -> Self {
        Self::with_policy(config.initial_mode, config.reentrancy)
    }

    /// This thread's default settings, created on first use.
    pub fn global() -> Rc<ObservableSettings> {
        GLOBAL.with(Rc::clone)
    }

    /// Current delivery mode.
    #[inline]
    pub fn mode(&self) -> UpdateMode {
        self.mode.get()
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
        self.pending.borrow().len()
    }

    /// Stops immediate delivery, dropping or deferring notifications.
    pub fn disable_updates(&self, deferred: bool) {
        self.mode.set(UpdateMode::disabled(deferred));
        debug!(mode = %self.mode(), "Observer updates disabled");
    }

    /// Re-enables immediate delivery and flushes deferred notifications.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::DeferredFlush`] listing every failed observer
    /// once all pending observers have been attempted.
    pub fn enable_updates(&self) -> Result<FlushReport, NotifyError> {
        self.mode.set(UpdateMode::Enabled);
        let pending = self.pending.borrow_mut().drain();

        let mut report = FlushReport {
            attempted: pending.len(),
            ..FlushReport::default()
        };
        let mut failures = Vec::new();

        for (observer, weak) in pending {
            let Some(target) = weak.upgrade() else {
                report.skipped += 1;
                continue;
            };
            match target.update() {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!(%observer, %error, "Deferred observer update failed");
                    failures.push(UpdateFailure { observer, error });
                }
            }
        }

        debug!(
            attempted = report.attempted,
            delivered = report.delivered,
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

    pub(crate) fn resolve(
        &self,
        observers: Vec<(ObserverId, Weak<dyn Observer>)>,
    ) -> Vec<(ObserverId, Weak<dyn Observer>)> {
        match self.mode().delivery() {
            Delivery::Immediate => observers,
            Delivery::Drop => {
                trace!(observers = observers.len(), "Notification dropped");
                Vec::new()
            }
            Delivery::Defer => {
                let mut pending = self.pending.borrow_mut();
                for (id, weak) in observers {
                    pending.insert(id, weak);
                }
                trace!(pending = pending.len(), "Notification deferred");
                Vec::new()
            }
        }
    }

    pub(crate) fn forget(&self, observer: ObserverId) {
        self.pending.borrow_mut().remove(&observer);
    }
}

impl std::fmt::Debug for ObservableSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableSettings")
            .field("mode", &self.mode())
            .field("pending", &self.pending_len())
            .field("reentrancy", &self.reentrancy)
            .finish()
    }
}
