//! Thread-safe notification source.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::guard::LifetimeGuard;
use super::observer::unlink;
use super::settings::ObservableSettings;
use crate::error::NotifyError;
use crate::id::{ObservableId, ObserverId};
use crate::mode::ReentrancyPolicy;
use crate::reentrancy::DeliveryScope;
use crate::registry::LinkTable;

/// Object that notifies its changes to a set of observers.
///
/// Domain types that other objects depend on (quotes, curves, instruments)
/// hold an `Arc<Observable>` and call [`notify_observers`](Self::notify_observers)
/// at the end of every mutating method. Observers register through
/// [`link`](super::link).
///
/// # Copy semantics
///
/// Cloning an `Observable` yields a new source with a fresh identity and no
/// observers: nobody asked to watch the copy. Use
/// [`assign_from`](Self::assign_from) when the owning object's state is
/// overwritten, so that the assignee's existing observers hear about it.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use pricer_observable::sync::Observable;
///
/// let quote = Arc::new(Observable::new());
/// assert_eq!(quote.observer_count(), 0);
/// quote.notify_observers().unwrap();
/// ```
pub struct Observable {
    id: ObservableId,
    observers: Mutex<LinkTable<ObserverId, Arc<LifetimeGuard>>>,
    settings: Arc<ObservableSettings>,
}

impl Default for Observable {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable {
    /// Creates an observable bound to the global settings.
    pub fn new() -> Self {
        Self::with_settings(Arc::clone(ObservableSettings::global()))
    }

    /// Creates an observable bound to the given settings.
    pub fn with_settings(settings: Arc<ObservableSettings>) -> Self {
        Self {
            id: ObservableId::next(),
            observers: Mutex::new(LinkTable::new()),
            settings,
        }
    }

    /// Identity of this observable.
    #[inline]
    pub fn id(&self) -> ObservableId {
        self.id
    }

    /// Settings deciding how notifications are delivered.
    #[inline]
    pub fn settings(&self) -> &Arc<ObservableSettings> {
        &self.settings
    }

    /// Number of observers currently linked.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Whether the observer with the given identity is linked.
    pub fn is_linked(&self, observer: ObserverId) -> bool {
        self.observers.lock().contains(&observer)
    }

    /// Identities of the observers currently linked.
    pub fn observer_ids(&self) -> Vec<ObserverId> {
        self.observers.lock().keys()
    }

    /// Notifies every linked observer that this object changed.
    ///
    /// The observer set is captured under the lock and the lock released
    /// before any observer runs. Depending on the settings, each captured
    /// observer is updated now, skipped, or queued for the next flush.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Update`] for the first observer that failed.
    /// Every other captured observer is still updated and stays linked.
    pub fn notify_observers(&self) -> Result<(), NotifyError> {
        let _scope = match self.settings.reentrancy() {
            ReentrancyPolicy::Allow => None,
            ReentrancyPolicy::Suppress => match DeliveryScope::enter(self.id) {
                Some(scope) => Some(scope),
                None => {
                    trace!(observable = %self.id, "Re-entrant notification suppressed");
                    return Ok(());
                }
            },
        };

        let guards = self.observers.lock().snapshot();
        if guards.is_empty() {
            return Ok(());
        }

        let mut first_failure = None;
        for guard in self.settings.resolve(guards) {
            if let Err(error) = guard.update() {
                let observer = guard.observer_id();
                warn!(observable = %self.id, %observer, %error, "Observer update failed");
                first_failure.get_or_insert(NotifyError::Update {
                    observer,
                    source: error,
                });
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Signals that this object's state was overwritten by `other`'s.
    ///
    /// Observers are not copied; this object's own observers are notified
    /// unless `other` is this very object.
    pub fn assign_from(&self, other: &Observable) -> Result<(), NotifyError> {
        if self.id == other.id {
            return Ok(());
        }
        self.notify_observers()
    }

    /// Removes every observer from this observable, on both sides of each
    /// link.
    ///
    /// Each live observer is unlinked through [`unlink`](super::unlink), which
    /// takes the observer's lock before this observable's, so a concurrent
    /// `link` or `unlink` on the same pair cannot leave one side behind.
    /// Guards whose observer is already gone are detached here; that
    /// observer's teardown finds nothing left to remove.
    ///
    /// Returns the number of links removed.
    pub fn unlink_all_observers(&self) -> usize {
        let guards = self.observers.lock().snapshot();
        let mut removed = 0;
        for guard in guards {
            removed += match guard.with_observer(|observer| unlink(observer, self)) {
                Some(count) => count,
                None => self.detach(guard.observer_id()),
            };
        }
        debug!(observable = %self.id, removed, "Observable detached from all observers");
        removed
    }

    pub(crate) fn attach(&self, guard: Arc<LifetimeGuard>) -> bool {
        self.observers.lock().insert(guard.observer_id(), guard)
    }

    pub(crate) fn detach(&self, observer: ObserverId) -> usize {
        self.observers.lock().remove(&observer)
    }
}

impl Clone for Observable {
    fn clone(&self) -> Self {
        Self::with_settings(Arc::clone(&self.settings))
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.id)
            .field("observer_count", &self.observer_count())
            .finish()
    }
}
