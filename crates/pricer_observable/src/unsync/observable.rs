//! Single-threaded notification source.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use super::observer::Observer;
use super::settings::ObservableSettings;
use crate::error::NotifyError;
use crate::id::{ObservableId, ObserverId};
use crate::mode::ReentrancyPolicy;
use crate::reentrancy::DeliveryScope;
use crate::registry::LinkTable;

/// Object that notifies its changes to a set of observers.
///
/// Observers are held weakly: a dropped observer is never called, and its
/// teardown removes it from every observable it was linked to. Cloning
/// yields a new, unlinked observable sharing the same settings.
pub struct Observable {
    id: ObservableId,
    observers: RefCell<LinkTable<ObserverId, Weak<dyn Observer>>>,
    settings: Rc<ObservableSettings>,
}

impl Default for Observable {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable {
    /// Creates an observable bound to this thread's default settings.
    pub fn new() -> Self {
        Self::with_settings(ObservableSettings::global())
    }

    /// Creates an observable bound to the given settings.
    pub fn with_settings(settings: Rc<ObservableSettings>) -> Self {
        Self {
            id: ObservableId::next(),
            observers: RefCell::new(LinkTable::new()),
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
    pub fn settings(&self) -> &Rc<ObservableSettings> {
        &self.settings
    }

    /// Number of observers currently linked.
    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    /// Whether the observer with the given identity is linked.
    pub fn is_linked(&self, observer: ObserverId) -> bool {
        self.observers.borrow().contains(&observer)
    }

    /// Identities of the observers currently linked.
    pub fn observer_ids(&self) -> Vec<ObserverId> {
        self.observers.borrow().keys()
    }

    /// Notifies every linked observer that this object changed.
    ///
    /// No borrow is held while observers run, so they may link, unlink and
    /// notify freely from inside `update()`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Update`] for the first observer that failed;
    /// the remaining observers are still updated.
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

        let observers: Vec<_> = self
            .observers
            .borrow()
            .iter()
            .map(|(id, weak)| (*id, weak.clone()))
            .collect();
        if observers.is_empty() {
            return Ok(());
        }

        let mut first_failure = None;
        for (observer, weak) in self.settings.resolve(observers) {
            let Some(target) = weak.upgrade() else {
                continue;
            };
            if let Err(error) = target.update() {
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
    pub fn assign_from(&self, other: &Observable) -> Result<(), NotifyError> {
        if self.id == other.id {
            return Ok(());
        }
        self.notify_observers()
    }

    /// Removes every observer from this observable, on both sides of each
    /// link, discarding their pending deferred deliveries. Returns the
    /// number of links removed.
    pub fn unlink_all_observers(&self) -> usize {
        let drained = self.observers.borrow_mut().drain();
        let count = drained.len();
        for (id, weak) in drained {
            if let Some(observer) = weak.upgrade() {
                observer.links().forget_observable(self.id);
            }
            self.settings.forget(id);
        }
        count
    }

    pub(crate) fn attach(&self, observer: ObserverId, weak: Weak<dyn Observer>) -> bool {
        self.observers.borrow_mut().insert(observer, weak)
    }

    pub(crate) fn detach(&self, observer: ObserverId) -> usize {
        self.observers.borrow_mut().remove(&observer)
    }
}

impl Clone for Observable {
    fn clone(&self) -> Self {
        Self::with_settings(Rc::clone(&self.settings))
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
