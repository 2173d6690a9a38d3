//! Shared liveness indirection between an observer and its observables.
//!
//! Observables never hold an observer directly. Each observer lazily creates
//! one [`LifetimeGuard`] and hands a clone of the `Arc` to every observable it
//! links with. The guard owns only a `Weak` handle to the observer, so an
//! observable can keep the guard for as long as it likes without keeping the
//! observer alive and without ever dereferencing a freed observer.
//!
//! # Locking
//!
//! The `active` flag sits behind a `parking_lot::ReentrantMutex`, which is
//! held across the call to `Observer::update()`. This serialises observer
//! teardown against delivery for that one observer. The mutex has to be
//! recursive: the strong handle upgraded for delivery may turn out to be the
//! last one, in which case dropping it runs the observer's teardown, which
//! deactivates this same guard from the same thread.

use std::cell::Cell;
use std::fmt;
use std::sync::Weak;

use parking_lot::ReentrantMutex;

use super::observer::Observer;
use crate::error::UpdateError;
use crate::id::ObserverId;

/// Liveness flag plus weak back-reference for one observer.
pub struct LifetimeGuard {
    observer_id: ObserverId,
    active: ReentrantMutex<Cell<bool>>,
    observer: Weak<dyn Observer>,
}

impl LifetimeGuard {
    pub(crate) fn new(observer_id: ObserverId, observer: Weak<dyn Observer>) -> Self {
        Self {
            observer_id,
            active: ReentrantMutex::new(Cell::new(true)),
            observer,
        }
    }

    /// Identity of the guarded observer.
    #[inline]
    pub fn observer_id(&self) -> ObserverId {
        self.observer_id
    }

    /// Whether the guard is active and the observer is still alive.
    pub fn is_active(&self) -> bool {
        let active = self.active.lock();
        active.get() && self.observer.strong_count() > 0
    }

    /// Flips the guard to inactive.
    ///
    /// Returns `true` if this call performed the transition; later calls are
    /// no-ops returning `false`.
    pub fn deactivate(&self) -> bool {
        let active = self.active.lock();
        active.replace(false)
    }

    /// Forwards a notification to the observer if it is still alive.
    ///
    /// Returns `Ok(true)` if `update()` was called and `Ok(false)` if the
    /// guard was inactive or the observer already gone.
    pub fn update(&self) -> Result<bool, UpdateError> {
        self.forward(|observer| observer.update())
    }

    /// Like [`update`](Self::update) but calls `Observer::deep_update()`.
    pub fn deep_update(&self) -> Result<bool, UpdateError> {
        self.forward(|observer| observer.deep_update())
    }

    /// Runs `f` against the observer if it is still alive, ignoring the
    /// `active` flag.
    pub(crate) fn with_observer<R>(&self, f: impl FnOnce(&dyn Observer) -> R) -> Option<R> {
        let observer = self.observer.upgrade()?;
        Some(f(observer.as_ref()))
    }

    fn forward(
        &self,
        call: impl FnOnce(&dyn Observer) -> Result<(), UpdateError>,
    ) -> Result<bool, UpdateError> {
        let active = self.active.lock();
        if !active.get() {
            return Ok(false);
        }
        // Dropped before `active`, i.e. while the lock is still held.
        let Some(observer) = self.observer.upgrade() else {
            return Ok(false);
        };
        call(observer.as_ref()).map(|()| true)
    }
}

impl fmt::Debug for LifetimeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeGuard")
            .field("observer_id", &self.observer_id)
            .field("alive", &(self.observer.strong_count() > 0))
            .finish_non_exhaustive()
    }
}
