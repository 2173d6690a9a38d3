//! Per-thread record of the observables currently delivering notifications.
//!
//! Used by [`ReentrancyPolicy::Suppress`](crate::ReentrancyPolicy) to turn a
//! nested `notify_observers()` on a source that is already mid-delivery into
//! a no-op. The record is thread-local, so concurrent notifications of the
//! same source from different threads are never suppressed.

use std::cell::RefCell;
use std::collections::HashSet;

use crate::id::ObservableId;

thread_local! {
    static DELIVERING: RefCell<HashSet<ObservableId>> = RefCell::new(HashSet::new());
}

/// Marks an observable as delivering on this thread until dropped.
#[derive(Debug)]
pub(crate) struct DeliveryScope {
    id: ObservableId,
}

impl DeliveryScope {
    /// Enters a delivery scope, or returns `None` if this thread is already
    /// delivering notifications for `id`.
    pub(crate) fn enter(id: ObservableId) -> Option<Self> {
        DELIVERING.with(|set| set.borrow_mut().insert(id).then_some(Self { id }))
    }
}

impl Drop for DeliveryScope {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread exit.
        let _ = DELIVERING.try_with(|set| {
            set.borrow_mut().remove(&self.id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_enter_is_rejected() {
        let id = ObservableId::next();
        let outer = DeliveryScope::enter(id);
        assert!(outer.is_some());
        assert!(DeliveryScope::enter(id).is_none());
        drop(outer);
        assert!(DeliveryScope::enter(id).is_some());
    }

    #[test]
    fn test_scopes_are_per_thread() {
        let id = ObservableId::next();
        let _outer = DeliveryScope::enter(id).unwrap();
        let entered_elsewhere = std::thread::spawn(move || DeliveryScope::enter(id).is_some())
            .join()
            .unwrap();
        assert!(entered_elsewhere);
    }
}
