//! Thread-safe observer capability and link management.
//!
//! # Lock order
//!
//! Operations that touch both sides of a link take the observer's lock
//! first and the observable's lock second. Notification only takes the
//! observable's lock and releases it before calling into any observer, so
//! the two never wait on each other in opposite order.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use super::guard::LifetimeGuard;
use super::observable::Observable;
use crate::error::UpdateError;
use crate::id::{ObservableId, ObserverId};
use crate::registry::{LinkStatus, LinkTable};

/// Object that gets notified when an observable it is linked to changes.
///
/// Implementors embed an [`ObserverLinks`] and return it from
/// [`links`](Self::links); the engine uses it to keep both sides of every
/// link in step and to unlink the observer when it is dropped.
///
/// `update()` is called by the observables the instance is linked to, never
/// by the instance itself. It should be cheap (typically marking a cached
/// value stale) because it runs while the observer's guard lock is held.
pub trait Observer: Send + Sync + 'static {
    /// Link bookkeeping owned by this observer.
    fn links(&self) -> &ObserverLinks;

    /// Reacts to a change in one of the linked observables.
    fn update(&self) -> Result<(), UpdateError>;

    /// Updates this observer and any nested observers it owns.
    ///
    /// Useful to force a refresh while notifications are disabled. The
    /// default just calls [`update`](Self::update).
    fn deep_update(&self) -> Result<(), UpdateError> {
        self.update()
    }
}

struct LinksState {
    guard: Option<Arc<LifetimeGuard>>,
    observables: LinkTable<ObservableId, Arc<Observable>>,
}

/// The set of observables an observer is linked to.
///
/// Dropping an `ObserverLinks` deactivates the observer's guard and then
/// unlinks it from every observable, so no notification can reach the
/// observer once its memory is being reclaimed.
///
/// `ObserverLinks` is deliberately not `Clone`: a copied observer has a new
/// identity and must link itself. Build the copy with `ObserverLinks::new()`
/// and call [`rebind`] against the original:
///
/// ```rust
/// use std::sync::Arc;
/// use pricer_observable::sync::{link, rebind, Observable, Observer, ObserverLinks};
/// use pricer_observable::UpdateError;
///
/// struct Pricer { links: ObserverLinks }
///
/// impl Observer for Pricer {
///     fn links(&self) -> &ObserverLinks { &self.links }
///     fn update(&self) -> Result<(), UpdateError> { Ok(()) }
/// }
///
/// let spot = Arc::new(Observable::new());
/// let original = Arc::new(Pricer { links: ObserverLinks::new() });
/// link(&original, &spot);
///
/// let copy = Arc::new(Pricer { links: ObserverLinks::new() });
/// rebind(&copy, original.as_ref());
/// assert!(copy.links().is_linked_to(&spot));
/// assert_eq!(spot.observer_count(), 2);
/// ```
pub struct ObserverLinks {
    id: ObserverId,
    state: Mutex<LinksState>,
}

impl Default for ObserverLinks {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverLinks {
    /// Creates an empty link set with a fresh observer identity.
    pub fn new() -> Self {
        Self {
            id: ObserverId::next(),
            state: Mutex::new(LinksState {
                guard: None,
                observables: LinkTable::new(),
            }),
        }
    }

    /// Identity of the owning observer.
    #[inline]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Number of observables this observer is linked to.
    pub fn len(&self) -> usize {
        self.state.lock().observables.len()
    }

    /// Whether this observer is linked to no observable.
    pub fn is_empty(&self) -> bool {
        self.state.lock().observables.is_empty()
    }

    /// Whether this observer is linked to `observable`.
    pub fn is_linked_to(&self, observable: &Observable) -> bool {
        self.state.lock().observables.contains(&observable.id())
    }

    /// Identities of the linked observables.
    pub fn observable_ids(&self) -> Vec<ObservableId> {
        self.state.lock().observables.keys()
    }

    /// Snapshot of the linked observables.
    pub fn observables(&self) -> Vec<Arc<Observable>> {
        self.state.lock().observables.snapshot()
    }

    /// The observer's guard, once it has linked at least once.
    pub fn guard(&self) -> Option<Arc<LifetimeGuard>> {
        self.state.lock().guard.clone()
    }

    /// Unlinks from every observable and clears the link set.
    ///
    /// Any deferred delivery still pending for this observer is discarded.
    pub fn unlink_all(&self) {
        let mut state = self.state.lock();
        let drained = state.observables.drain();
        let count = drained.len();
        for (_, observable) in drained {
            observable.detach(self.id);
            observable.settings().forget(self.id);
        }
        debug!(observer = %self.id, removed = count, "Observer unlinked from all observables");
    }

    fn table(&self) -> LinkTable<ObservableId, Arc<Observable>> {
        self.state.lock().observables.clone()
    }
}

impl Drop for ObserverLinks {
    fn drop(&mut self) {
        let id = self.id;
        let state = self.state.get_mut();
        // Deactivate before unlinking so that a notification already past
        // its snapshot sees an inactive guard.
        if let Some(guard) = &state.guard {
            guard.deactivate();
        }
        for (_, observable) in state.observables.drain() {
            observable.detach(id);
            observable.settings().forget(id);
        }
    }
}

impl fmt::Debug for ObserverLinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverLinks")
            .field("id", &self.id)
            .field("observables", &self.observable_ids())
            .finish()
    }
}

fn guard_for<O: Observer>(
    links: &ObserverLinks,
    state: &mut LinksState,
    observer: &Arc<O>,
) -> Arc<LifetimeGuard> {
    let guard = state.guard.get_or_insert_with(|| {
        let weak: Weak<dyn Observer> = Arc::<O>::downgrade(observer);
        Arc::new(LifetimeGuard::new(links.id, weak))
    });
    Arc::clone(guard)
}

/// Links `observer` to `observable`.
///
/// Both sides are updated while the observer's lock is held, so a
/// concurrent notification sees either no link or the complete link.
/// Linking twice is a no-op reported as [`LinkStatus::AlreadyLinked`].
pub fn link<O: Observer>(observer: &Arc<O>, observable: &Arc<Observable>) -> LinkStatus {
    let links = observer.links();
    let mut state = links.state.lock();
    let guard = guard_for(links, &mut state, observer);
    if state
        .observables
        .insert(observable.id(), Arc::clone(observable))
    {
        return LinkStatus::AlreadyLinked;
    }
    observable.attach(guard);
    debug!(observer = %links.id, observable = %observable.id(), "Linked");
    LinkStatus::Linked
}

/// Links `observer` to `observable` if one is given.
pub fn link_optional<O: Observer>(
    observer: &Arc<O>,
    observable: Option<&Arc<Observable>>,
) -> LinkStatus {
    match observable {
        Some(observable) => link(observer, observable),
        None => LinkStatus::Absent,
    }
}

/// Removes the link between `observer` and `observable`.
///
/// Returns the number of links removed (0 or 1). The observer's guard is
/// removed from the observable, so it will never again deliver to this
/// observer, and a deferred delivery still pending for the observer is
/// discarded.
pub fn unlink<O: Observer + ?Sized>(observer: &O, observable: &Observable) -> usize {
    let links = observer.links();
    let mut state = links.state.lock();
    let removed = state.observables.remove(&observable.id());
    observable.detach(links.id);
    if removed > 0 {
        observable.settings().forget(links.id);
        debug!(observer = %links.id, observable = %observable.id(), "Unlinked");
    }
    removed
}

/// Removes the link between `observer` and `observable` if one is given.
pub fn unlink_optional<O: Observer + ?Sized>(
    observer: &O,
    observable: Option<&Observable>,
) -> usize {
    observable.map_or(0, |observable| unlink(observer, observable))
}

/// Unlinks `observer` from every observable it is linked to.
pub fn unlink_all<O: Observer + ?Sized>(observer: &O) {
    observer.links().unlink_all();
}

/// Links `target` to every observable `other` is linked to.
///
/// `target` is not linked to `other` itself, and `other` is left untouched.
/// Returns the number of links created.
pub fn rebind<O: Observer, P: Observer + ?Sized>(target: &Arc<O>, other: &P) -> usize {
    other
        .links()
        .observables()
        .iter()
        .filter(|observable| link(target, observable).is_new())
        .count()
}

/// Replaces `target`'s link set with `other`'s.
///
/// The replacement set is captured first; then, under `target`'s lock,
/// observables no longer present are unlinked, new ones linked, and the
/// set swapped in one step, so `target` is never left partially linked.
pub fn relink_from<O: Observer, P: Observer + ?Sized>(target: &Arc<O>, other: &P) {
    let replacement = other.links().table();
    let links = target.links();
    let mut state = links.state.lock();

    for (id, observable) in state.observables.iter() {
        if !replacement.contains(id) {
            observable.detach(links.id);
            observable.settings().forget(links.id);
        }
    }
    if !replacement.is_empty() {
        let guard = guard_for(links, &mut state, target);
        for (id, observable) in replacement.iter() {
            if !state.observables.contains(id) {
                observable.attach(Arc::clone(&guard));
            }
        }
    }
    state.observables = replacement;
    debug!(observer = %links.id, observables = state.observables.len(), "Relinked");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ObservableSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Probe {
        links: ObserverLinks,
        hits: AtomicUsize,
    }

    impl Observer for Probe {
        fn links(&self) -> &ObserverLinks {
            &self.links
        }

        fn update(&self) -> Result<(), UpdateError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn probe() -> Arc<Probe> {
        Arc::new(Probe {
            links: ObserverLinks::new(),
            hits: AtomicUsize::new(0),
        })
    }

    fn source() -> Arc<Observable> {
        Arc::new(Observable::with_settings(Arc::new(ObservableSettings::new())))
    }

    #[test]
    fn test_link_is_idempotent() {
        let s = source();
        let l = probe();

        assert_eq!(link(&l, &s), LinkStatus::Linked);
        assert!(link(&l, &s).already_linked());
        assert_eq!(s.observer_count(), 1);
        assert_eq!(l.links.len(), 1);
    }

    #[test]
    fn test_guard_is_shared_across_observables() {
        let a = source();
        let b = source();
        let l = probe();
        assert!(l.links.guard().is_none());

        link(&l, &a);
        let first = l.links.guard().unwrap();
        link(&l, &b);
        let second = l.links.guard().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unlink_counts() {
        let s = source();
        let l = probe();
        link(&l, &s);

        assert_eq!(unlink(l.as_ref(), &s), 1);
        assert_eq!(unlink(l.as_ref(), &s), 0);
        assert_eq!(s.observer_count(), 0);
        assert!(l.links.is_empty());
    }

    #[test]
    fn test_optional_variants_ignore_absent() {
        let l = probe();
        assert_eq!(link_optional(&l, None), LinkStatus::Absent);
        assert_eq!(unlink_optional(l.as_ref(), None), 0);
        assert!(l.links.is_empty());
    }

    #[test]
    fn test_drop_unlinks_from_every_observable() {
        let a = source();
        let b = source();
        let l = probe();
        link(&l, &a);
        link(&l, &b);
        let guard = l.links.guard().unwrap();

        drop(l);
        assert_eq!(a.observer_count(), 0);
        assert_eq!(b.observer_count(), 0);
        assert!(!guard.is_active());
    }

    #[test]
    fn test_relink_from_swaps_link_set() {
        let a = source();
        let b = source();
        let c = source();
        let target = probe();
        let other = probe();
        link(&target, &a);
        link(&target, &b);
        link(&other, &b);
        link(&other, &c);

        relink_from(&target, other.as_ref());

        let mut ids = target.links.observable_ids();
        ids.sort();
        let mut expected = vec![b.id(), c.id()];
        expected.sort();
        assert_eq!(ids, expected);
        assert!(!a.is_linked(target.links.id()));
        assert!(b.is_linked(target.links.id()));
        assert!(c.is_linked(target.links.id()));
        assert_eq!(other.links.len(), 2);
    }

    #[test]
    fn test_relink_from_empty_unlinks_everything() {
        let a = source();
        let target = probe();
        let other = probe();
        link(&target, &a);

        relink_from(&target, other.as_ref());
        assert!(target.links.is_empty());
        assert_eq!(a.observer_count(), 0);
    }

    #[test]
    fn test_deep_update_defaults_to_update() {
        let l = probe();
        l.deep_update().unwrap();
        assert_eq!(l.hits.load(Ordering::SeqCst), 1);
    }
}
