//! Single-threaded observer capability and link management.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::observable::Observable;
use crate::error::UpdateError;
use crate::id::{ObservableId, ObserverId};
use crate::registry::{LinkStatus, LinkTable};

/// Object that gets notified when an observable it is linked to changes.
pub trait Observer: 'static {
    /// Link bookkeeping owned by this observer.
    fn links(&self) -> &ObserverLinks;

    /// Reacts to a change in one of the linked observables.
    fn update(&self) -> Result<(), UpdateError>;

    /// Updates this observer and any nested observers it owns.
    fn deep_update(&self) -> Result<(), UpdateError> {
        self.update()
    }
}

/// The set of observables an observer is linked to.
///
/// Dropping it unlinks the observer from every observable.
pub struct ObserverLinks {
    id: ObserverId,
    observables: RefCell<LinkTable<ObservableId, Rc<Observable>>>,
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
            observables: RefCell::new(LinkTable::new()),
        }
    }

    /// Identity of the owning observer.
    #[inline]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Number of observables this observer is linked to.
    pub fn len(&self) -> usize {
        self.observables.borrow().len()
    }

    /// Whether this observer is linked to no observable.
    pub fn is_empty(&self) -> bool {
        self.observables.borrow().is_empty()
    }

    /// Whether this observer is linked to `observable`.
    pub fn is_linked_to(&self, observable: &Observable) -> bool {
        self.observables.borrow().contains(&observable.id())
    }

    /// Identities of the linked observables.
    pub fn observable_ids(&self) -> Vec<ObservableId> {
        self.observables.borrow().keys()
    }

    /// Snapshot of the linked observables.
    pub fn observables(&self) -> Vec<Rc<Observable>> {
        self.observables.borrow().snapshot()
    }

    /// Unlinks from every observable and clears the link set.
    pub fn unlink_all(&self) {
        let drained = self.observables.borrow_mut().drain();
        for (_, observable) in &drained {
            observable.detach(self.id);
            observable.settings().forget(self.id);
        }
        debug!(observer = %self.id, removed = drained.len(), "Observer unlinked from all observables");
    }

    pub(crate) fn forget_observable(&self, observable: ObservableId) -> usize {
        self.observables.borrow_mut().remove(&observable)
    }
}

impl Drop for ObserverLinks {
    fn drop(&mut self) {
        for (_, observable) in self.observables.get_mut().drain() {
            observable.detach(self.id);
            observable.settings().forget(self.id);
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

fn weak_of<O: Observer>(observer: &Rc<O>) -> Weak<dyn Observer> {
    let weak: Weak<dyn Observer> = Rc::<O>::downgrade(observer);
    weak
}

/// Links `observer` to `observable`; linking twice is a no-op.
pub fn link<O: Observer>(observer: &Rc<O>, observable: &Rc<Observable>) -> LinkStatus {
    let links = observer.links();
    let already = links
        .observables
        .borrow_mut()
        .insert(observable.id(), Rc::clone(observable));
    if already {
        return LinkStatus::AlreadyLinked;
    }
    observable.attach(links.id, weak_of(observer));
    LinkStatus::Linked
}

/// Links `observer` to `observable` if one is given.
pub fn link_optional<O: Observer>(
    observer: &Rc<O>,
    observable: Option<&Rc<Observable>>,
) -> LinkStatus {
    match observable {
        Some(observable) => link(observer, observable),
        None => LinkStatus::Absent,
    }
}

/// Removes the link between `observer` and `observable` (0 or 1 removed).
///
/// A deferred delivery still pending for the observer is discarded.
pub fn unlink<O: Observer + ?Sized>(observer: &O, observable: &Observable) -> usize {
    let links = observer.links();
    let removed = links.observables.borrow_mut().remove(&observable.id());
    observable.detach(links.id);
    if removed > 0 {
        observable.settings().forget(links.id);
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
/// Returns the number of links created.
pub fn rebind<O: Observer, P: Observer + ?Sized>(target: &Rc<O>, other: &P) -> usize {
    other
        .links()
        .observables()
        .iter()
        .filter(|observable| link(target, observable).is_new())
        .count()
}

/// Replaces `target`'s link set with `other`'s in one step.
pub fn relink_from<O: Observer, P: Observer + ?Sized>(target: &Rc<O>, other: &P) {
    let replacement = other.links().observables.borrow().clone();
    let links = target.links();
    let previous = links.observables.replace(replacement.clone());

    for (id, observable) in previous.iter() {
        if !replacement.contains(id) {
            observable.detach(links.id);
            observable.settings().forget(links.id);
        }
    }
    for (id, observable) in replacement.iter() {
        if !previous.contains(id) {
            observable.attach(links.id, weak_of(target));
        }
    }
}
