//! Adjacency bookkeeping for the observable/observer link graph.
//!
//! Each side of a link keeps its own [`LinkTable`]: an observable holds a
//! table of its observers, an observer holds a table of the observables it is
//! registered with. The two tables are kept symmetric by the `link`,
//! `unlink` and `unlink_all` operations of each variant, each table being
//! guarded by its owner's lock.

use std::collections::HashMap;
use std::hash::Hash;

/// Result of a `link` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// A new link was created.
    Linked,
    /// The link already existed; nothing changed.
    AlreadyLinked,
    /// No observable was supplied; nothing changed.
    Absent,
}

impl LinkStatus {
    /// `true` if the link was already present before the call.
    #[inline]
    pub fn already_linked(self) -> bool {
        matches!(self, LinkStatus::AlreadyLinked)
    }

    /// `true` if the call created a new link.
    #[inline]
    pub fn is_new(self) -> bool {
        matches!(self, LinkStatus::Linked)
    }
}

/// Identity-keyed set of link entries.
///
/// Inserting an existing key is a no-op, so each counterpart appears at most
/// once per table.
#[derive(Debug, Clone)]
pub struct LinkTable<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for LinkTable<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash, V: Clone> LinkTable<K, V> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key` unless the key is present.
    ///
    /// Returns `true` if the key was already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        match self.entries.entry(key) {
            std::collections::hash_map::Entry::Occupied(_) => true,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(value);
                false
            }
        }
    }

    /// Removes `key`, returning the number of entries removed (0 or 1).
    pub fn remove(&mut self, key: &K) -> usize {
        usize::from(self.entries.remove(key).is_some())
    }

    /// Removes `key`, returning its value.
    pub fn take(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    /// Whether `key` is present.
    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clones the current values out of the table.
    ///
    /// Used to capture a consistent set before releasing the owner's lock.
    pub fn snapshot(&self) -> Vec<V> {
        self.entries.values().cloned().collect()
    }

    /// Copies the current keys out of the table.
    pub fn keys(&self) -> Vec<K> {
        self.entries.keys().copied().collect()
    }

    /// Iterates over entries.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    /// Removes every entry, returning them.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        self.entries.drain().collect()
    }
}
