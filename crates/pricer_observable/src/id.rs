//! Process-unique identities for observables and observers.
//!
//! Identities are drawn from monotonically increasing atomic counters and are
//! never derived from memory addresses, which may be reused once an object
//! has been freed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBSERVABLE: AtomicU64 = AtomicU64::new(1);
static NEXT_OBSERVER: AtomicU64 = AtomicU64::new(1);

/// Identity of an observable (notification source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObservableId(u64);

impl ObservableId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OBSERVABLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw identifier value.
    ///
    /// Intended for diagnostics and tests; identities handed out by the
    /// engine never collide with each other but may collide with raw ones.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value.
    #[inline]
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observable#{}", self.0)
    }
}

/// Identity of an observer (notification listener).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OBSERVER.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw identifier value.
    ///
    /// Intended for diagnostics and tests; identities handed out by the
    /// engine never collide with each other but may collide with raw ones.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value.
    #[inline]
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}
