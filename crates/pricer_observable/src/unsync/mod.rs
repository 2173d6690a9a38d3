//! Single-threaded observer/observable engine.
//!
//! Mirrors [`crate::sync`] with `Rc`, `Weak` and `RefCell`. Observables hold
//! `Weak<dyn Observer>` handles directly and need no lifetime guard: with a
//! single thread, an observer dropped mid-delivery simply fails to upgrade.
//! Every type here is `!Send`.
//!
//! No `RefCell` borrow is held while user code runs, so observers may link,
//! unlink and notify from inside `update()`.

mod observable;
mod observer;
mod settings;

pub use observable::Observable;
pub use observer::{
    link, link_optional, rebind, relink_from, unlink, unlink_all, unlink_optional, Observer,
    ObserverLinks,
};
pub use settings::ObservableSettings;

use crate::error::NotifyError;
use crate::mode::FlushReport;

/// Disables updates on this thread's default settings.
pub fn disable_updates(deferred: bool) {
    ObservableSettings::global().disable_updates(deferred);
}

/// Re-enables updates on this thread's default settings, flushing deferred
/// ones.
pub fn enable_updates() -> Result<FlushReport, NotifyError> {
    ObservableSettings::global().enable_updates()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpdateError;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter {
        links: ObserverLinks,
        hits: Cell<usize>,
    }

    impl Observer for Counter {
        fn links(&self) -> &ObserverLinks {
            &self.links
        }

        fn update(&self) -> Result<(), UpdateError> {
            self.hits.set(self.hits.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_global_functions_drive_thread_default() {
        let source = Rc::new(Observable::new());
        let counter = Rc::new(Counter {
            links: ObserverLinks::new(),
            hits: Cell::new(0),
        });
        link(&counter, &source);

        disable_updates(true);
        source.notify_observers().unwrap();
        source.notify_observers().unwrap();
        assert_eq!(counter.hits.get(), 0);

        let report = enable_updates().unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(counter.hits.get(), 1);
    }
}
