//! Concurrency tests: observers are linked, unlinked and dropped on some
//! threads while other threads notify, toggle deferred delivery or clear a
//! source's observers.
//!
//! A dropped observer must never be called, and the link graph must be
//! symmetric once every thread has finished.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use pricer_observable::{
    link, unlink, unlink_all, Observable, ObservableSettings, Observer, ObserverLinks, UpdateError,
};
use rayon::prelude::*;

struct Tracked {
    links: ObserverLinks,
    dropped: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
    violations: Arc<AtomicUsize>,
}

impl Observer for Tracked {
    fn links(&self) -> &ObserverLinks {
        &self.links
    }

    fn update(&self) -> Result<(), UpdateError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.dropped.load(Ordering::SeqCst) {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

struct Harness {
    settings: Arc<ObservableSettings>,
    sources: Vec<Arc<Observable>>,
    calls: Arc<AtomicUsize>,
    violations: Arc<AtomicUsize>,
}

impl Harness {
    fn new(n_sources: usize) -> Self {
        let settings = Arc::new(ObservableSettings::new());
        let sources = (0..n_sources)
            .map(|_| Arc::new(Observable::with_settings(Arc::clone(&settings))))
            .collect();
        Self {
            settings,
            sources,
            calls: Arc::new(AtomicUsize::new(0)),
            violations: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn listener(&self) -> Arc<Tracked> {
        Arc::new(Tracked {
            links: ObserverLinks::new(),
            dropped: Arc::new(AtomicBool::new(false)),
            calls: Arc::clone(&self.calls),
            violations: Arc::clone(&self.violations),
        })
    }

    fn assert_symmetric(&self, survivors: &[Arc<Tracked>]) {
        let mut listener_side = 0;
        for l in survivors {
            for source in &self.sources {
                assert_eq!(
                    l.links.is_linked_to(source),
                    source.is_linked(l.links.id()),
                    "asymmetric link between {} and {}",
                    l.links.id(),
                    source.id()
                );
            }
            listener_side += l.links.len();
        }
        let source_side: usize = self.sources.iter().map(|s| s.observer_count()).sum();
        assert_eq!(listener_side, source_side);
    }
}

#[test]
fn test_teardown_races_notification() {
    let harness = Harness::new(4);
    let survivors: Vec<_> = (0..8).map(|_| harness.listener()).collect();
    for (i, l) in survivors.iter().enumerate() {
        link(l, &harness.sources[i % harness.sources.len()]);
    }

    (0..2_000usize).into_par_iter().for_each(|i| {
        let source = &harness.sources[i % harness.sources.len()];
        match i % 4 {
            0 | 1 => {
                let l = harness.listener();
                link(&l, source);
                link(&l, &harness.sources[(i + 1) % harness.sources.len()]);
                // dropped here, possibly mid-notification on another thread
            }
            2 => {
                source.notify_observers().unwrap();
            }
            _ => {
                let l = &survivors[i % survivors.len()];
                link(l, source);
                unlink(l.as_ref(), &harness.sources[(i + 2) % harness.sources.len()]);
            }
        }
    });

    assert_eq!(harness.violations.load(Ordering::SeqCst), 0);
    harness.assert_symmetric(&survivors);

    drop(survivors);
    for source in &harness.sources {
        assert_eq!(source.observer_count(), 0);
    }
}

#[test]
fn test_teardown_races_deferred_flush() {
    let harness = Harness::new(3);

    (0..1_000usize).into_par_iter().for_each(|i| {
        let source = &harness.sources[i % harness.sources.len()];
        match i % 5 {
            0 => harness.settings.disable_updates(true),
            1 => {
                harness.settings.enable_updates().unwrap();
            }
            2 | 3 => {
                let l = harness.listener();
                link(&l, source);
                source.notify_observers().unwrap();
            }
            _ => {
                source.notify_observers().unwrap();
            }
        }
    });

    let report = harness.settings.enable_updates().unwrap();
    assert_eq!(report.delivered, 0);
    assert_eq!(harness.settings.pending_len(), 0);
    assert_eq!(harness.violations.load(Ordering::SeqCst), 0);
    for source in &harness.sources {
        assert_eq!(source.observer_count(), 0);
    }
}

#[test]
fn test_concurrent_unlink_all_and_notify() {
    let harness = Harness::new(4);
    let listeners: Vec<_> = (0..16).map(|_| harness.listener()).collect();

    (0..500usize).into_par_iter().for_each(|i| {
        let l = &listeners[i % listeners.len()];
        match i % 3 {
            0 => {
                for source in &harness.sources {
                    link(l, source);
                }
            }
            1 => unlink_all(l.as_ref()),
            _ => {
                harness.sources[i % harness.sources.len()]
                    .notify_observers()
                    .unwrap();
            }
        }
    });

    harness.assert_symmetric(&listeners);
    assert_eq!(harness.violations.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unlink_all_observers_races_link_and_unlink() {
    let harness = Harness::new(2);
    let listeners: Vec<_> = (0..4).map(|_| harness.listener()).collect();

    (0..20_000usize).into_par_iter().for_each(|i| {
        let l = &listeners[i % listeners.len()];
        let source = &harness.sources[(i / listeners.len()) % harness.sources.len()];
        match i % 3 {
            0 => {
                source.unlink_all_observers();
            }
            1 => {
                unlink(l.as_ref(), source);
                link(l, source);
            }
            _ => {
                link(l, source);
            }
        }
    });

    harness.assert_symmetric(&listeners);

    // A guard left behind on the source side would outlive its observer.
    drop(listeners);
    for source in &harness.sources {
        assert_eq!(source.observer_count(), 0);
    }
}

#[test]
fn test_every_survivor_notified_once_per_round() {
    let harness = Harness::new(1);
    let listeners: Vec<_> = (0..64).map(|_| harness.listener()).collect();
    listeners
        .par_iter()
        .for_each(|l| assert!(!link(l, &harness.sources[0]).already_linked()));

    harness.sources[0].notify_observers().unwrap();

    assert_eq!(harness.calls.load(Ordering::SeqCst), listeners.len());
}
