//! Toy market objects wired through the notification engine.
//!
//! `Quote` is a pure source, `Curve` observes quotes and is itself observed,
//! and `Instrument` observes a curve. Each observer caches its result and
//! only recomputes after being notified.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pricer_observable::{
    link, NotifyError, Observable, ObservableSettings, Observer, ObserverLinks, UpdateError,
};

/// Market quote that notifies its observers when its value changes.
pub struct Quote {
    observable: Arc<Observable>,
    value: Mutex<f64>,
}

impl Quote {
    /// Creates a quote bound to `settings`.
    pub fn new(settings: &Arc<ObservableSettings>, value: f64) -> Arc<Self> {
        Arc::new(Self {
            observable: Arc::new(Observable::with_settings(Arc::clone(settings))),
            value: Mutex::new(value),
        })
    }

    pub fn value(&self) -> f64 {
        *self.value.lock()
    }

    pub fn observable(&self) -> &Arc<Observable> {
        &self.observable
    }

    /// Sets a new value, notifying observers if it changed.
    pub fn set_value(&self, value: f64) -> Result<(), NotifyError> {
        {
            let mut current = self.value.lock();
            if *current == value {
                return Ok(());
            }
            *current = value;
        }
        self.observable.notify_observers()
    }

    pub fn bump(&self, shift: f64) -> Result<(), NotifyError> {
        self.set_value(self.value() + shift)
    }
}

/// Flat curve whose rate is the average of its quotes.
pub struct Curve {
    links: ObserverLinks,
    observable: Arc<Observable>,
    quotes: Vec<Arc<Quote>>,
    rate: Mutex<Option<f64>>,
    invalidations: AtomicUsize,
    rebuilds: AtomicUsize,
}

impl Curve {
    /// Builds a curve on `quotes` and links it to each of them.
    pub fn new(settings: &Arc<ObservableSettings>, quotes: Vec<Arc<Quote>>) -> Arc<Self> {
        let curve = Arc::new(Self {
            links: ObserverLinks::new(),
            observable: Arc::new(Observable::with_settings(Arc::clone(settings))),
            quotes,
            rate: Mutex::new(None),
            invalidations: AtomicUsize::new(0),
            rebuilds: AtomicUsize::new(0),
        });
        for quote in &curve.quotes {
            link(&curve, quote.observable());
        }
        curve
    }

    pub fn observable(&self) -> &Arc<Observable> {
        &self.observable
    }

    /// Zero rate, rebuilt lazily after an invalidation.
    pub fn rate(&self) -> f64 {
        let mut cached = self.rate.lock();
        *cached.get_or_insert_with(|| {
            self.rebuilds.fetch_add(1, Ordering::SeqCst);
            let sum: f64 = self.quotes.iter().map(|q| q.value()).sum();
            sum / self.quotes.len().max(1) as f64
        })
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn rebuilds(&self) -> usize {
        self.rebuilds.load(Ordering::SeqCst)
    }
}

impl Observer for Curve {
    fn links(&self) -> &ObserverLinks {
        &self.links
    }

    fn update(&self) -> Result<(), UpdateError> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.rate.lock().take();
        self.observable
            .notify_observers()
            .map_err(|e| UpdateError::new(e.to_string()))
    }
}

/// Zero-coupon bond priced off a curve.
pub struct Instrument {
    links: ObserverLinks,
    name: String,
    curve: Arc<Curve>,
    notional: f64,
    maturity: f64,
    npv: Mutex<Option<f64>>,
    invalidations: AtomicUsize,
}

impl Instrument {
    pub fn new(name: &str, curve: &Arc<Curve>, notional: f64, maturity: f64) -> Arc<Self> {
        let instrument = Arc::new(Self {
            links: ObserverLinks::new(),
            name: name.to_string(),
            curve: Arc::clone(curve),
            notional,
            maturity,
            npv: Mutex::new(None),
            invalidations: AtomicUsize::new(0),
        });
        link(&instrument, curve.observable());
        instrument
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached present value, recomputed after an invalidation.
    pub fn npv(&self) -> f64 {
        let mut cached = self.npv.lock();
        *cached.get_or_insert_with(|| {
            let rate = self.curve.rate();
            self.notional * (-rate * self.maturity).exp()
        })
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl Observer for Instrument {
    fn links(&self) -> &ObserverLinks {
        &self.links
    }

    fn update(&self) -> Result<(), UpdateError> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.npv.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market() -> (Arc<ObservableSettings>, Vec<Arc<Quote>>, Arc<Curve>) {
        let settings = Arc::new(ObservableSettings::new());
        let quotes = vec![Quote::new(&settings, 0.01), Quote::new(&settings, 0.03)];
        let curve = Curve::new(&settings, quotes.clone());
        (settings, quotes, curve)
    }

    #[test]
    fn test_curve_rate_is_cached_until_quote_moves() {
        let (_settings, quotes, curve) = market();

        assert!((curve.rate() - 0.02).abs() < 1e-12);
        assert!((curve.rate() - 0.02).abs() < 1e-12);
        assert_eq!(curve.rebuilds(), 1);

        quotes[0].set_value(0.03).unwrap();
        assert_eq!(curve.invalidations(), 1);
        assert!((curve.rate() - 0.03).abs() < 1e-12);
        assert_eq!(curve.rebuilds(), 2);
    }

    #[test]
    fn test_unchanged_quote_does_not_notify() {
        let (_settings, quotes, curve) = market();
        quotes[1].set_value(0.03).unwrap();
        assert_eq!(curve.invalidations(), 0);
    }

    #[test]
    fn test_quote_change_reaches_instrument_through_curve() {
        let (_settings, quotes, curve) = market();
        let bond = Instrument::new("ZCB-5Y", &curve, 100.0, 5.0);
        let before = bond.npv();

        quotes[0].bump(0.01).unwrap();

        assert_eq!(bond.invalidations(), 1);
        assert!(bond.npv() < before);
    }
}
