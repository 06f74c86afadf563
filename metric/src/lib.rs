//! An in-process metrics registry: counters keyed by a small attribute set,
//! read back by the `get-stats`/`get-queue-stats` admin commands rather than
//! exported to an external time-series system (no such collector is part of
//! this engine's kept dependency set).
#![warn(missing_debug_implementations, clippy::use_self)]

use std::{
    any::Any,
    collections::BTreeMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

/// A sorted set of `(key, value)` string pairs identifying one observation
/// point of a [`Metric`] (e.g. `trigger=memory`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

impl<const N: usize> From<&[(&str, &str); N]> for Attributes {
    fn from(pairs: &[(&str, &str); N]) -> Self {
        let mut attrs = Self::new();
        for (k, v) in pairs {
            attrs.insert(*k, *v);
        }
        attrs
    }
}

impl From<&[(&str, &str)]> for Attributes {
    fn from(pairs: &[(&str, &str)]) -> Self {
        let mut attrs = Self::new();
        for (k, v) in pairs {
            attrs.insert(*k, *v);
        }
        attrs
    }
}

/// Something a [`Metric`] can record observations into: a counter, a gauge,
/// anything with a zero value to start a new attribute combination from.
pub trait MetricObserver: Clone + Debug + Send + Sync + Default + 'static {}

impl<T> MetricObserver for T where T: Clone + Debug + Send + Sync + Default + 'static {}

/// A monotonic counter of `u64`. Cheap to clone — every clone shares the
/// same underlying atomic.
#[derive(Debug, Clone, Default)]
pub struct U64Counter(Arc<AtomicU64>);

impl U64Counter {
    pub fn inc(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn fetch(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A named instrument: one logical counter, broken down by [`Attributes`]
/// into independently-addressable recorders.
#[derive(Debug)]
pub struct Metric<T> {
    name: &'static str,
    description: &'static str,
    recorders: Arc<Mutex<BTreeMap<Attributes, T>>>,
}

impl<T: MetricObserver> Clone for Metric<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            description: self.description,
            recorders: Arc::clone(&self.recorders),
        }
    }
}

impl<T: MetricObserver> Metric<T> {
    fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            recorders: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Returns the recorder for `attributes`, creating one at its default
    /// value on first use.
    pub fn recorder(&self, attributes: impl Into<Attributes>) -> T {
        let attributes = attributes.into();
        self.recorders
            .lock()
            .entry(attributes)
            .or_insert_with(T::default)
            .clone()
    }

    /// Returns the existing recorder for `attributes`, if any observation
    /// has been made for it yet.
    pub fn get_observer(&self, attributes: &Attributes) -> Option<T> {
        self.recorders.lock().get(attributes).cloned()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }
}

/// The process-wide metric registry. One per binary, shared via `Arc`.
#[derive(Debug, Default)]
pub struct Registry {
    instruments: Mutex<BTreeMap<&'static str, Box<dyn Any + Send + Sync>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or retrieves, if already registered under `name`) a
    /// `Metric<T>`. Panics if `name` is already registered at a different
    /// type `T` — a programmer error, not a runtime condition.
    pub fn register_metric<T: MetricObserver>(
        &self,
        name: &'static str,
        description: &'static str,
    ) -> Metric<T> {
        let mut instruments = self.instruments.lock();
        let entry = instruments
            .entry(name)
            .or_insert_with(|| Box::new(Metric::<T>::new(name, description)));
        entry
            .downcast_ref::<Metric<T>>()
            .expect("metric registered twice under the same name with different types")
            .clone()
    }

    /// Looks up a previously-registered instrument by name.
    pub fn get_instrument<T: MetricObserver>(&self, name: &'static str) -> Option<Metric<T>> {
        self.instruments
            .lock()
            .get(name)
            .and_then(|m| m.downcast_ref::<Metric<T>>())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorders_are_independent_per_attribute_set() {
        let registry = Registry::new();
        let metric: Metric<U64Counter> = registry.register_metric("fetches_total", "fetches");
        metric.recorder(&[("classification", "ok")][..]).inc(3);
        metric.recorder(&[("classification", "blocked")][..]).inc(1);

        assert_eq!(
            metric
                .get_observer(&Attributes::from(&[("classification", "ok")][..]))
                .unwrap()
                .fetch(),
            3
        );
        assert_eq!(
            metric
                .get_observer(&Attributes::from(&[("classification", "blocked")][..]))
                .unwrap()
                .fetch(),
            1
        );
    }

    #[test]
    fn get_instrument_returns_the_same_backing_storage() {
        let registry = Registry::new();
        let a: Metric<U64Counter> = registry.register_metric("queue_done_total", "done items");
        a.recorder(&[("status", "done")][..]).inc(5);

        let b: Metric<U64Counter> = registry.get_instrument("queue_done_total").unwrap();
        assert_eq!(
            b.get_observer(&Attributes::from(&[("status", "done")][..]))
                .unwrap()
                .fetch(),
            5
        );
    }

    #[test]
    fn unknown_instrument_is_none() {
        let registry = Registry::new();
        assert!(registry.get_instrument::<U64Counter>("nope").is_none());
    }
}
