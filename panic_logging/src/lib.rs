//! Installs a panic hook that routes panic messages through `tracing`
//! instead of raw stderr, and bumps a metric counter so a panicked task
//! shows up in `get-stats` even if the process itself survives (a panic in
//! one of the cooperative tasks of §5 must not silently vanish).
#![warn(missing_debug_implementations, clippy::use_self)]

use std::{panic, sync::Arc};

use metric::{Attributes, Metric, Registry, U64Counter};
use observability_deps::tracing::error;

/// Installs the panic hook, wiring a `panics_total` counter into `registry`.
/// Returns a guard; dropping it is a no-op (the hook lives for the process),
/// kept as a value so call sites can hold it for clarity at the call site.
pub struct PanicLogHandle {
    counter: U64Counter,
}

impl PanicLogHandle {
    pub fn new(registry: Arc<Registry>) -> Self {
        let metric: Metric<U64Counter> = registry.register_metric("panics_total", "process panics observed");
        let counter = metric.recorder(Attributes::new());

        let handle = Self {
            counter: counter.clone(),
        };

        let previous_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            counter.inc(1);
            error!(%panic_info, "panic");
            previous_hook(panic_info);
        }));

        handle
    }

    /// Total panics observed since this handle was installed.
    pub fn count(&self) -> u64 {
        self.counter.fetch()
    }
}

impl std::fmt::Debug for PanicLogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanicLogHandle")
            .field("count", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_starts_at_zero() {
        let registry = Arc::new(Registry::new());
        let handle = PanicLogHandle::new(registry);
        assert_eq!(handle.count(), 0);
    }
}
