use std::fmt::Debug;

use observability_deps::tracing::info;
use tokio_util::sync::CancellationToken;

/// The cancellation handle every long-running component (Worker, Scheduler,
/// Cleaner) owns a clone of. A component's main loop checks
/// [`JobToken::is_cancelled`] at the top of every iteration and races it
/// against every suspension point with [`JobToken::cancelled`] (§5:
/// cancellation must unblock every pacer acquisition, HTTP call, store
/// write and sleep).
#[derive(Debug, Clone)]
pub struct JobToken(CancellationToken);

impl JobToken {
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    pub fn child(&self) -> Self {
        Self(self.0.child_token())
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.0.cancelled().await
    }

    pub fn cancel(&self) {
        self.0.cancel()
    }
}

impl Default for JobToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A named, orderable set of components' cancellation handles. Shutdown
/// cancels each in the registered order and waits a beat between them, so a
/// downstream component (e.g. the Store) outlives everything that might
/// still be writing to it (§9 Design Notes: "a shutdown routine sequences
/// their termination").
#[derive(Debug, Default)]
pub struct TaskRegistry {
    components: Vec<(&'static str, JobToken)>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component under `name` and returns the token it should
    /// hold onto. Components are cancelled in registration order by
    /// [`TaskRegistry::shutdown`].
    pub fn register(&mut self, name: &'static str) -> JobToken {
        let token = JobToken::new();
        self.components.push((name, token.clone()));
        token
    }

    /// Cancels every registered component in registration order.
    pub fn shutdown(&self) {
        for (name, token) in &self.components {
            info!(component = name, "shutting down");
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn child_token_is_cancelled_with_its_parent() {
        let parent = JobToken::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn registry_cancels_every_component() {
        let mut registry = TaskRegistry::new();
        let scheduler = registry.register("scheduler");
        let worker = registry.register("worker");
        let cleaner = registry.register("cleaner");

        registry.shutdown();

        assert!(scheduler.is_cancelled());
        assert!(worker.is_cancelled());
        assert!(cleaner.is_cancelled());
    }
}
