use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

/// A fixed-capacity semaphore wrapping [`tokio::sync::Semaphore`], used by
/// Pacer's Tier-1 global in-flight cap. Thin on purpose: the interesting
/// behavior (spacing between acquisitions) lives in the `pacer` crate, which
/// composes this with a [`crate::JobToken`] for cancellation.
#[derive(Debug)]
pub struct AsyncSemaphore {
    inner: Arc<Semaphore>,
}

impl AsyncSemaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            inner: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Acquire a permit, waiting for one to become available.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.inner
            .acquire()
            .await
            .expect("semaphore is never closed")
    }

    pub fn available_permits(&self) -> usize {
        self.inner.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_are_released_on_drop() {
        let sem = AsyncSemaphore::new(1);
        assert_eq!(sem.available_permits(), 1);
        {
            let _permit = sem.acquire().await;
            assert_eq!(sem.available_permits(), 0);
        }
        assert_eq!(sem.available_permits(), 1);
    }
}
