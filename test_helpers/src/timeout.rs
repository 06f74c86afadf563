use std::{future::Future, time::Duration};

use async_trait::async_trait;

/// Extension trait giving any future a `.with_timeout(...)` that panics with
/// a clear message instead of hanging the test runner forever — every
/// suspension point in this system (§5) is a place a bug could hang a test.
#[async_trait]
pub trait FutureTimeout: Future + Sized {
    async fn with_timeout(self, duration: Duration) -> Self::Output
    where
        Self: Send,
        Self::Output: Send;
}

#[async_trait]
impl<F> FutureTimeout for F
where
    F: Future + Send,
{
    async fn with_timeout(self, duration: Duration) -> Self::Output
    where
        Self::Output: Send,
    {
        tokio::time::timeout(duration, self)
            .await
            .expect("future did not complete within timeout")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_normally_under_the_timeout() {
        let value = async { 42 }.with_timeout(Duration::from_secs(1)).await;
        assert_eq!(value, 42);
    }

    #[tokio::test]
    #[should_panic(expected = "did not complete")]
    async fn panics_when_the_future_hangs() {
        std::future::pending::<()>()
            .with_timeout(Duration::from_millis(10))
            .await;
    }
}
