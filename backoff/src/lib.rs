//! Retry/backoff as a first-class value: a lazy sequence of durations
//! capped by a maximum, rather than per-call math scattered at call sites.
//! Fetcher's retry loop (§4.4) and the health-probe retries (§4.6) both
//! drive one of these; Queue's non-jittered table (§4.5) is a pure function
//! over `attempts` and lives in `watch_types` instead, since a queue item's
//! attempts are driven by persisted state rather than an in-process loop.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::future_not_send,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]
use observability_deps::tracing::info;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use watch_time::{JitterSource, SystemJitter};

/// Exponential backoff with jitter.
///
/// See <https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter/>
#[derive(Debug, Clone)]
#[allow(missing_copy_implementations)]
pub struct BackoffConfig {
    /// Initial backoff.
    pub init_backoff: Duration,

    /// Maximum backoff.
    pub max_backoff: Duration,

    /// Multiplier for each backoff round.
    pub base: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            init_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(500),
            base: 3.,
        }
    }
}

/// Error after giving up retrying.
pub type BackoffError = std::convert::Infallible;

/// Backoff result.
pub type BackoffResult<T> = Result<T, BackoffError>;

/// [`Backoff`] can be created from a [`BackoffConfig`].
///
/// Consecutive calls to [`Backoff::next`] return the next backoff interval.
/// The jitter source is injectable (§9 Design Notes: time and randomness
/// must be injectable) so tests can drive this deterministically.
pub struct Backoff {
    init_backoff: f64,
    next_backoff_secs: f64,
    max_backoff_secs: f64,
    base: f64,
    jitter: Arc<dyn JitterSource>,
}

impl std::fmt::Debug for Backoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backoff")
            .field("init_backoff", &self.init_backoff)
            .field("next_backoff_secs", &self.next_backoff_secs)
            .field("max_backoff_secs", &self.max_backoff_secs)
            .field("base", &self.base)
            .finish()
    }
}

impl Backoff {
    /// Create a new [`Backoff`] from the provided [`BackoffConfig`], using
    /// the system jitter source.
    pub fn new(config: &BackoffConfig) -> Self {
        Self::new_with_jitter(config, Arc::new(SystemJitter::new()))
    }

    /// Creates a new `Backoff` with an explicit jitter source.
    pub fn new_with_jitter(config: &BackoffConfig, jitter: Arc<dyn JitterSource>) -> Self {
        let init_backoff = config.init_backoff.as_secs_f64();
        Self {
            init_backoff,
            next_backoff_secs: init_backoff,
            max_backoff_secs: config.max_backoff.as_secs_f64(),
            base: config.base,
            jitter,
        }
    }

    /// Returns the next backoff duration to wait for.
    pub fn next(&mut self) -> Duration {
        let span = (self.next_backoff_secs * self.base - self.init_backoff).max(0.0);
        let jittered = self.init_backoff + self.jitter.jitter(Duration::from_secs_f64(span)).as_secs_f64();

        let next_backoff = self.max_backoff_secs.min(jittered);
        Duration::from_secs_f64(std::mem::replace(&mut self.next_backoff_secs, next_backoff))
    }

    /// Perform an async operation that retries with a backoff.
    pub async fn retry_with_backoff<F, F1, B, E>(
        &mut self,
        task_name: &str,
        mut do_stuff: F,
    ) -> BackoffResult<B>
    where
        F: (FnMut() -> F1) + Send,
        F1: std::future::Future<Output = ControlFlow<B, E>> + Send,
        E: std::error::Error + Send,
    {
        loop {
            // first execute `F` and then use it, so we can avoid `F: Sync`.
            let do_stuff = do_stuff();

            let e = match do_stuff.await {
                ControlFlow::Break(r) => break Ok(r),
                ControlFlow::Continue(e) => e,
            };

            let backoff = self.next();
            info!(
                e=%e,
                task_name,
                backoff_secs = backoff.as_secs(),
                "request encountered non-fatal error - backing off",
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// Retry all errors.
    pub async fn retry_all_errors<F, F1, B, E>(
        &mut self,
        task_name: &str,
        mut do_stuff: F,
    ) -> BackoffResult<B>
    where
        F: (FnMut() -> F1) + Send,
        F1: std::future::Future<Output = Result<B, E>> + Send,
        E: std::error::Error + Send,
    {
        self.retry_with_backoff(task_name, move || {
            let do_stuff = do_stuff();

            async {
                match do_stuff.await {
                    Ok(b) => ControlFlow::Break(b),
                    Err(e) => ControlFlow::Continue(e),
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_time::SeededJitter;

    #[test]
    fn zero_jitter_is_deterministic_growth() {
        let config = BackoffConfig {
            init_backoff: Duration::from_secs_f64(1.0),
            max_backoff: Duration::from_secs_f64(500.0),
            base: 3.0,
        };
        let mut backoff = Backoff::new_with_jitter(&config, Arc::new(SeededJitter::zero()));

        for i in 0..10u32 {
            let value = (3.0f64.powi(i as i32)).min(500.0);
            let got = backoff.next().as_secs_f64();
            assert!((got - value).abs() < 0.0001, "{got} != {value}");
        }
    }

    #[test]
    fn never_exceeds_max_backoff() {
        let config = BackoffConfig {
            init_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            base: 4.0,
        };
        let mut backoff = Backoff::new(&config);
        for _ in 0..30 {
            assert!(backoff.next() <= Duration::from_secs(5));
        }
    }

    #[tokio::test]
    async fn retry_with_backoff_stops_on_break() {
        let config = BackoffConfig::default();
        let mut backoff = Backoff::new_with_jitter(&config, Arc::new(SeededJitter::zero()));
        let mut attempts = 0;
        let result: BackoffResult<u32> = backoff
            .retry_with_backoff("test", || {
                attempts += 1;
                async move {
                    if attempts < 3 {
                        ControlFlow::Continue(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
                    } else {
                        ControlFlow::Break(attempts)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(3));
    }
}
