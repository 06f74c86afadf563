//! Test-only utilities shared across the workspace: capturing a tracing
//! subscriber for assertions on log output, a `future_timeout` helper for
//! async tests that must not hang forever, and a couple of small
//! assertion helpers.
#![warn(missing_debug_implementations, clippy::use_self)]

#[cfg(feature = "future_timeout")]
mod timeout;

#[cfg(feature = "future_timeout")]
pub use timeout::FutureTimeout;

use std::sync::{Arc, Mutex};

use tracing_subscriber::{fmt::MakeWriter, prelude::*};

/// A `Write`r that appends to an in-memory buffer, usable as a
/// `tracing_subscriber` writer for asserting on emitted log lines.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).expect("captured logs are not utf8")
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `body` with a `tracing` subscriber installed that writes to the
/// returned [`CapturedLogs`] buffer, for tests that assert on a particular
/// log line appearing (e.g. a breaker open/close transition, §4.3).
pub fn with_captured_logs<R>(body: impl FnOnce() -> R) -> (R, CapturedLogs) {
    let capture = CapturedLogs::new();
    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_writer(capture.clone())
            .with_ansi(false),
    );
    let result = tracing::subscriber::with_default(subscriber, body);
    (result, capture)
}

/// Creates an empty temp directory that is removed on drop, for tests that
/// need a real filesystem path (e.g. a hotswap credentials file).
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_log_lines() {
        let (_, logs) = with_captured_logs(|| {
            observability_deps::tracing::info!(attempt = 1, "retrying");
        });
        assert!(logs.contents().contains("retrying"));
    }
}
