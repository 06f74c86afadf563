//! The CLI-configurable logging pipeline: a `clap` section (§6 `logging`)
//! plus the glue that turns it into an installed global `tracing`
//! subscriber, built from [`logfmt`] and `tracing-subscriber`.
#![warn(missing_debug_implementations, clippy::use_self)]

pub mod cli;

use observability_deps::tracing::Subscriber;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, registry::LookupSpan, EnvFilter, Layer, Registry,
};

use cli::{LogFormat, LoggingConfig};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid log filter directive: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] observability_deps::tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to install log-crate bridge: {0}")]
    LogBridge(#[from] tracing_log::log_tracer::SetLoggerError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Builds the layered subscriber described by `config` writing through
/// `make_writer`, without installing it globally. Exposed separately from
/// [`install`] so tests can capture output instead of touching the real
/// global subscriber.
pub fn subscriber<W>(config: &LoggingConfig, make_writer: W) -> Result<impl Subscriber>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_new(&config.log_filter)?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format {
        LogFormat::Logfmt => Box::new(
            tracing_subscriber::fmt::layer()
                .event_format(LogfmtCompat)
                .with_writer(make_writer),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(make_writer),
        ),
    };

    Ok(Registry::default().with(filter).with(layer))
}

/// Installs the pipeline `config` describes as the process-wide default
/// subscriber, and bridges the `log` crate's macros through it so
/// dependencies using `log::info!` show up too.
pub fn install(config: &LoggingConfig) -> Result<()> {
    let subscriber = subscriber(config, std::io::stderr)?;
    observability_deps::tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

/// A `tracing_subscriber::fmt` event formatter that delegates to
/// [`logfmt`]'s escaping rules, so `install`'s default format and a
/// directly-constructed [`logfmt::LogFmtLayer`] agree on output shape.
#[derive(Debug, Clone, Copy, Default)]
struct LogfmtCompat;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for LogfmtCompat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &observability_deps::tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        write!(writer, "level={} target={} ", metadata.level(), metadata.target())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cli::LogFormat;
    use observability_deps::tracing::info;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::prelude::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Self;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn builds_a_working_logfmt_subscriber() {
        let capture = Capture::default();
        let config = LoggingConfig {
            log_filter: "info".to_string(),
            log_format: LogFormat::Logfmt,
        };
        let subscriber = subscriber(&config, capture.clone()).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            info!("breaker tripped");
        });

        let out = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("level=INFO"));
        assert!(out.contains("breaker tripped"));
    }
}
