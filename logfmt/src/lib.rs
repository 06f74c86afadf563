//! A [`tracing_subscriber::Layer`] that writes events in logfmt
//! (`key=value key2=value2 ...`) form, the default wire format for this
//! engine's operator-facing logs.
#![warn(missing_debug_implementations, clippy::use_self)]

use std::{
    fmt,
    io::Write,
    sync::{Arc, Mutex},
};

use observability_deps::tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

/// Escapes a value the way logfmt readers expect: bare if it contains no
/// whitespace/quote/equals, double-quoted with backslash escapes otherwise.
fn format_value(out: &mut String, value: &str) {
    let needs_quoting = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '=');
    if !needs_quoting {
        out.push_str(value);
        return;
    }
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
}

struct LineBuilder {
    line: String,
}

impl LineBuilder {
    fn new() -> Self {
        Self {
            line: String::new(),
        }
    }

    fn field(&mut self, key: &str, value: &str) {
        if !self.line.is_empty() {
            self.line.push(' ');
        }
        self.line.push_str(key);
        self.line.push('=');
        format_value(&mut self.line, value);
    }
}

impl Visit for LineBuilder {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.field(field.name(), &format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.field(field.name(), value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.field(field.name(), &value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.field(field.name(), &value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.field(field.name(), &value.to_string());
    }
}

fn level_str(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "error",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG => "debug",
        Level::TRACE => "trace",
    }
}

/// The logfmt [`Layer`] itself. Writes one line per event to the configured
/// writer, which is held behind a mutex because `tracing` events can arrive
/// from any thread.
pub struct LogFmtLayer<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> fmt::Debug for LogFmtLayer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogFmtLayer").finish()
    }
}

impl<W: Write + Send + 'static> LogFmtLayer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }
}

impl<S, W> Layer<S> for LogFmtLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + Send + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut builder = LineBuilder::new();
        builder.field("level", level_str(metadata.level()));
        builder.field("target", metadata.target());
        event.record(&mut builder);

        let mut line = builder.line;
        line.push('\n');

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.write_all(line.as_bytes());
        }
    }
}
