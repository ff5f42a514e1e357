#![forbid(unsafe_code)]

//! Tracing layer that forwards events to the browser console.
//!
//! Each event becomes one line, `LEVEL target [span:span]: message k=v`,
//! written through a [`ConsoleSink`]. The wasm entry point installs the
//! layer once with a sink backed by `console.error` / `warn` / `log`;
//! tests capture lines in memory.
//!
//! ```ignore
//! use tracing_subscriber::prelude::*;
//!
//! let layer = ConsoleLayer::new(BrowserConsole);
//! tracing_subscriber::registry()
//!     .with(layer.with_filter(LevelFilter::WARN))
//!     .try_init()?;
//! ```

use std::fmt::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// Destination for formatted log lines.
pub trait ConsoleSink: Send + Sync + 'static {
    fn write_line(&self, level: Level, line: &str);
}

/// Fixed-width level tag.
fn level_str(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN ",
        Level::INFO => "INFO ",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// Collects the message and structured fields of one event.
#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let rendered = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.fields.push((field.name(), rendered));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        } else {
            self.fields.push((field.name(), value.to_owned()));
        }
    }
}

/// `tracing_subscriber` layer writing one line per event to a sink.
pub struct ConsoleLayer<S> {
    sink: S,
    show_spans: bool,
}

impl<S: ConsoleSink> ConsoleLayer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            show_spans: true,
        }
    }

    /// Builder: include the names of enclosing spans.
    #[must_use]
    pub fn show_spans(mut self, show: bool) -> Self {
        self.show_spans = show;
        self
    }
}

impl<S, Sub> Layer<Sub> for ConsoleLayer<S>
where
    S: ConsoleSink,
    Sub: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, Sub>) {
        let metadata = event.metadata();
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let mut line = String::new();
        let _ = write!(line, "{} {}", level_str(*metadata.level()), metadata.target());
        if self.show_spans
            && let Some(scope) = ctx.event_scope(event)
        {
            let names: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !names.is_empty() {
                let _ = write!(line, " [{}]", names.join(":"));
            }
        }
        line.push_str(": ");
        line.push_str(visitor.message.as_deref().unwrap_or_default());
        for (key, value) in &visitor.fields {
            let _ = write!(line, " {key}={value}");
        }

        self.sink.write_line(*metadata.level(), &line);
    }
}
