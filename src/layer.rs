use crate::formatter::{EntryFormatter, FluentdFormatter};
use crate::level::Level;
use crate::record::LogEntry;
use crate::value::Value;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns every event into a [`LogEntry`],
/// formats it with an [`EntryFormatter`] and writes the resulting line to
/// a [`MakeWriter`].
///
/// Events more verbose than `max_level` are skipped. A line that fails to
/// format or write is dropped and counted; the layer never logs through
/// `tracing` itself, so diagnostics go to stderr.
pub struct FluentdLayer<W, F = FluentdFormatter> {
    make_writer: W,
    formatter: F,
    max_level: tracing::Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Lines successfully written.
    pub written_events: Arc<AtomicU64>,
    /// Lines dropped because formatting or writing failed.
    pub failed_events: Arc<AtomicU64>,
}

impl<W> FluentdLayer<W, FluentdFormatter>
where
    W: for<'w> MakeWriter<'w> + 'static,
{
    /// Layer using an RFC 3339 [`FluentdFormatter`] and no level filter.
    pub fn new(make_writer: W) -> Self {
        Self::with_formatter(make_writer, FluentdFormatter::default())
    }
}

impl<W, F> FluentdLayer<W, F>
where
    W: for<'w> MakeWriter<'w> + 'static,
    F: EntryFormatter + 'static,
{
    pub fn with_formatter(make_writer: W, formatter: F) -> Self {
        Self {
            make_writer,
            formatter,
            max_level: tracing::Level::TRACE,
            total_events: Arc::new(AtomicU64::new(0)),
            written_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Skip events more verbose than `level`.
    pub fn with_max_level(mut self, level: tracing::Level) -> Self {
        self.max_level = level;
        self
    }

    fn emit(&self, entry: &LogEntry) {
        let line = match self.formatter.format(entry) {
            Ok(line) => line,
            Err(e) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("dropping log line: {}", e);
                return;
            }
        };

        let mut writer = self.make_writer.make_writer();
        match writer.write_all(&line) {
            Ok(()) => {
                self.written_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("error writing log line: {}", e);
            }
        }
    }
}

impl<S, W, F> Layer<S> for FluentdLayer<W, F>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'w> MakeWriter<'w> + 'static,
    F: EntryFormatter + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if *meta.level() > self.max_level {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let entry = LogEntry {
            timestamp: Utc::now(),
            level: Level::from(*meta.level()),
            message: message.unwrap_or_default(),
            fields,
        };
        self.emit(&entry);
    }
}

/// Error recorded through [`Visit::record_error`]; keeps only the message
/// since the borrowed error cannot outlive the event.
#[derive(thiserror::Error, Debug)]
#[error("{0}")]
struct RecordedError(String);

/// Collects event fields into [`Value`]s; the `message` field becomes the
/// entry message.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_i128(&mut self, field: &Field, value: i128) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u128(&mut self, field: &Field, value: u128) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.insert(
            field.name().to_string(),
            Value::error(RecordedError(value.to_string())),
        );
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields
                .insert(field.name().to_string(), Value::display(format!("{:?}", value)));
        }
    }
}
