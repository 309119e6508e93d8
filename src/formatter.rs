use crate::error::{ConfigError, FormatError};
use crate::record::LogEntry;
use crate::value::{normalize, NormalizedValue};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

/// Output key holding the rendered entry timestamp.
pub const TIME_KEY: &str = "time";
/// Output key holding the entry message.
pub const MESSAGE_KEY: &str = "message";
/// Output key holding the entry level name.
pub const SEVERITY_KEY: &str = "severity";

/// User field names that get copied under [`CLASH_PREFIX`] before the
/// canonical keys are written.
pub const CLASHING_KEYS: [&str; 3] = ["time", "msg", "level"];
pub const CLASH_PREFIX: &str = "fields.";

/// Turns a [`LogEntry`] into the bytes of one output line.
///
/// Implementations must be pure: no I/O, no shared mutable state. Writing
/// the returned bytes is the caller's job.
pub trait EntryFormatter: Send + Sync {
    fn format(&self, entry: &LogEntry) -> Result<Vec<u8>, FormatError>;
}

/// Formatter settings, fixed at construction.
///
/// `timestamp_format` is a chrono strftime pattern (e.g. `%Y-%m-%d %H:%M:%S`).
/// `None` or an empty pattern renders RFC 3339 with second precision.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormatterConfig {
    pub timestamp_format: Option<String>,
}

impl FormatterConfig {
    pub fn with_timestamp_format(format: impl Into<String>) -> Self {
        Self {
            timestamp_format: Some(format.into()),
        }
    }
}

/// JSON formatter whose output fluentd on Kubernetes understands: the
/// level goes under `severity`, the text under `message`.
#[derive(Clone, Debug, Default)]
pub struct FluentdFormatter {
    timestamp_format: Option<String>,
}

impl FluentdFormatter {
    /// Build a formatter, rejecting timestamp patterns chrono cannot parse.
    pub fn new(config: FormatterConfig) -> Result<Self, ConfigError> {
        let timestamp_format = config.timestamp_format.filter(|f| !f.is_empty());
        if let Some(pattern) = &timestamp_format {
            if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                return Err(ConfigError::InvalidTimestampFormat(pattern.clone()));
            }
        }
        Ok(Self { timestamp_format })
    }

    pub fn timestamp_format(&self) -> Option<&str> {
        self.timestamp_format.as_deref()
    }

    /// `new` has rejected malformed patterns and `DateTime<Utc>` supplies
    /// every field a pattern can ask for, so rendering cannot fail.
    fn render_timestamp(&self, timestamp: &DateTime<Utc>) -> String {
        match &self.timestamp_format {
            None => timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            Some(pattern) => timestamp.format(pattern).to_string(),
        }
    }

    /// Normalized fields plus the three canonical keys, ready to serialize.
    pub fn build_record(&self, entry: &LogEntry) -> BTreeMap<String, NormalizedValue> {
        let mut data: BTreeMap<String, NormalizedValue> = entry
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), normalize(v)))
            .collect();
        prefix_field_clashes(&mut data);

        data.insert(
            TIME_KEY.to_string(),
            NormalizedValue::Text(self.render_timestamp(&entry.timestamp)),
        );
        data.insert(
            MESSAGE_KEY.to_string(),
            NormalizedValue::Text(entry.message.clone()),
        );
        data.insert(
            SEVERITY_KEY.to_string(),
            NormalizedValue::Text(entry.level.to_string()),
        );
        data
    }

    /// Same as [`EntryFormatter::format`] but returns the line as text,
    /// including the trailing newline.
    pub fn format_to_string(&self, entry: &LogEntry) -> Result<String, FormatError> {
        let mut line = serde_json::to_string(&self.build_record(entry))?;
        line.push('\n');
        Ok(line)
    }
}

impl EntryFormatter for FluentdFormatter {
    fn format(&self, entry: &LogEntry) -> Result<Vec<u8>, FormatError> {
        let mut serialized = serde_json::to_vec(&self.build_record(entry))?;
        serialized.push(b'\n');
        Ok(serialized)
    }
}

/// Copy user fields named `time`, `msg` or `level` to `fields.<name>`.
/// The originals stay in place; `time` is later overwritten by the
/// canonical timestamp.
fn prefix_field_clashes(data: &mut BTreeMap<String, NormalizedValue>) {
    for key in CLASHING_KEYS {
        if let Some(value) = data.get(key).cloned() {
            data.insert(format!("{}{}", CLASH_PREFIX, key), value);
        }
    }
}
