//! Fluentd-compatible JSON log formatting for `tracing`.
//!
//! [`FluentdFormatter`] turns a [`LogEntry`] into one newline-terminated
//! JSON object with `time`, `message` and `severity` keys plus the entry's
//! fields reduced by [`normalize`]. [`FluentdLayer`] wires the formatter
//! into a `tracing_subscriber` stack.

pub mod error;
pub mod level;
pub mod record;
pub mod value;
pub mod formatter;
pub mod layer;

pub mod env;
pub mod init;

pub use error::{ConfigError, FormatError, InitError, ParseLevelError};
pub use formatter::{EntryFormatter, FluentdFormatter, FormatterConfig};
pub use layer::FluentdLayer;
pub use level::Level;
pub use record::LogEntry;
pub use value::{normalize, NormalizedValue, Record, Value};
