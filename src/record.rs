use crate::level::Level;
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One structured log event, handed to a formatter right after it is built.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, Value>,
}

impl LogEntry {
    /// Entry stamped with the current time and no fields.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a field; a later field with the same key replaces the earlier one.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
