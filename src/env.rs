//! Environment variable names used by this crate for convenient
//! configuration of the layer from services.
//!
//! These are purely helpers; the formatter itself never reads the
//! environment.

use crate::init::LayerConfig;

/// strftime pattern for the `time` key. Unset or empty means RFC 3339.
pub const FLUENTD_TIMESTAMP_FORMAT_ENV: &str = "FLUENTD_TIMESTAMP_FORMAT";

/// Most verbose level written, e.g. `info`. Unset means `trace`.
pub const FLUENTD_LOG_LEVEL_ENV: &str = "FLUENTD_LOG_LEVEL";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl LayerConfig {
    /// Config from [`FLUENTD_TIMESTAMP_FORMAT_ENV`] and
    /// [`FLUENTD_LOG_LEVEL_ENV`]; anything missing or unparsable keeps its
    /// default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| Some(env_or(key, "")))
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = LayerConfig::default();
        if let Some(format) = lookup(FLUENTD_TIMESTAMP_FORMAT_ENV).filter(|f| !f.is_empty()) {
            config.timestamp_format = Some(format);
        }
        if let Some(level) = lookup(FLUENTD_LOG_LEVEL_ENV) {
            if let Ok(level) = level.parse::<tracing::Level>() {
                config.max_level = level;
            }
        }
        config
    }
}
