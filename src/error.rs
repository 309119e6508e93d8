/// Error returned when a [`LogEntry`](crate::record::LogEntry) cannot be
/// turned into a JSON line. No partial output accompanies it.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("failed to marshal fields to JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Error returned when a formatter is built from an unusable configuration.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid timestamp format {0:?}")]
    InvalidTimestampFormat(String),
}

/// Error returned when a severity name is not recognized.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("not a valid log level: {0:?}")]
pub struct ParseLevelError(pub String);

/// Error type returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}
