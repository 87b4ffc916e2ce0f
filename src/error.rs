use thiserror::Error;

/// Errors raised by the localization engine.
///
/// Data conditions that are expected during normal operation (an incompatible
/// candidate translation, a malformed annotation, a placeholder without its
/// closing delimiter) are not errors: they are reported as values by the code
/// that detects them.
#[derive(Error, Debug)]
pub enum L10nError {
    /// Invalid or missing configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A provider was asked for an operation its capabilities do not include
    #[error("Provider '{provider}' does not support {operation}")]
    UnsupportedOperation {
        provider: String,
        operation: &'static str,
    },

    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// A done job is immutable
    #[error("Job {0} is already done")]
    JobAlreadyDone(String),

    #[error("Job {0} already exists")]
    JobExists(String),

    /// Job GUIDs name files, so they may not contain path components
    #[error("Invalid job GUID: {0:?}")]
    InvalidJobGuid(String),

    /// A source or target resource could not be read
    #[error("Could not fetch resource '{rid}' ({lang}): {reason}")]
    FetchFailure {
        lang: String,
        rid: String,
        reason: String,
    },

    /// A resource could not be parsed or regenerated by its filter
    #[error("Filter error: {0}")]
    Filter(String),

    /// A provider failed while handling a job
    #[error("Provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },

    /// A plain-text translator failed
    #[error("Translation error: {0}")]
    Translation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for localization operations
pub type L10nResult<T> = Result<T, L10nError>;

impl L10nError {
    pub fn unsupported(provider: &str, operation: &'static str) -> Self {
        L10nError::UnsupportedOperation {
            provider: provider.to_string(),
            operation,
        }
    }

    pub fn provider(provider: &str, message: impl std::fmt::Display) -> Self {
        L10nError::Provider {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }
}
