use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, CaptionError>;

/// The Error type for caption queue operations.
#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration validation error: {0}")]
    ConfigValidationError(String),

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization/Deserialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("YAML error: {source}")]
    YamlError {
        #[from]
        source: serde_yaml::Error,
    },

    /// `start()` was called while a run is still consuming the queue.
    #[error("Worker is already running")]
    AlreadyRunning,

    /// `start()` was called with nothing pending.
    #[error("No work items queued")]
    NoWork,

    #[error("Result log error: {0}")]
    Persistence(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl CaptionError {
    /// True for errors raised synchronously by control-call misuse.
    pub fn is_state_error(&self) -> bool {
        matches!(self, CaptionError::AlreadyRunning | CaptionError::NoWork)
    }
}
