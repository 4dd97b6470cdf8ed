//! Error types for the plugin host.

use thiserror::Error;

/// Result type alias for plugin host operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in plugin host operations.
#[derive(Error, Debug)]
pub enum Error {
    // Descriptor errors
    #[error("Invalid plugin descriptor: field `{field}` {reason}")]
    Validation { field: String, reason: String },

    // Registry errors
    #[error("Plugin already registered: {0}")]
    DuplicateId(String),

    #[error("Plugin not found: {0}")]
    NotFound(String),

    // Lifecycle errors
    #[error("Install hook of plugin '{id}' failed: {message}")]
    InstallHook { id: String, message: String },

    // Persistence errors
    #[error("Override persistence failed: {0}")]
    Persistence(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a validation error for a descriptor field.
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error refers to an unknown plugin id.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
