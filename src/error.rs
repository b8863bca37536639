//! Error types and handling for Waterius
//!
//! This module defines the error types used throughout the crate. Transport
//! failures of any flavour (non-2xx, timeout, network) collapse into a single
//! `Api` kind; the coordinator wraps cycle failures into `UpdateFailed`.

use thiserror::Error;

/// Result type alias for Waterius operations
pub type Result<T> = std::result::Result<T, WateriusError>;

/// Main error type for Waterius
#[derive(Debug, Error)]
pub enum WateriusError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Account API errors (HTTP status, timeout, network)
    #[error("API error: {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// Response shape matched neither the paginated envelope nor a plain array
    #[error("Unexpected response format: {message}")]
    UnexpectedFormat { message: String },

    /// A refresh cycle failed; previous snapshot stays published
    #[error("Update failed: {message}")]
    UpdateFailed { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// HTTP server errors
    #[error("Web server error: {message}")]
    Web { message: String },
}

impl WateriusError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        WateriusError::Config {
            message: message.into(),
        }
    }

    /// Create a new API error without an HTTP status
    pub fn api<S: Into<String>>(message: S) -> Self {
        WateriusError::Api {
            status: None,
            message: message.into(),
        }
    }

    /// Create a new API error carrying the HTTP status that caused it
    pub fn http_status<S: Into<String>>(status: u16, message: S) -> Self {
        WateriusError::Api {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a new unexpected-format error
    pub fn unexpected_format<S: Into<String>>(message: S) -> Self {
        WateriusError::UnexpectedFormat {
            message: message.into(),
        }
    }

    /// Create a new update-failed error
    pub fn update_failed<S: Into<String>>(message: S) -> Self {
        WateriusError::UpdateFailed {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        WateriusError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        WateriusError::Io {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        WateriusError::Web {
            message: message.into(),
        }
    }

    /// HTTP status attached to an API error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            WateriusError::Api { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<std::io::Error> for WateriusError {
    fn from(err: std::io::Error) -> Self {
        WateriusError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for WateriusError {
    fn from(err: serde_yaml::Error) -> Self {
        WateriusError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for WateriusError {
    fn from(err: serde_json::Error) -> Self {
        WateriusError::Serialization {
            message: err.to_string(),
        }
    }
}
