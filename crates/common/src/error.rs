use thiserror::Error;
use serde::Serialize;

/// Common error type for ChatGate with clear taxonomy
#[derive(Error, Debug)]
pub enum Error {
    /// Client request errors (4xx)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Safety profile is missing required fields
    #[error("Configuration incomplete: missing {0}")]
    ConfigurationIncomplete(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Upstream failures. Scan and generation faults fail the turn closed.
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("Generation failed: {message}")]
    Generation {
        message: String,
        /// The provider rejected the content under its own safety policy
        content_filtered: bool,
    },

    /// Store faults. These never change the outcome of a turn.
    #[error("Store read failed: {0}")]
    StoreRead(String),

    #[error("Store write failed: {0}")]
    StorePersist(String),

    /// IO and serialization errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic anyhow error for flexibility
    #[error("Error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Generation fault that is not a provider-side content filter
    pub fn generation(message: impl Into<String>) -> Self {
        Error::Generation {
            message: message.into(),
            content_filtered: false,
        }
    }

    /// Generation fault raised by the provider's own content filter
    pub fn content_filtered(message: impl Into<String>) -> Self {
        Error::Generation {
            message: message.into(),
            content_filtered: true,
        }
    }

    pub fn is_content_filtered(&self) -> bool {
        matches!(self, Error::Generation { content_filtered: true, .. })
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::BadRequest(_) => 400,

            Error::ScanFailed(_) => 502,
            Error::Generation { content_filtered: true, .. } => 422,
            Error::Generation { .. } => 502,

            Error::StoreRead(_) => 503,
            Error::StorePersist(_) => 503,

            Error::ConfigurationIncomplete(_) => 500,
            Error::ConfigError(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::Anyhow(_) => 500,
        }
    }

    /// Get error type for metrics/logging
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::BadRequest(_) => "bad_request",
            Error::ConfigurationIncomplete(_) => "configuration_incomplete",
            Error::ConfigError(_) => "config_error",
            Error::ScanFailed(_) => "scan_failed",
            Error::Generation { content_filtered: true, .. } => "content_filtered",
            Error::Generation { .. } => "generation_failed",
            Error::StoreRead(_) => "store_read",
            Error::StorePersist(_) => "store_persist",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Anyhow(_) => "unknown",
        }
    }
}

/// Error response for HTTP API
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: u16,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        ErrorResponse {
            error: ErrorDetail {
                message: err.to_string(),
                r#type: err.error_type().to_string(),
                code: err.status_code(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
