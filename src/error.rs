//! Error taxonomy for broker operations
//!
//! Every broker reply, transport failure, and client-side validation failure
//! is classified into one of the canonical Pub/Sub status codes so callers
//! can match on the kind of failure without knowing which adapter produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for messaging operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PubSubError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Resource already exists: {resource}")]
    AlreadyExists { resource: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Broker unavailable: {message}")]
    Unavailable { message: String },

    #[error("Deadline exceeded: {message}")]
    DeadlineExceeded { message: String },

    #[error("Unknown broker error: {message}")]
    Unknown { message: String },
}

/// Canonical status codes as reported by the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    Unavailable,
    DeadlineExceeded,
    Unknown,
}

impl ErrorCode {
    /// Classify a status string from a broker error envelope
    pub fn from_status(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "NOT_FOUND" => ErrorCode::NotFound,
            "ALREADY_EXISTS" => ErrorCode::AlreadyExists,
            "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "OUT_OF_RANGE" => {
                ErrorCode::InvalidArgument
            }
            "UNAVAILABLE" | "RESOURCE_EXHAUSTED" | "ABORTED" => ErrorCode::Unavailable,
            "DEADLINE_EXCEEDED" => ErrorCode::DeadlineExceeded,
            _ => ErrorCode::Unknown,
        }
    }

    /// Classify a bare HTTP status when the broker sent no status string
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => ErrorCode::InvalidArgument,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::AlreadyExists,
            429 | 502 | 503 => ErrorCode::Unavailable,
            504 => ErrorCode::DeadlineExceeded,
            _ => ErrorCode::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// Build the error carrying this code
    pub fn into_error<S: Into<String>>(self, message: S) -> PubSubError {
        let message = message.into();
        match self {
            ErrorCode::NotFound => PubSubError::NotFound { resource: message },
            ErrorCode::AlreadyExists => PubSubError::AlreadyExists { resource: message },
            ErrorCode::InvalidArgument => PubSubError::InvalidArgument { message },
            ErrorCode::Unavailable => PubSubError::Unavailable { message },
            ErrorCode::DeadlineExceeded => PubSubError::DeadlineExceeded { message },
            ErrorCode::Unknown => PubSubError::Unknown { message },
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PubSubError {
    /// Status code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            PubSubError::NotFound { .. } => ErrorCode::NotFound,
            PubSubError::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            PubSubError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            PubSubError::Unavailable { .. } => ErrorCode::Unavailable,
            PubSubError::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
            PubSubError::Unknown { .. } => ErrorCode::Unknown,
        }
    }

    /// Whether the pull loop may retry after this error
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PubSubError::Unavailable { .. } | PubSubError::DeadlineExceeded { .. }
        )
    }

    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn already_exists<S: Into<String>>(resource: S) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn deadline_exceeded<S: Into<String>>(message: S) -> Self {
        Self::DeadlineExceeded {
            message: message.into(),
        }
    }

    pub fn unknown<S: Into<String>>(message: S) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }
}

/// Result type for messaging operations
pub type PubSubResult<T> = Result<T, PubSubError>;
