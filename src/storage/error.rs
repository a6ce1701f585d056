//! Error types for time-series store operations

use std::fmt;

use crate::schema::SchemaError;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to the time-series store
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// The store could not be reached or the request failed in transit
    ConnectionFailed(String),

    /// The store answered with a non-success status
    Rejected { status: u16, body: String },

    /// The series name has no known column layout
    UnknownSeries(String),

    /// Invalid configuration
    InvalidConfig(String),

    /// Batch serialization error
    SerializationError(String),
}

impl StorageError {
    /// A `400 Bad Request` answer: the destination database or series layout
    /// does not match what was sent.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, StorageError::Rejected { status: 400, .. })
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => {
                write!(f, "failed to reach time-series store: {}", msg)
            }
            StorageError::Rejected { status, body } => {
                write!(f, "store rejected request with status {}: {}", status, body)
            }
            StorageError::UnknownSeries(name) => write!(f, "unrecognized series '{}'", name),
            StorageError::InvalidConfig(msg) => write!(f, "invalid storage configuration: {}", msg),
            StorageError::SerializationError(msg) => {
                write!(f, "series serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::ConnectionFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

impl From<SchemaError> for StorageError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownSeries(name) => StorageError::UnknownSeries(name),
        }
    }
}
