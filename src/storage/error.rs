//! Storage layer error types
//!
//! Defines all errors that can occur while buffering, encoding, persisting
//! and reading segments.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Local I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Blob backend request failed (listing, container creation, read)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Segment bytes could not be turned back into a block
    /// (corrupt or truncated stream, malformed document, column-length mismatch)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Persisting a segment failed; the buffered rows were not written
    #[error("Flush error: {0}")]
    Flush(String),

    /// Key is not a well-formed segment key
    #[error("Invalid segment key: {0}")]
    InvalidKey(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// True for failures scoped to a single segment's contents
    pub fn is_decode(&self) -> bool {
        matches!(self, StorageError::Decode(_))
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::Decode("column length mismatch".to_string());
        assert_eq!(err.to_string(), "Decode error: column length mismatch");

        let err = StorageError::Flush("disk full".to_string());
        assert_eq!(err.to_string(), "Flush error: disk full");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
        assert!(!storage_err.is_decode());
    }
}
