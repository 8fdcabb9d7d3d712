//! Query error types

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can abort a search
///
/// Unreadable segments are not errors: they are skipped and counted in the
/// scan statistics.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The predicate was rejected before any I/O took place
    #[error("Validation error: {0}")]
    Validation(String),

    /// Listing the segment store failed; no partial results are returned
    #[error("Backend error: {0}")]
    Backend(#[from] StorageError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
