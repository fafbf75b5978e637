//! Error taxonomy for the symbol database.

use std::io;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DbError>;

/// Every failure the database can surface.
///
/// Low-level storage faults (bounds violations, stale references, checksum
/// mismatches, bad record kinds) all funnel into [`DbError::Corruption`] so
/// callers have a single failure path for "this database is unusable and
/// needs a full rebuild".
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Structural corruption was detected. Fatal for the whole database.
    #[error("corruption detected: {0}")]
    Corruption(String),
    /// A named entity was not present.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The caller passed something the database cannot act on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation is undefined for this node kind (e.g. occurrence
    /// queries against a purely structural type node).
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// A cooperative cancellation signal stopped a long-running query.
    #[error("interrupted")]
    Interrupted,
}

impl DbError {
    /// True when the error means the database should be rebuilt rather
    /// than retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DbError::Corruption(_))
    }
}
