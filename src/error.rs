//! Error types for the chunked queue.
//!
//! Mirrors the error kinds the spec distinguishes (§7): invalid input,
//! not-found, conflict, transient, and truncation. `Incomplete` is kept
//! internal to the replicator and never escapes as a public error.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input: empty record, invalid category name,
    /// missing query parameter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A chunk file or KV key that should exist does not.
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempted to create a chunk file that already exists on disk.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A transport or coordination call failed in a way that is worth
    /// retrying (HTTP error, KV timeout).
    #[error("transient error: {0}")]
    Transient(String),

    /// Underlying filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Coordinator (KV) error.
    #[error("coordinator error: {0}")]
    Kv(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an invalid-input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a transient error.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Whether this error is worth retrying (transient or I/O that may
    /// clear up, e.g. a momentarily unavailable peer).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Whether the replicator should abandon the chunk instead of retrying.
    pub fn is_terminal_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
