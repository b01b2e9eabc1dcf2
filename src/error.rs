//! Error types for the persisted library.
//!
//! This module defines the fixed set of failure modes a caller can observe
//! from the log engine and its container adapters, using the `thiserror`
//! crate for automatic error trait implementations.

use thiserror::Error;

/// Comprehensive error type covering every failure mode exposed by this
/// crate: log validation, replay, encoding, and the container adapters'
/// own bounds/lookup errors.
#[derive(Error, Debug)]
pub enum Error {
    /// The backing file could not be created, opened, read, written,
    /// replaced, or stat'd.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File content failed parsing at construction, or an unknown op name
    /// was seen at replay.
    #[error("malformed log: {0}")]
    MalformedLog(String),

    /// A supplied parameter, key, or value is not JSON-encodable.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// A list index fell outside `[0, len)`.
    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },

    /// A value or key was not present (list `remove`/`index_of`, map
    /// `get`/`delete`).
    #[error("value not found")]
    NotFound,

    /// `pop_back` was called on an empty list.
    #[error("list is empty")]
    Empty,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
