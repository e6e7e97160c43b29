//! Typed error definitions for the position-ranking system.
//!
//! Provides [`RankError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the position-ranking system.
#[derive(Debug, Error)]
pub enum RankError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// Connection, timeout or other transport-level failure of one request.
    #[error("transport error: {0}")]
    Transport(String),

    /// A request failed on every attempt of its retry budget.
    #[error("retries exhausted after {attempts} attempts: {label}")]
    RetriesExhausted { label: String, attempts: u32 },

    /// Report structure did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Report bytes could not be decoded with any supported text encoding.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Archive download, extraction or cleanup error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Document-store connection, query or write error.
    #[error("store error: {0}")]
    Store(String),
}

impl From<rusqlite::Error> for RankError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}
