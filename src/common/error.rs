//! Error types for cowbtree.
//!
//! Only recoverable failures live here. A missing key is not an error
//! (`Ok(None)` / `Ok(false)`), and a broken node invariant is a panic.

use thiserror::Error;

use super::PageId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All recoverable errors surfaced by the tree and the page stores.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from a page store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page lies outside the backing file or has been freed.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// A buffer handed to a fixed-size store is not exactly one page.
    #[error("page buffer is {actual} bytes, expected {expected}")]
    PageSizeMismatch { expected: usize, actual: usize },

    /// The empty key is reserved for the leftmost sentinel entry.
    #[error("empty keys are not allowed")]
    EmptyKey,

    /// Key is longer than the configured maximum.
    #[error("key length {len} exceeds maximum {max}")]
    KeyTooLarge { len: usize, max: usize },

    /// Value is longer than the configured maximum.
    #[error("value length {len} exceeds maximum {max}")]
    ValueTooLarge { len: usize, max: usize },

    /// Page size and record limits do not fit together.
    #[error("invalid tree configuration: {0}")]
    InvalidConfig(String),
}
