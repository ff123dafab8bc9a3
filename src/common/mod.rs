//! Common types and utilities shared across cowbtree.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`TreeConfig`]
//! - Error types
//! - Page identifiers

pub mod config;
pub mod error;
mod page_id;

pub use config::TreeConfig;
pub use error::{Error, Result};
pub use page_id::PageId;
