//! Index structures.
//!
//! - [`btree`] - Copy-on-write B-tree over a [`PageStore`](crate::storage::PageStore)

pub mod btree;
