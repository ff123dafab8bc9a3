//! Storage layer - page stores holding encoded nodes.
//!
//! This module provides the collaborator the tree persists through:
//! - [`PageStore`] - The fetch / allocate / free contract
//! - [`MemPageStore`] - In-memory page table
//! - [`DiskPageStore`] - Single-file store of fixed-size pages

mod disk_store;
mod memory;
mod page_store;

pub use disk_store::DiskPageStore;
pub use memory::MemPageStore;
pub use page_store::PageStore;
