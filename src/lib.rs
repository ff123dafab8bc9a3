//! cowbtree - the node-level engine of a copy-on-write, disk-oriented B-tree.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            cowbtree                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Tree Driver (index/btree/tree)              │   │
//! │  │      get / insert / delete, root publish, page frees     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │         Node Search + Node Editor (index/btree)          │   │
//! │  │     lookup_floor | insert/update/delete, split, merge    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Node Codec (index/btree/node)               │   │
//! │  │   header | pointers | offsets | key/value records        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Page Store (storage/)                    │   │
//! │  │      PageStore trait: MemPageStore | DiskPageStore       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, Error, config)
//! - [`storage`] - Page store contract and implementations
//! - [`index`] - The B-tree itself
//!
//! # Quick Start
//! ```
//! use cowbtree::storage::MemPageStore;
//! use cowbtree::{BTree, TreeConfig};
//!
//! let mut tree = BTree::create(MemPageStore::new(), TreeConfig::default()).unwrap();
//! for i in 0..100u32 {
//!     tree.insert(format!("k{i}").as_bytes(), &i.to_le_bytes()).unwrap();
//! }
//! assert_eq!(tree.get(b"k42").unwrap(), Some(42u32.to_le_bytes().to_vec()));
//! ```

pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, PageId, Result, TreeConfig};

pub use index::btree::{BTree, Node, NodeType, StatsSnapshot, TreeInfo, TreeStats};
pub use storage::{DiskPageStore, MemPageStore, PageStore};
