//! Copy-on-write B-tree.
//!
//! # Components
//! - [`node`] - Binary page layout and accessors
//! - [`search`] - Floor lookup inside one node
//! - [`editor`] - Pure insert / update / delete / split / merge on nodes
//! - [`BTree`] - Root-to-leaf mutation driver over a page store
//! - [`TreeStats`] - Split, merge and page counters

pub mod editor;
pub mod node;
pub mod search;
mod stats;
mod tree;

pub use node::{Node, NodeType};
pub use search::lookup_floor;
pub use stats::{StatsSnapshot, TreeStats};
pub use tree::{BTree, TreeInfo};
