//! Node editor: builds new node buffers from an old node plus an edit.
//!
//! Every function here is pure. The input node is only read, and the
//! output is a freshly allocated buffer that may temporarily exceed the
//! page size until it has been through [`split`].

use crate::common::config::NODE_HEADER_SIZE;
use crate::common::PageId;

use super::node::{range_size, Node, NodeType};

/// An edit applied to one position of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafEdit<'a> {
    /// Insert a new record so that it lands at the given position.
    Insert { key: &'a [u8], val: &'a [u8] },
    /// Overwrite the record at the given position.
    Update { key: &'a [u8], val: &'a [u8] },
    /// Remove the record at the given position.
    Delete,
}

/// Apply `edit` at `pos` and split the result to page size.
///
/// Returns one node, or two or three when the edited leaf overflowed.
pub fn apply_leaf_edit<B: AsRef<[u8]>>(
    old: &Node<B>,
    pos: usize,
    edit: LeafEdit<'_>,
    page_size: usize,
) -> Vec<Node> {
    let edited = match edit {
        LeafEdit::Insert { key, val } => leaf_insert(old, pos, key, val),
        LeafEdit::Update { key, val } => leaf_update(old, pos, key, val),
        LeafEdit::Delete => leaf_delete(old, pos),
    };
    split(edited, page_size)
}

/// Copy of `old` with `(key, val)` inserted at `idx`.
pub fn leaf_insert<B: AsRef<[u8]>>(old: &Node<B>, idx: usize, key: &[u8], val: &[u8]) -> Node {
    let n = old.nkeys();
    assert!(idx <= n, "insert position {idx} out of range");
    let mut new = Node::with_header(NodeType::Leaf, n + 1);
    new.append_range(old, 0, 0, idx);
    new.append(idx, PageId::INVALID, key, val);
    new.append_range(old, idx + 1, idx, n - idx);
    new
}

/// Copy of `old` with the record at `idx` replaced by `(key, val)`.
pub fn leaf_update<B: AsRef<[u8]>>(old: &Node<B>, idx: usize, key: &[u8], val: &[u8]) -> Node {
    let n = old.nkeys();
    assert!(idx < n, "update position {idx} out of range");
    let mut new = Node::with_header(NodeType::Leaf, n);
    new.append_range(old, 0, 0, idx);
    new.append(idx, PageId::INVALID, key, val);
    new.append_range(old, idx + 1, idx + 1, n - idx - 1);
    new
}

/// Copy of `old` without the record at `idx`.
pub fn leaf_delete<B: AsRef<[u8]>>(old: &Node<B>, idx: usize) -> Node {
    let n = old.nkeys();
    assert!(idx < n, "delete position {idx} out of range");
    let mut new = Node::with_header(NodeType::Leaf, n - 1);
    new.append_range(old, 0, 0, idx);
    new.append_range(old, idx, idx + 1, n - idx - 1);
    new
}

/// Copy of internal node `old` with the `count` children starting at `idx`
/// replaced by `kids`, each given as `(first key, page)`.
///
/// An empty `kids` removes the children.
pub fn replace_children<B: AsRef<[u8]>, K: AsRef<[u8]>>(
    old: &Node<B>,
    idx: usize,
    count: usize,
    kids: &[(K, PageId)],
) -> Node {
    let n = old.nkeys();
    assert_eq!(old.node_type(), NodeType::Internal, "children replaced in a leaf");
    assert!(idx + count <= n, "child range {idx}..{} out of range", idx + count);
    let mut new = Node::with_header(NodeType::Internal, n - count + kids.len());
    new.append_range(old, 0, 0, idx);
    for (i, (key, child)) in kids.iter().enumerate() {
        new.append(idx + i, *child, key.as_ref(), &[]);
    }
    new.append_range(old, idx + kids.len(), idx + count, n - idx - count);
    new
}

/// Whether `left` and `right` merged into one node would fit in a page.
pub fn fits_merged<L: AsRef<[u8]>, R: AsRef<[u8]>>(
    left: &Node<L>,
    right: &Node<R>,
    page_size: usize,
) -> bool {
    left.nbytes() + right.nbytes() - NODE_HEADER_SIZE <= page_size
}

/// Concatenate two adjacent siblings into one node.
pub fn merge<L: AsRef<[u8]>, R: AsRef<[u8]>>(left: &Node<L>, right: &Node<R>) -> Node {
    let node_type = left.node_type();
    assert_eq!(node_type, right.node_type(), "merging nodes of different types");
    let (nl, nr) = (left.nkeys(), right.nkeys());
    let mut new = Node::with_header(node_type, nl + nr);
    new.append_range(left, 0, 0, nl);
    new.append_range(right, nl, 0, nr);
    new
}

/// Split `node` into pieces that each fit in `page_size`.
///
/// Returns the node unchanged when it already fits, otherwise two pieces,
/// or three when a single large record keeps the left half oversized.
///
/// # Panics
/// Panics if one record alone cannot fit in a page. Tree configuration
/// validation makes that unreachable.
pub fn split(node: Node, page_size: usize) -> Vec<Node> {
    if node.nbytes() <= page_size {
        return vec![node];
    }
    let (left, right) = split_half(&node, page_size);
    if left.nbytes() <= page_size {
        return vec![left, right];
    }
    let (leftmost, middle) = split_half(&left, page_size);
    assert!(
        leftmost.nbytes() <= page_size,
        "three-way split left {} bytes in the first piece",
        leftmost.nbytes()
    );
    vec![leftmost, middle, right]
}

/// Divide `node` near its middle key so that the right piece fits.
///
/// The left piece is also made to fit when some division point allows it.
fn split_half<B: AsRef<[u8]>>(node: &Node<B>, page_size: usize) -> (Node, Node) {
    let n = node.nkeys();
    assert!(n >= 2, "cannot split a node of {n} keys and {} bytes", node.nbytes());
    for i in 0..n {
        assert!(
            range_size(node, i, i + 1) <= page_size,
            "record at position {i} exceeds the per-record budget"
        );
    }

    let mut nleft = n / 2;
    while nleft > 1 && range_size(node, 0, nleft) > page_size {
        nleft -= 1;
    }
    while range_size(node, nleft, n) > page_size {
        nleft += 1;
    }
    debug_assert!(0 < nleft && nleft < n);

    let node_type = node.node_type();
    let mut left = Node::with_header(node_type, nleft);
    left.append_range(node, 0, 0, nleft);
    let mut right = Node::with_header(node_type, n - nleft);
    right.append_range(node, 0, nleft, n - nleft);
    (left, right)
}
