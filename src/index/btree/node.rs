//! B-tree node codec.
//!
//! A [`Node`] is a densely packed byte buffer. The same type serves as a
//! read-only view over a fetched page (`Node<&[u8]>`) and as a freshly built
//! owned buffer (`Node<Vec<u8>>`). Built nodes are never edited after they
//! are handed to a page store.
//!
//! # Layout
//! ```text
//! | type | nkeys | pointers   | offsets    | records ... | unused |
//! |  2B  |  2B   | nkeys × 8B | nkeys × 2B |             |        |
//!
//! record: | key_len 2B | val_len 2B | key | val |
//! ```
//!
//! All integers are little-endian. `offsets[i - 1]` is the end of record
//! `i - 1` relative to the start of the record area, so the offset of
//! position 0 is implicitly 0 and `offset(nkeys)` is the record area size.
//! Leaves keep a zeroed pointer table; internal nodes store empty values.

use std::fmt;

use crate::common::config::{NODE_HEADER_SIZE, OFFSET_SIZE, POINTER_SIZE, RECORD_HEADER_SIZE};
use crate::common::PageId;

/// Node discriminator stored in the first two bytes of a page.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Routing node: keys plus child pointers.
    Internal = 1,
    /// Data node: keys plus values.
    Leaf = 2,
}

impl NodeType {
    /// Convert from u16, returning `None` for unknown values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(NodeType::Internal),
            2 => Some(NodeType::Leaf),
            _ => None,
        }
    }
}

#[inline]
fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

#[inline]
fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// Encoded size of positions `lo..hi` of `node` if they formed a node of their own.
pub(crate) fn range_size<B: AsRef<[u8]>>(node: &Node<B>, lo: usize, hi: usize) -> usize {
    NODE_HEADER_SIZE + (POINTER_SIZE + OFFSET_SIZE) * (hi - lo) + node.offset(hi) - node.offset(lo)
}

/// A B-tree node over some byte buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Node<B = Vec<u8>> {
    buf: B,
}

impl<'a> Node<&'a [u8]> {
    /// Decode a page into a read-only view borrowing it.
    ///
    /// # Panics
    /// Panics if the header names an unknown node type or the tables and
    /// records claimed by the header do not lie inside `page`. Either means
    /// the page is corrupted.
    pub fn decode(page: &'a [u8]) -> Self {
        assert!(page.len() >= NODE_HEADER_SIZE, "page too small for a node header");
        let node = Node { buf: page };
        assert!(
            NodeType::from_u16(read_u16(page, 0)).is_some(),
            "corrupted node: unknown type {}",
            read_u16(page, 0)
        );
        assert!(
            node.record_area_start() <= page.len(),
            "corrupted node: {} keys overrun the page",
            node.nkeys()
        );
        assert!(
            node.nbytes() <= page.len(),
            "corrupted node: records overrun the page"
        );
        node
    }
}

impl<B: AsRef<[u8]>> Node<B> {
    #[inline]
    fn data(&self) -> &[u8] {
        self.buf.as_ref()
    }

    /// Node type from the header.
    pub fn node_type(&self) -> NodeType {
        let raw = read_u16(self.data(), 0);
        NodeType::from_u16(raw).unwrap_or_else(|| panic!("corrupted node: unknown type {raw}"))
    }

    /// Whether this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        self.node_type() == NodeType::Leaf
    }

    /// Number of keys (and pointers) in this node.
    #[inline]
    pub fn nkeys(&self) -> usize {
        read_u16(self.data(), 2) as usize
    }

    #[inline]
    fn record_area_start(&self) -> usize {
        NODE_HEADER_SIZE + (POINTER_SIZE + OFFSET_SIZE) * self.nkeys()
    }

    #[inline]
    fn offset_pos(&self, idx: usize) -> usize {
        debug_assert!(1 <= idx && idx <= self.nkeys());
        NODE_HEADER_SIZE + POINTER_SIZE * self.nkeys() + OFFSET_SIZE * (idx - 1)
    }

    /// Child pointer at `idx`. Always `PageId::INVALID` in leaves.
    pub fn ptr(&self, idx: usize) -> PageId {
        assert!(idx < self.nkeys(), "pointer index {idx} out of range");
        PageId(read_u64(self.data(), NODE_HEADER_SIZE + POINTER_SIZE * idx))
    }

    /// End of record `idx - 1` relative to the record area. Valid for `0..=nkeys`.
    pub fn offset(&self, idx: usize) -> usize {
        assert!(idx <= self.nkeys(), "offset index {idx} out of range");
        if idx == 0 {
            return 0;
        }
        read_u16(self.data(), self.offset_pos(idx)) as usize
    }

    /// Absolute position of record `idx`. Valid for `0..=nkeys`.
    #[inline]
    fn record_pos(&self, idx: usize) -> usize {
        self.record_area_start() + self.offset(idx)
    }

    /// Raw key bytes at `idx`.
    pub fn key(&self, idx: usize) -> &[u8] {
        assert!(idx < self.nkeys(), "key index {idx} out of range");
        let pos = self.record_pos(idx);
        let klen = read_u16(self.data(), pos) as usize;
        &self.data()[pos + RECORD_HEADER_SIZE..pos + RECORD_HEADER_SIZE + klen]
    }

    /// Raw value bytes at `idx`. Always empty in internal nodes.
    pub fn val(&self, idx: usize) -> &[u8] {
        assert!(idx < self.nkeys(), "value index {idx} out of range");
        let pos = self.record_pos(idx);
        let klen = read_u16(self.data(), pos) as usize;
        let vlen = read_u16(self.data(), pos + 2) as usize;
        let start = pos + RECORD_HEADER_SIZE + klen;
        &self.data()[start..start + vlen]
    }

    /// Exact number of bytes this node occupies.
    pub fn nbytes(&self) -> usize {
        self.record_pos(self.nkeys())
    }

    /// Iterate over `(key, value)` pairs in position order.
    pub fn entries(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        (0..self.nkeys()).map(move |i| (self.key(i), self.val(i)))
    }
}

impl Node<Vec<u8>> {
    /// Start an empty buffer for a node that will hold `nkeys` positions.
    ///
    /// Positions must then be filled in order with `append`.
    pub(crate) fn with_header(node_type: NodeType, nkeys: usize) -> Self {
        assert!(nkeys <= u16::MAX as usize, "too many keys for one node");
        let mut buf = vec![0u8; NODE_HEADER_SIZE + (POINTER_SIZE + OFFSET_SIZE) * nkeys];
        buf[0..2].copy_from_slice(&(node_type as u16).to_le_bytes());
        buf[2..4].copy_from_slice(&(nkeys as u16).to_le_bytes());
        Node { buf }
    }

    /// Write position `idx`. All lower positions must already be written.
    pub(crate) fn append(&mut self, idx: usize, ptr: PageId, key: &[u8], val: &[u8]) {
        let at = NODE_HEADER_SIZE + POINTER_SIZE * idx;
        assert!(idx < self.nkeys(), "append index {idx} out of range");
        self.buf[at..at + POINTER_SIZE].copy_from_slice(&ptr.0.to_le_bytes());

        let pos = self.record_pos(idx);
        let end = pos + RECORD_HEADER_SIZE + key.len() + val.len();
        self.buf.resize(end, 0);
        self.buf[pos..pos + 2].copy_from_slice(&(key.len() as u16).to_le_bytes());
        self.buf[pos + 2..pos + 4].copy_from_slice(&(val.len() as u16).to_le_bytes());
        self.buf[pos + 4..pos + 4 + key.len()].copy_from_slice(key);
        self.buf[pos + 4 + key.len()..end].copy_from_slice(val);

        let offset = end - self.record_area_start();
        assert!(offset <= u16::MAX as usize, "record area exceeds 16-bit offsets");
        let at = self.offset_pos(idx + 1);
        self.buf[at..at + OFFSET_SIZE].copy_from_slice(&(offset as u16).to_le_bytes());
    }

    /// Copy positions `src..src + n` of `old` into `dst..dst + n`.
    pub(crate) fn append_range<B: AsRef<[u8]>>(&mut self, old: &Node<B>, dst: usize, src: usize, n: usize) {
        for i in 0..n {
            self.append(dst + i, old.ptr(src + i), old.key(src + i), old.val(src + i));
        }
    }

    /// Encode a leaf from `(key, value)` pairs, which must already be sorted.
    pub fn leaf<K: AsRef<[u8]>, V: AsRef<[u8]>>(pairs: &[(K, V)]) -> Self {
        let mut node = Self::with_header(NodeType::Leaf, pairs.len());
        for (i, (key, val)) in pairs.iter().enumerate() {
            node.append(i, PageId::INVALID, key.as_ref(), val.as_ref());
        }
        node
    }

    /// Encode an internal node from `(routing key, child)` pairs.
    pub fn internal<K: AsRef<[u8]>>(children: &[(K, PageId)]) -> Self {
        let mut node = Self::with_header(NodeType::Internal, children.len());
        for (i, (key, child)) in children.iter().enumerate() {
            node.append(i, *child, key.as_ref(), &[]);
        }
        node
    }

    /// Consume the node and return a zero-padded page of `page_size` bytes.
    ///
    /// # Panics
    /// Panics if the node does not fit; an oversized node must be split
    /// before it is written.
    pub fn into_page(mut self, page_size: usize) -> Vec<u8> {
        assert!(
            self.nbytes() <= page_size,
            "node of {} bytes exceeds page size {page_size}",
            self.nbytes()
        );
        self.buf.resize(page_size, 0);
        self.buf
    }
}

impl<B: AsRef<[u8]>> fmt::Debug for Node<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("type", &self.node_type())
            .field("nkeys", &self.nkeys())
            .field("nbytes", &self.nbytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_node_type_from_u16() {
        assert_eq!(NodeType::from_u16(1), Some(NodeType::Internal));
        assert_eq!(NodeType::from_u16(2), Some(NodeType::Leaf));
        assert_eq!(NodeType::from_u16(0), None);
        assert_eq!(NodeType::from_u16(3), None);
    }

    #[test]
    fn test_leaf_byte_layout() {
        let pairs: [(&[u8], &[u8]); 2] = [(b"k1", b"hi"), (b"k3", b"hello")];
        let node = Node::leaf(&pairs);
        let page = node.into_page(64);

        assert_eq!(&page[0..2], &[2, 0]); // leaf
        assert_eq!(&page[2..4], &[2, 0]); // nkeys
        assert_eq!(&page[4..20], &[0u8; 16]); // zeroed pointers
        assert_eq!(&page[20..22], &[8, 0]); // end of record 0
        assert_eq!(&page[22..24], &[19, 0]); // end of record 1
        assert_eq!(&page[24..28], &[2, 0, 2, 0]);
        assert_eq!(&page[28..32], b"k1hi");
        assert_eq!(&page[32..36], &[2, 0, 5, 0]);
        assert_eq!(&page[36..43], b"k3hello");
        assert!(page[43..].iter().all(|&b| b == 0));

        let view = Node::decode(&page);
        assert_eq!(view.nbytes(), 43);
        assert_eq!(view.key(1), b"k3");
        assert_eq!(view.val(1), b"hello");
    }

    #[test]
    fn test_internal_pointers() {
        let children: [(&[u8], PageId); 2] = [(b"", PageId::new(7)), (b"m", PageId::new(0x0102))];
        let node = Node::internal(&children);
        assert_eq!(node.node_type(), NodeType::Internal);
        assert_eq!(node.ptr(0), PageId::new(7));
        assert_eq!(node.ptr(1), PageId::new(0x0102));
        assert_eq!(node.key(1), b"m");
        assert!(node.val(1).is_empty());
    }

    #[test]
    fn test_empty_node() {
        let node = Node::with_header(NodeType::Internal, 0);
        assert_eq!(node.nkeys(), 0);
        assert_eq!(node.nbytes(), NODE_HEADER_SIZE);
        assert_eq!(node.offset(0), 0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_key_index_out_of_range() {
        let node = Node::leaf(&[(b"a", b"1")]);
        node.key(1);
    }

    #[test]
    #[should_panic(expected = "unknown type")]
    fn test_decode_rejects_unknown_type() {
        let page = [9u8, 0, 0, 0, 0, 0];
        Node::decode(&page);
    }

    #[test]
    #[should_panic(expected = "overrun")]
    fn test_decode_rejects_truncated_page() {
        let page = Node::leaf(&[(b"abc", b"defgh")]).into_page(64);
        Node::decode(&page[..20]);
    }

    #[test]
    #[should_panic(expected = "exceeds page size")]
    fn test_oversized_node_never_becomes_a_page() {
        let node = Node::leaf(&[(vec![1u8; 100], vec![2u8; 100])]);
        node.into_page(128);
    }

    fn sorted_pairs() -> impl Strategy<Value = Vec<(Vec<u8>, Vec<u8>)>> {
        prop::collection::btree_map(
            prop::collection::vec(any::<u8>(), 0..32),
            prop::collection::vec(any::<u8>(), 0..64),
            0..40,
        )
        .prop_map(|map| map.into_iter().collect())
    }

    proptest! {
        #[test]
        fn leaf_roundtrip(pairs in sorted_pairs()) {
            let page = Node::leaf(&pairs).into_page(8192);
            let view = Node::decode(&page);
            prop_assert_eq!(view.node_type(), NodeType::Leaf);
            let decoded: Vec<_> = view.entries().map(|(k, v)| (k.to_vec(), v.to_vec())).collect();
            prop_assert_eq!(decoded, pairs);
        }

        #[test]
        fn internal_roundtrip(keys in prop::collection::btree_set(prop::collection::vec(any::<u8>(), 0..32), 1..40)) {
            let children: Vec<_> = keys.iter().enumerate().map(|(i, k)| (k.clone(), PageId::new(i as u64 + 1))).collect();
            let page = Node::internal(&children).into_page(8192);
            let view = Node::decode(&page);
            prop_assert_eq!(view.node_type(), NodeType::Internal);
            for (i, (key, child)) in children.iter().enumerate() {
                prop_assert_eq!(view.key(i), key.as_slice());
                prop_assert_eq!(view.ptr(i), *child);
            }
        }

        #[test]
        fn offsets_are_monotonic(pairs in sorted_pairs()) {
            let node = Node::leaf(&pairs);
            for i in 0..node.nkeys() {
                prop_assert!(node.offset(i) <= node.offset(i + 1));
            }
            prop_assert_eq!(node.nbytes(), range_size(&node, 0, node.nkeys()));
        }
    }
}
