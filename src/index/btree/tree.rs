//! Copy-on-write tree driver.
//!
//! Every mutation rebuilds the root-to-leaf path as new pages, publishes
//! the new root id, and only then frees the pages it superseded. A failed
//! mutation therefore leaves the previous root and every page reachable
//! from it untouched.

use tracing::{debug, trace, warn};

use crate::common::{Error, PageId, Result, TreeConfig};
use crate::storage::PageStore;

use super::editor::{self, LeafEdit};
use super::node::{Node, NodeType};
use super::search::lookup_floor;
use super::stats::TreeStats;

/// Shape summary returned by [`BTree::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeInfo {
    /// Number of levels; a lone leaf is height 1.
    pub height: usize,
    /// Number of pages reachable from the root.
    pub nodes: usize,
    /// Number of user keys (the sentinel is not counted).
    pub keys: usize,
}

/// A copy-on-write B-tree over a [`PageStore`].
///
/// The only durable state is the root page id; everything else is reached
/// through child pointers. The leftmost leaf always holds a sentinel entry
/// (empty key, empty value) at position 0, so an empty tree is a single
/// leaf containing just that entry.
///
/// # Example
/// ```
/// use cowbtree::{BTree, TreeConfig};
/// use cowbtree::storage::MemPageStore;
///
/// let mut tree = BTree::create(MemPageStore::new(), TreeConfig::default()).unwrap();
/// tree.insert(b"hello", b"world").unwrap();
/// assert_eq!(tree.get(b"hello").unwrap().as_deref(), Some(&b"world"[..]));
///
/// assert!(tree.delete(b"hello").unwrap());
/// assert_eq!(tree.get(b"hello").unwrap(), None);
/// ```
pub struct BTree<S> {
    store: S,
    root: PageId,
    config: TreeConfig,
    stats: TreeStats,
}

impl<S: PageStore> BTree<S> {
    /// Create an empty tree, allocating its root leaf in `store`.
    ///
    /// # Errors
    /// `InvalidConfig` if `config` is inconsistent, or the store's error if
    /// the root cannot be allocated.
    pub fn create(store: S, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        let stats = TreeStats::new();
        let empty: [(&[u8], &[u8]); 1] = [(b"", b"")];
        let root = store.allocate(Node::leaf(&empty).into_page(config.page_size))?;
        TreeStats::bump(&stats.pages_allocated);

        debug!(%root, page_size = config.page_size, "created empty tree");
        Ok(Self {
            store,
            root,
            config,
            stats,
        })
    }

    /// Attach to an existing tree whose root lives at `root`.
    pub fn open(store: S, root: PageId, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            root,
            config,
            stats: TreeStats::new(),
        })
    }

    /// Current root page id.
    #[inline]
    pub fn root(&self) -> PageId {
        self.root
    }

    /// Configuration this tree was opened with.
    #[inline]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Structural counters.
    #[inline]
    pub fn stats(&self) -> &TreeStats {
        &self.stats
    }

    /// The backing page store.
    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Look up `key`.
    ///
    /// Returns `Ok(None)` if the key is absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if key.is_empty() {
            return Ok(None);
        }
        let mut page = self.store.fetch(self.root)?;
        loop {
            let node = Node::decode(&page);
            let pos = lookup_floor(&node, key);
            match node.node_type() {
                NodeType::Leaf => {
                    if node.key(pos) == key {
                        return Ok(Some(node.val(pos).to_vec()));
                    }
                    return Ok(None);
                }
                NodeType::Internal => {
                    let child = node.ptr(pos);
                    page = self.store.fetch(child)?;
                }
            }
        }
    }

    /// Insert `key` with `val`, overwriting any existing value.
    ///
    /// # Errors
    /// `EmptyKey`, `KeyTooLarge` or `ValueTooLarge` for unacceptable input,
    /// or a page store error. On error the root is unchanged.
    pub fn insert(&mut self, key: &[u8], val: &[u8]) -> Result<()> {
        self.check_record(key, val)?;

        let mut mutation = Mutation::new(&self.store, &self.config, &self.stats);
        let root_page = mutation.fetch(self.root)?;
        let nodes = mutation.insert(&Node::decode(&root_page), key, val)?;
        mutation.superseded.push(self.root);

        let new_root = match <[Node; 1]>::try_from(nodes) {
            Ok([node]) => mutation.alloc(node)?,
            Err(nodes) => {
                let kids = mutation.alloc_all(nodes)?;
                TreeStats::bump(&self.stats.root_splits);
                debug!(fanout = kids.len(), "root split, tree grows by one level");
                mutation.alloc(Node::internal(&kids))?
            }
        };
        let superseded = mutation.superseded;
        self.publish(new_root, superseded);
        Ok(())
    }

    /// Remove `key`.
    ///
    /// Returns `Ok(false)` without touching any page if the key is absent.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        if key.is_empty() {
            return Ok(false);
        }

        let mut mutation = Mutation::new(&self.store, &self.config, &self.stats);
        let root_page = mutation.fetch(self.root)?;
        let Some(nodes) = mutation.delete(&Node::decode(&root_page), key)? else {
            return Ok(false);
        };
        mutation.superseded.push(self.root);

        let new_root = match <[Node; 1]>::try_from(nodes) {
            Ok([node]) => mutation.collapse_root(node)?,
            Err(nodes) => {
                let kids = mutation.alloc_all(nodes)?;
                TreeStats::bump(&self.stats.root_splits);
                debug!(fanout = kids.len(), "root split on delete");
                mutation.alloc(Node::internal(&kids))?
            }
        };
        let superseded = mutation.superseded;
        self.publish(new_root, superseded);
        Ok(true)
    }

    /// Number of levels, counted along the leftmost path.
    pub fn height(&self) -> Result<usize> {
        let mut height = 1;
        let mut page = self.store.fetch(self.root)?;
        loop {
            let node = Node::decode(&page);
            if node.is_leaf() {
                return Ok(height);
            }
            let child = node.ptr(0);
            page = self.store.fetch(child)?;
            height += 1;
        }
    }

    /// All user `(key, value)` pairs in key order.
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        self.collect(self.root, &mut out)?;
        Ok(out)
    }

    fn collect(&self, page_id: PageId, out: &mut Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        let page = self.store.fetch(page_id)?;
        let node = Node::decode(&page);
        for i in 0..node.nkeys() {
            if node.is_leaf() {
                if !node.key(i).is_empty() {
                    out.push((node.key(i).to_vec(), node.val(i).to_vec()));
                }
            } else {
                self.collect(node.ptr(i), out)?;
            }
        }
        Ok(())
    }

    /// Walk the whole tree and check its structure.
    ///
    /// # Panics
    /// Panics on any violated invariant: unsorted keys, a routing key that
    /// differs from its child's first key, a node over page size, an empty
    /// non-root node, or leaves at different depths.
    pub fn verify(&self) -> Result<TreeInfo> {
        let mut info = TreeInfo {
            height: 0,
            nodes: 0,
            keys: 0,
        };
        let mut leaf_depth = None;
        self.verify_node(self.root, None, 1, &mut leaf_depth, &mut info)?;
        info.height = leaf_depth.unwrap_or(1);
        Ok(info)
    }

    fn verify_node(
        &self,
        page_id: PageId,
        routing_key: Option<&[u8]>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        info: &mut TreeInfo,
    ) -> Result<()> {
        let page = self.store.fetch(page_id)?;
        let node = Node::decode(&page);
        info.nodes += 1;

        assert!(
            node.nbytes() <= self.config.page_size,
            "{page_id} holds {} bytes",
            node.nbytes()
        );
        assert!(node.nkeys() > 0, "{page_id} is empty");
        if let Some(routing_key) = routing_key {
            assert_eq!(node.key(0), routing_key, "{page_id} disagrees with its routing key");
        }
        for i in 1..node.nkeys() {
            assert!(node.key(i - 1) < node.key(i), "{page_id} keys out of order at {i}");
        }

        if node.is_leaf() {
            match *leaf_depth {
                Some(expected) => assert_eq!(depth, expected, "{page_id} is a leaf at the wrong depth"),
                None => *leaf_depth = Some(depth),
            }
            info.keys += node.entries().filter(|(k, _)| !k.is_empty()).count();
            return Ok(());
        }
        for i in 0..node.nkeys() {
            self.verify_node(node.ptr(i), Some(node.key(i)), depth + 1, leaf_depth, info)?;
        }
        Ok(())
    }

    fn check_record(&self, key: &[u8], val: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if key.len() > self.config.max_key_size {
            return Err(Error::KeyTooLarge {
                len: key.len(),
                max: self.config.max_key_size,
            });
        }
        if val.len() > self.config.max_value_size {
            return Err(Error::ValueTooLarge {
                len: val.len(),
                max: self.config.max_value_size,
            });
        }
        Ok(())
    }

    /// Install `new_root`, then release the pages it replaced.
    fn publish(&mut self, new_root: PageId, superseded: Vec<PageId>) {
        trace!(old = %self.root, new = %new_root, freed = superseded.len(), "root published");
        self.root = new_root;
        for page_id in superseded {
            match self.store.free(page_id) {
                Ok(()) => TreeStats::bump(&self.stats.pages_freed),
                // The new root is already live; a failed free only leaks the page.
                Err(err) => warn!(%page_id, error = %err, "failed to free superseded page"),
            }
        }
    }
}

/// One in-flight mutation: the pages it read and must retire.
struct Mutation<'t, S> {
    store: &'t S,
    config: &'t TreeConfig,
    stats: &'t TreeStats,
    /// Pages replaced by this mutation, freed after the new root is published.
    superseded: Vec<PageId>,
}

impl<'t, S: PageStore> Mutation<'t, S> {
    fn new(store: &'t S, config: &'t TreeConfig, stats: &'t TreeStats) -> Self {
        Self {
            store,
            config,
            stats,
            superseded: Vec::new(),
        }
    }

    fn fetch(&self, page_id: PageId) -> Result<Vec<u8>> {
        self.store.fetch(page_id)
    }

    fn alloc(&self, node: Node) -> Result<PageId> {
        let page_id = self.store.allocate(node.into_page(self.config.page_size))?;
        TreeStats::bump(&self.stats.pages_allocated);
        Ok(page_id)
    }

    /// Persist `nodes` and return the `(first key, page)` list a parent needs.
    fn alloc_all(&self, nodes: Vec<Node>) -> Result<Vec<(Vec<u8>, PageId)>> {
        nodes
            .into_iter()
            .map(|node| {
                let key = node.key(0).to_vec();
                Ok((key, self.alloc(node)?))
            })
            .collect()
    }

    /// Split `node` to page size, counting the split when one happened.
    fn split(&self, node: Node) -> Vec<Node> {
        let pieces = editor::split(node, self.config.page_size);
        if pieces.len() > 1 {
            TreeStats::bump(&self.stats.splits);
            trace!(pieces = pieces.len(), "node split");
        }
        pieces
    }

    fn insert(&mut self, node: &Node<&[u8]>, key: &[u8], val: &[u8]) -> Result<Vec<Node>> {
        let pos = lookup_floor(node, key);
        match node.node_type() {
            NodeType::Leaf => {
                let (pos, edit) = if node.key(pos) == key {
                    (pos, LeafEdit::Update { key, val })
                } else {
                    (pos + 1, LeafEdit::Insert { key, val })
                };
                let pieces = editor::apply_leaf_edit(node, pos, edit, self.config.page_size);
                if pieces.len() > 1 {
                    TreeStats::bump(&self.stats.splits);
                    trace!(pieces = pieces.len(), "leaf split");
                }
                Ok(pieces)
            }
            NodeType::Internal => {
                let child_id = node.ptr(pos);
                let child_page = self.fetch(child_id)?;
                let kids = self.insert(&Node::decode(&child_page), key, val)?;
                self.superseded.push(child_id);

                let kids = self.alloc_all(kids)?;
                Ok(self.split(editor::replace_children(node, pos, 1, &kids)))
            }
        }
    }

    /// `Ok(None)` when `key` is absent; nothing has been allocated then.
    fn delete(&mut self, node: &Node<&[u8]>, key: &[u8]) -> Result<Option<Vec<Node>>> {
        let pos = lookup_floor(node, key);
        if node.is_leaf() {
            if node.key(pos) != key {
                return Ok(None);
            }
            return Ok(Some(editor::apply_leaf_edit(
                node,
                pos,
                LeafEdit::Delete,
                self.config.page_size,
            )));
        }

        let child_id = node.ptr(pos);
        let child_page = self.fetch(child_id)?;
        let Some(mut kids) = self.delete(&Node::decode(&child_page), key)? else {
            return Ok(None);
        };
        self.superseded.push(child_id);

        // A longer first key in the child can overflow it into several pieces.
        if kids.len() > 1 {
            let kids = self.alloc_all(kids)?;
            return Ok(Some(self.split(editor::replace_children(node, pos, 1, &kids))));
        }
        let updated = kids.remove(0);

        if updated.nkeys() == 0 {
            if node.nkeys() == 1 {
                return Ok(Some(vec![Node::with_header(NodeType::Internal, 0)]));
            }
            let none: [(&[u8], PageId); 0] = [];
            return Ok(Some(vec![editor::replace_children(node, pos, 1, &none)]));
        }

        let parent = if updated.nbytes() < self.config.merge_threshold {
            self.merge_into_parent(node, pos, updated)?
        } else {
            let kids = self.alloc_all(vec![updated])?;
            editor::replace_children(node, pos, 1, &kids)
        };
        Ok(Some(self.split(parent)))
    }

    /// Rebuild `parent` after its child at `pos` shrank to `updated`,
    /// merging with the left or else the right sibling when the pair fits.
    fn merge_into_parent(&mut self, parent: &Node<&[u8]>, pos: usize, updated: Node) -> Result<Node> {
        let page_size = self.config.page_size;

        if pos > 0 {
            let sibling_id = parent.ptr(pos - 1);
            let sibling_page = self.fetch(sibling_id)?;
            let sibling = Node::decode(&sibling_page);
            if editor::fits_merged(&sibling, &updated, page_size) {
                let merged = editor::merge(&sibling, &updated);
                return self.replace_merged(parent, pos - 1, sibling_id, merged);
            }
        }
        if pos + 1 < parent.nkeys() {
            let sibling_id = parent.ptr(pos + 1);
            let sibling_page = self.fetch(sibling_id)?;
            let sibling = Node::decode(&sibling_page);
            if editor::fits_merged(&updated, &sibling, page_size) {
                let merged = editor::merge(&updated, &sibling);
                return self.replace_merged(parent, pos, sibling_id, merged);
            }
        }

        let kids = self.alloc_all(vec![updated])?;
        Ok(editor::replace_children(parent, pos, 1, &kids))
    }

    fn replace_merged(
        &mut self,
        parent: &Node<&[u8]>,
        idx: usize,
        sibling_id: PageId,
        merged: Node,
    ) -> Result<Node> {
        TreeStats::bump(&self.stats.merges);
        trace!(%sibling_id, nkeys = merged.nkeys(), "siblings merged");
        self.superseded.push(sibling_id);
        let kids = self.alloc_all(vec![merged])?;
        Ok(editor::replace_children(parent, idx, 2, &kids))
    }

    /// Persist the rebuilt root, or hand the root over to the first
    /// descendant below a chain of single-child internal levels.
    fn collapse_root(&mut self, node: Node) -> Result<PageId> {
        assert!(node.nkeys() > 0, "delete emptied the root");
        if node.is_leaf() || node.nkeys() > 1 {
            return self.alloc(node);
        }

        let mut child_id = node.ptr(0);
        loop {
            TreeStats::bump(&self.stats.root_collapses);
            debug!(new_root = %child_id, "root collapsed, tree shrinks by one level");

            let child_page = self.fetch(child_id)?;
            let child = Node::decode(&child_page);
            if child.is_leaf() || child.nkeys() > 1 {
                return Ok(child_id);
            }
            self.superseded.push(child_id);
            child_id = child.ptr(0);
        }
    }
}
