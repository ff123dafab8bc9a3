//! In-memory page table.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::common::{PageId, Result};
use crate::storage::PageStore;

/// A [`PageStore`] that keeps every page in a hash map.
///
/// Freed ids are recycled LIFO. Fetching or freeing an id that is not live
/// is a tree bug and panics.
///
/// # Example
/// ```
/// use cowbtree::storage::{MemPageStore, PageStore};
///
/// let store = MemPageStore::new();
/// let id = store.allocate(vec![1, 2, 3]).unwrap();
/// assert_eq!(store.fetch(id).unwrap(), vec![1, 2, 3]);
///
/// store.free(id).unwrap();
/// assert_eq!(store.live_pages(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MemPageStore {
    inner: RwLock<MemInner>,
}

#[derive(Debug, Default)]
struct MemInner {
    pages: HashMap<PageId, Vec<u8>>,
    /// Highest id ever handed out.
    last_id: u64,
    free_list: Vec<PageId>,
}

impl MemPageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages currently allocated and not freed.
    pub fn live_pages(&self) -> usize {
        self.inner.read().pages.len()
    }

    /// Whether `page_id` is currently allocated.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.inner.read().pages.contains_key(&page_id)
    }
}

impl PageStore for MemPageStore {
    fn fetch(&self, page_id: PageId) -> Result<Vec<u8>> {
        let inner = self.inner.read();
        match inner.pages.get(&page_id) {
            Some(page) => Ok(page.clone()),
            None => panic!("fetch of {page_id}, which is not allocated"),
        }
    }

    fn allocate(&self, page: Vec<u8>) -> Result<PageId> {
        let mut inner = self.inner.write();
        let page_id = match inner.free_list.pop() {
            Some(page_id) => page_id,
            None => {
                inner.last_id += 1;
                PageId::new(inner.last_id)
            }
        };
        inner.pages.insert(page_id, page);
        Ok(page_id)
    }

    fn free(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.write();
        assert!(
            inner.pages.remove(&page_id).is_some(),
            "free of {page_id}, which is not allocated"
        );
        inner.free_list.push(page_id);
        Ok(())
    }
}
