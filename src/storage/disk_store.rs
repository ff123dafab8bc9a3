//! File-backed page store.
//!
//! The [`DiskPageStore`] keeps one fixed-size page per node:
//! - Reading and writing pages at `page_id × page_size`
//! - Appending new pages or recycling freed ones
//! - Explicit `sync()` for durability

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::common::{Error, PageId, Result};
use crate::storage::PageStore;

/// Stores node pages in a single file.
///
/// # File Layout
/// ```text
/// ┌──────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0   │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │(reserved)│         │         │         │         │
/// └──────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset: 0   size     2×size    ...     N×size
/// ```
///
/// Page 0 is written as zeros and never handed out, so a zero child
/// pointer can never name a node.
///
/// # Free list
/// Freed ids are kept in memory and reused within the session. They are
/// not persisted: after a reopen, pages freed in an earlier session are
/// simply never reused. A freed id is not live: fetching it or freeing it
/// again fails with [`Error::PageNotFound`].
///
/// # Durability
/// Writes are not fsynced individually; call [`DiskPageStore::sync`]
/// before relying on a published root surviving a crash.
pub struct DiskPageStore {
    inner: Mutex<DiskInner>,
    page_size: usize,
}

struct DiskInner {
    file: File,
    /// Number of pages in the file, page 0 included.
    page_count: u64,
    /// Reuse order for freed ids.
    free_list: Vec<PageId>,
    /// Same ids as `free_list`, for membership checks.
    free_set: HashSet<PageId>,
}

impl DiskPageStore {
    /// Create a new store file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        check_page_size(page_size)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(&vec![0u8; page_size])?;
        file.sync_all()?;

        info!(path = %path.as_ref().display(), page_size, "created page file");
        Ok(Self {
            inner: Mutex::new(DiskInner {
                file,
                page_count: 1,
                free_list: Vec::new(),
                free_set: HashSet::new(),
            }),
            page_size,
        })
    }

    /// Open an existing store file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened, and
    /// `InvalidConfig` if its length is not a non-zero multiple of `page_size`.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        check_page_size(page_size)?;
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        if len == 0 || len % page_size as u64 != 0 {
            return Err(Error::InvalidConfig(format!(
                "file length {len} is not a whole number of {page_size}-byte pages"
            )));
        }
        let page_count = len / page_size as u64;

        info!(path = %path.as_ref().display(), page_count, "opened page file");
        Ok(Self {
            inner: Mutex::new(DiskInner {
                file,
                page_count,
                free_list: Vec::new(),
                free_set: HashSet::new(),
            }),
            page_size,
        })
    }

    /// Open an existing store file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, page_size)
        } else {
            Self::create(path, page_size)
        }
    }

    /// Flush all written pages to disk.
    pub fn sync(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }

    /// Page size of this file.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages in the file, the reserved page included.
    pub fn page_count(&self) -> u64 {
        self.inner.lock().page_count
    }

    fn offset_of(&self, page_id: PageId) -> u64 {
        page_id.0 * self.page_size as u64
    }
}

fn check_page_size(page_size: usize) -> Result<()> {
    if page_size == 0 {
        return Err(Error::InvalidConfig("page size must be non-zero".into()));
    }
    Ok(())
}

impl DiskInner {
    /// `page_id` must name a live page: in the file, not reserved, not freed.
    fn check(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid()
            || page_id.0 >= self.page_count
            || self.free_set.contains(&page_id)
        {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }

    fn write_page(&mut self, offset: u64, page: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page)
    }
}

impl PageStore for DiskPageStore {
    fn fetch(&self, page_id: PageId) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        inner.check(page_id)?;

        inner.file.seek(SeekFrom::Start(self.offset_of(page_id)))?;
        let mut page = vec![0u8; self.page_size];
        inner.file.read_exact(&mut page)?;
        Ok(page)
    }

    fn allocate(&self, page: Vec<u8>) -> Result<PageId> {
        if page.len() != self.page_size {
            return Err(Error::PageSizeMismatch {
                expected: self.page_size,
                actual: page.len(),
            });
        }

        let mut inner = self.inner.lock();
        let recycled = inner.free_list.pop();
        let page_id = recycled.unwrap_or(PageId::new(inner.page_count));

        if let Err(err) = inner.write_page(self.offset_of(page_id), &page) {
            if let Some(page_id) = recycled {
                inner.free_list.push(page_id);
            }
            return Err(err.into());
        }
        match recycled {
            Some(page_id) => {
                inner.free_set.remove(&page_id);
            }
            None => inner.page_count += 1,
        }
        Ok(page_id)
    }

    fn free(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check(page_id)?;

        debug!(%page_id, "page freed");
        inner.free_list.push(page_id);
        inner.free_set.insert(page_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SIZE: usize = 4096;

    #[test]
    fn test_create_new_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let store = DiskPageStore::create(&path, SIZE).unwrap();
        assert_eq!(store.page_count(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), SIZE as u64);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        DiskPageStore::create(&path, SIZE).unwrap();
        assert!(DiskPageStore::create(&path, SIZE).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(DiskPageStore::open(dir.path().join("nonexistent.db"), SIZE).is_err());
    }

    #[test]
    fn test_allocate_and_fetch() {
        let dir = tempdir().unwrap();
        let store = DiskPageStore::create(dir.path().join("test.db"), SIZE).unwrap();

        let mut page = vec![0u8; SIZE];
        page[0] = 0xAB;
        page[SIZE - 1] = 0xEF;

        let page_id = store.allocate(page.clone()).unwrap();
        assert_eq!(page_id, PageId::new(1));
        assert_eq!(store.fetch(page_id).unwrap(), page);
    }

    #[test]
    fn test_reserved_and_missing_pages() {
        let dir = tempdir().unwrap();
        let store = DiskPageStore::create(dir.path().join("test.db"), SIZE).unwrap();

        assert!(matches!(
            store.fetch(PageId::INVALID),
            Err(Error::PageNotFound(_))
        ));
        assert!(matches!(
            store.fetch(PageId::new(1)),
            Err(Error::PageNotFound(_))
        ));
    }

    #[test]
    fn test_wrong_page_size_rejected() {
        let dir = tempdir().unwrap();
        let store = DiskPageStore::create(dir.path().join("test.db"), SIZE).unwrap();

        let result = store.allocate(vec![0u8; 100]);
        assert!(matches!(
            result,
            Err(Error::PageSizeMismatch { expected: SIZE, actual: 100 })
        ));
    }

    #[test]
    fn test_free_and_reuse() {
        let dir = tempdir().unwrap();
        let store = DiskPageStore::create(dir.path().join("test.db"), SIZE).unwrap();

        let a = store.allocate(vec![1u8; SIZE]).unwrap();
        let _b = store.allocate(vec![2u8; SIZE]).unwrap();
        store.free(a).unwrap();

        let c = store.allocate(vec![3u8; SIZE]).unwrap();
        assert_eq!(c, a);
        assert_eq!(store.fetch(c).unwrap(), vec![3u8; SIZE]);
        assert_eq!(store.page_count(), 3);
    }

    #[test]
    fn test_double_free_rejected() {
        let dir = tempdir().unwrap();
        let store = DiskPageStore::create(dir.path().join("test.db"), SIZE).unwrap();

        let a = store.allocate(vec![1u8; SIZE]).unwrap();
        store.free(a).unwrap();
        assert!(matches!(store.free(a), Err(Error::PageNotFound(id)) if id == a));

        // the id went onto the free list once, so two allocations get two pages
        let x = store.allocate(vec![2u8; SIZE]).unwrap();
        let y = store.allocate(vec![3u8; SIZE]).unwrap();
        assert_eq!(x, a);
        assert_ne!(x, y);
        assert_eq!(store.fetch(x).unwrap(), vec![2u8; SIZE]);
        assert_eq!(store.fetch(y).unwrap(), vec![3u8; SIZE]);
    }

    #[test]
    fn test_fetch_freed_page_fails() {
        let dir = tempdir().unwrap();
        let store = DiskPageStore::create(dir.path().join("test.db"), SIZE).unwrap();

        let a = store.allocate(vec![7u8; SIZE]).unwrap();
        store.free(a).unwrap();
        assert!(matches!(store.fetch(a), Err(Error::PageNotFound(_))));

        let b = store.allocate(vec![8u8; SIZE]).unwrap();
        assert_eq!(b, a);
        assert_eq!(store.fetch(b).unwrap(), vec![8u8; SIZE]);
    }

    #[test]
    fn test_failed_write_keeps_freed_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = DiskPageStore::create(&path, SIZE).unwrap();

        let a = store.allocate(vec![1u8; SIZE]).unwrap();
        store.free(a).unwrap();

        // a read-only handle makes every write fail
        let writable = std::mem::replace(&mut store.inner.lock().file, File::open(&path).unwrap());
        assert!(matches!(store.allocate(vec![2u8; SIZE]), Err(Error::Io(_))));
        assert!(matches!(store.fetch(a), Err(Error::PageNotFound(_))));

        store.inner.lock().file = writable;
        assert_eq!(store.allocate(vec![3u8; SIZE]).unwrap(), a);
        assert_eq!(store.page_count(), 2);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        assert!(matches!(DiskPageStore::create(&path, 0), Err(Error::InvalidConfig(_))));
        assert!(!path.exists());

        DiskPageStore::create(&path, SIZE).unwrap();
        assert!(matches!(DiskPageStore::open(&path, 0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_open_rejects_partial_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        std::fs::write(&path, vec![0u8; SIZE + 100]).unwrap();
        assert!(matches!(DiskPageStore::open(&path, SIZE), Err(Error::InvalidConfig(_))));

        std::fs::write(&path, b"").unwrap();
        assert!(matches!(DiskPageStore::open(&path, SIZE), Err(Error::InvalidConfig(_))));

        // a page file opened with the wrong page size does not divide evenly
        std::fs::write(&path, vec![0u8; SIZE * 3]).unwrap();
        assert!(matches!(DiskPageStore::open(&path, 1000), Err(Error::InvalidConfig(_))));
        assert_eq!(DiskPageStore::open(&path, SIZE).unwrap().page_count(), 3);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let page_id = {
            let store = DiskPageStore::create(&path, SIZE).unwrap();
            let page_id = store.allocate(vec![0x42u8; SIZE]).unwrap();
            store.sync().unwrap();
            page_id
        };

        let store = DiskPageStore::open(&path, SIZE).unwrap();
        assert_eq!(store.page_count(), 2);
        assert_eq!(store.fetch(page_id).unwrap(), vec![0x42u8; SIZE]);
    }

    #[test]
    fn test_open_or_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let store = DiskPageStore::open_or_create(&path, SIZE).unwrap();
            store.allocate(vec![0u8; SIZE]).unwrap();
        }

        let store = DiskPageStore::open_or_create(&path, SIZE).unwrap();
        assert_eq!(store.page_count(), 2);
    }
}
