//! The page store contract consumed by the tree.

use std::sync::Arc;

use crate::common::{PageId, Result};

/// Allocates, retrieves and frees node pages.
///
/// The tree never writes a page twice: every mutation allocates fresh ids
/// and frees the superseded ones only after the new root is published.
/// Implementations must therefore:
/// - return from `fetch` exactly the bytes previously passed to `allocate`;
/// - never hand out an id that is still live, and never hand out `PageId(0)`;
/// - expect `free` only on ids no longer reachable from the current root.
///
/// Methods take `&self` so that one store can back several tree handles
/// (for example a reader still holding an older root).
pub trait PageStore {
    /// Read the page previously written under `page_id`.
    fn fetch(&self, page_id: PageId) -> Result<Vec<u8>>;

    /// Persist `page` under a fresh identifier.
    fn allocate(&self, page: Vec<u8>) -> Result<PageId>;

    /// Mark `page_id` as reusable.
    fn free(&self, page_id: PageId) -> Result<()>;
}

impl<S: PageStore + ?Sized> PageStore for &S {
    fn fetch(&self, page_id: PageId) -> Result<Vec<u8>> {
        (**self).fetch(page_id)
    }

    fn allocate(&self, page: Vec<u8>) -> Result<PageId> {
        (**self).allocate(page)
    }

    fn free(&self, page_id: PageId) -> Result<()> {
        (**self).free(page_id)
    }
}

impl<S: PageStore + ?Sized> PageStore for Arc<S> {
    fn fetch(&self, page_id: PageId) -> Result<Vec<u8>> {
        (**self).fetch(page_id)
    }

    fn allocate(&self, page: Vec<u8>) -> Result<PageId> {
        (**self).allocate(page)
    }

    fn free(&self, page_id: PageId) -> Result<()> {
        (**self).free(page_id)
    }
}
