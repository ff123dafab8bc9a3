//! Page identifier type.

use std::fmt;

/// Identifies a persisted node buffer inside a page store.
///
/// Stored on disk as the 8-byte little-endian child pointer of an internal
/// node. Page stores hand out ids starting at 1, so the zero pointer left in
/// leaf pointer tables never names a live page.
///
/// # Example
/// ```
/// use cowbtree::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(page_id.0, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl PageId {
    /// The zero pointer. Leaves store it in every pointer slot.
    pub const INVALID: PageId = PageId(0);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u64) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the zero pointer).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_new() {
        let pid = PageId::new(42);
        assert_eq!(pid.0, 42);
        assert!(pid.is_valid());
    }

    #[test]
    fn test_page_id_invalid_is_zero() {
        assert!(!PageId::INVALID.is_valid());
        assert_eq!(PageId::INVALID.0, 0);
        assert_eq!(PageId::INVALID.0.to_le_bytes(), [0u8; 8]);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
        assert_eq!(format!("{}", PageId::INVALID), "Page(INVALID)");
    }
}
