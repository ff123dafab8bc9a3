//! Configuration constants and tree limits for cowbtree.

use super::{Error, Result};

/// Default size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems. Every persisted node occupies
/// exactly one page.
pub const PAGE_SIZE: usize = 4096;

/// Default maximum key length in bytes.
pub const MAX_KEY_SIZE: usize = 1000;

/// Default maximum value length in bytes.
pub const MAX_VALUE_SIZE: usize = 3000;

/// Node header: 2-byte node type + 2-byte key count.
pub const NODE_HEADER_SIZE: usize = 4;

/// Width of one child pointer entry.
pub const POINTER_SIZE: usize = 8;

/// Width of one offset table entry.
pub const OFFSET_SIZE: usize = 2;

/// Key length + value length prefix in front of every record.
pub const RECORD_HEADER_SIZE: usize = 4;

/// Largest page size whose overflowing candidates still have 16-bit offsets.
pub const MAX_PAGE_SIZE: usize = 32 * 1024;

const _: () = assert!(
    NODE_HEADER_SIZE + POINTER_SIZE + OFFSET_SIZE + RECORD_HEADER_SIZE + MAX_KEY_SIZE + MAX_VALUE_SIZE
        <= PAGE_SIZE,
    "a single maximum-size record must fit into a page"
);

/// Size limits and rebalancing policy of a tree.
///
/// Validated once when a tree is created or opened; every later operation
/// relies on these bounds to guarantee that a split always produces valid
/// pages.
///
/// # Example
/// ```
/// use cowbtree::TreeConfig;
///
/// let config = TreeConfig::default();
/// assert_eq!(config.page_size, 4096);
/// assert!(config.validate().is_ok());
///
/// // A 512-byte page cannot hold a 1000-byte key.
/// assert!(TreeConfig::new(512, 1000, 100).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Bytes per page (and the hard cap on an encoded node).
    pub page_size: usize,
    /// Longest key accepted by insert.
    pub max_key_size: usize,
    /// Longest value accepted by insert.
    pub max_value_size: usize,
    /// A node shrunk below this many bytes by a delete tries to merge with a sibling.
    pub merge_threshold: usize,
}

impl TreeConfig {
    /// Create a checked configuration with the default merge threshold
    /// (a quarter page).
    pub fn new(page_size: usize, max_key_size: usize, max_value_size: usize) -> Result<Self> {
        let config = Self {
            page_size,
            max_key_size,
            max_value_size,
            merge_threshold: page_size / 4,
        };
        config.validate()?;
        Ok(config)
    }

    /// Replace the merge threshold.
    pub fn with_merge_threshold(mut self, merge_threshold: usize) -> Result<Self> {
        self.merge_threshold = merge_threshold;
        self.validate()?;
        Ok(self)
    }

    /// Largest encoded size of a single leaf record, including its table entries.
    pub fn max_record_size(&self) -> usize {
        POINTER_SIZE + OFFSET_SIZE + RECORD_HEADER_SIZE + self.max_key_size + self.max_value_size
    }

    /// Check that the limits are mutually consistent.
    pub fn validate(&self) -> Result<()> {
        if self.page_size > MAX_PAGE_SIZE {
            return Err(Error::InvalidConfig(format!(
                "page size {} exceeds {MAX_PAGE_SIZE}",
                self.page_size
            )));
        }
        if self.max_key_size == 0 {
            return Err(Error::InvalidConfig("max key size must be non-zero".into()));
        }
        if NODE_HEADER_SIZE + self.max_record_size() > self.page_size {
            return Err(Error::InvalidConfig(format!(
                "a {}-byte key with a {}-byte value does not fit a {}-byte page",
                self.max_key_size, self.max_value_size, self.page_size
            )));
        }
        let internal_entry = POINTER_SIZE + OFFSET_SIZE + RECORD_HEADER_SIZE + self.max_key_size;
        if NODE_HEADER_SIZE + 3 * internal_entry > self.page_size {
            return Err(Error::InvalidConfig(format!(
                "three {}-byte routing keys do not fit a {}-byte page",
                self.max_key_size, self.page_size
            )));
        }
        if self.merge_threshold == 0 || self.merge_threshold > self.page_size {
            return Err(Error::InvalidConfig(format!(
                "merge threshold {} outside 1..={}",
                self.merge_threshold, self.page_size
            )));
        }
        Ok(())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            max_key_size: MAX_KEY_SIZE,
            max_value_size: MAX_VALUE_SIZE,
            merge_threshold: PAGE_SIZE / 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = TreeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.merge_threshold, 1024);
        assert_eq!(config.max_record_size(), 4014);
    }

    #[test]
    fn test_record_must_fit_page() {
        // 4 + 8 + 2 + 4 + 1000 + 3000 = 4018 > 4000
        assert!(matches!(
            TreeConfig::new(4000, 1000, 3000),
            Err(Error::InvalidConfig(_))
        ));
        assert!(TreeConfig::new(4018, 1000, 3000).is_ok());
    }

    #[test]
    fn test_three_routing_keys_must_fit() {
        // one record fits, but three 400-byte routing keys (3 * 414 + 4) do not
        assert!(TreeConfig::new(1024, 400, 100).is_err());
        assert!(TreeConfig::new(1024, 300, 100).is_ok());
    }

    #[test]
    fn test_page_size_upper_bound() {
        assert!(TreeConfig::new(64 * 1024, 100, 100).is_err());
        assert!(TreeConfig::new(MAX_PAGE_SIZE, 100, 100).is_ok());
    }

    #[test]
    fn test_merge_threshold_bounds() {
        let config = TreeConfig::default();
        assert!(config.with_merge_threshold(0).is_err());
        assert!(config.with_merge_threshold(PAGE_SIZE + 1).is_err());
        assert_eq!(
            config.with_merge_threshold(2048).unwrap().merge_threshold,
            2048
        );
    }
}
