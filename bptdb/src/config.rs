//! Store configuration and its fluent builder.

use std::path::Path;

use crate::constants::{
    DEFAULT_INTERNAL_RESERVATION, INTERNAL_CAPACITY, LEAF_CAPACITY, MAX_INTERNAL_RESERVATION,
    MIN_CAPACITY,
};
use crate::errors::{StoreError, StoreResult};
use crate::tree::BPlusTree;

/// Tuning parameters for a store file.
///
/// Capacities only take effect when a file is created. An existing file keeps
/// the capacities recorded in its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    leaf_capacity: usize,
    internal_capacity: usize,
    internal_reservation: u64,
    sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            leaf_capacity: LEAF_CAPACITY,
            internal_capacity: INTERNAL_CAPACITY,
            internal_reservation: DEFAULT_INTERNAL_RESERVATION,
            sync_writes: true,
        }
    }
}

impl StoreConfig {
    /// Maximum records per leaf.
    #[inline]
    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    /// Maximum entries per internal node.
    #[inline]
    pub fn internal_capacity(&self) -> usize {
        self.internal_capacity
    }

    /// Low page numbers handed out only to internal nodes.
    #[inline]
    pub fn internal_reservation(&self) -> u64 {
        self.internal_reservation
    }

    /// Whether every page write is followed by `sync_all`.
    #[inline]
    pub fn sync_writes(&self) -> bool {
        self.sync_writes
    }

    pub(crate) fn set_leaf_capacity(&mut self, capacity: usize) {
        self.leaf_capacity = capacity;
    }

    pub(crate) fn set_internal_capacity(&mut self, capacity: usize) {
        self.internal_capacity = capacity;
    }

    pub(crate) fn set_internal_reservation(&mut self, pages: u64) {
        self.internal_reservation = pages;
    }

    pub(crate) fn set_sync_writes(&mut self, sync: bool) {
        self.sync_writes = sync;
    }

    pub fn validate(&self) -> StoreResult<()> {
        if !(MIN_CAPACITY..=LEAF_CAPACITY).contains(&self.leaf_capacity) {
            return Err(StoreError::InvalidConfig(format!(
                "leaf_capacity must be in {}..={}, got {}",
                MIN_CAPACITY, LEAF_CAPACITY, self.leaf_capacity
            )));
        }
        if !(MIN_CAPACITY..=INTERNAL_CAPACITY).contains(&self.internal_capacity) {
            return Err(StoreError::InvalidConfig(format!(
                "internal_capacity must be in {}..={}, got {}",
                MIN_CAPACITY, INTERNAL_CAPACITY, self.internal_capacity
            )));
        }
        if self.internal_reservation > MAX_INTERNAL_RESERVATION {
            return Err(StoreError::InvalidConfig(format!(
                "internal_reservation must be at most {}, got {}",
                MAX_INTERNAL_RESERVATION, self.internal_reservation
            )));
        }
        Ok(())
    }
}

/// Builder for opening a [`BPlusTree`] with non-default settings.
///
/// # Example
///
/// ```rust,ignore
/// let tree = BPlusTree::with_config()
///     .leaf_capacity(4)
///     .internal_capacity(4)
///     .sync_writes(false)
///     .open("/path/to/tree.db")?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct StoreBuilder {
    config: StoreConfig,
}

impl StoreBuilder {
    pub fn new() -> StoreBuilder {
        StoreBuilder {
            config: StoreConfig::default(),
        }
    }

    pub fn leaf_capacity(mut self, capacity: usize) -> Self {
        self.config.set_leaf_capacity(capacity);
        self
    }

    pub fn internal_capacity(mut self, capacity: usize) -> Self {
        self.config.set_internal_capacity(capacity);
        self
    }

    pub fn internal_reservation(mut self, pages: u64) -> Self {
        self.config.set_internal_reservation(pages);
        self
    }

    /// Skipping the per-write `sync_all` trades durability for speed; useful
    /// for benchmarks and bulk loads.
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.config.set_sync_writes(sync);
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> StoreResult<StoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Validates the configuration and opens (or creates) the tree at `path`.
    pub fn open<P: AsRef<Path>>(self, path: P) -> StoreResult<BPlusTree> {
        let config = self.build()?;
        BPlusTree::open_with(path.as_ref(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = StoreBuilder::new().build().unwrap();
        assert_eq!(config.leaf_capacity(), 31);
        assert_eq!(config.internal_capacity(), 248);
        assert_eq!(config.internal_reservation(), 128);
        assert!(config.sync_writes());
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_builder_chain() {
        let config = StoreBuilder::new()
            .leaf_capacity(4)
            .internal_capacity(5)
            .internal_reservation(0)
            .sync_writes(false)
            .build()
            .unwrap();
        assert_eq!(config.leaf_capacity(), 4);
        assert_eq!(config.internal_capacity(), 5);
        assert_eq!(config.internal_reservation(), 0);
        assert!(!config.sync_writes());
    }

    #[test]
    fn test_capacity_bounds() {
        assert!(StoreBuilder::new().leaf_capacity(MIN_CAPACITY).build().is_ok());
        assert!(matches!(
            StoreBuilder::new().leaf_capacity(2).build(),
            Err(StoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            StoreBuilder::new().leaf_capacity(LEAF_CAPACITY + 1).build(),
            Err(StoreError::InvalidConfig(_))
        ));
        assert!(StoreBuilder::new().internal_capacity(INTERNAL_CAPACITY).build().is_ok());
        assert!(StoreBuilder::new().internal_capacity(INTERNAL_CAPACITY + 1).build().is_err());
        assert!(StoreBuilder::new().internal_capacity(0).build().is_err());
    }

    #[test]
    fn test_reservation_bound() {
        let config = StoreBuilder::new()
            .internal_reservation(MAX_INTERNAL_RESERVATION)
            .build()
            .unwrap();
        // the first leaf page is still addressable
        let first_leaf = config.internal_reservation() + 1;
        assert!(first_leaf.checked_mul(crate::constants::PAGE_SIZE as u64).is_some());

        assert!(matches!(
            StoreBuilder::new()
                .internal_reservation(MAX_INTERNAL_RESERVATION + 1)
                .build(),
            Err(StoreError::InvalidConfig(_))
        ));
        assert!(StoreBuilder::new().internal_reservation(1 << 60).build().is_err());
    }

    #[test]
    fn test_invalid_config_does_not_create_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("never.db");
        assert!(StoreBuilder::new().leaf_capacity(1).open(&path).is_err());
        assert!(!path.exists());
    }
}
