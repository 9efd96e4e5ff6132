//! The B+ tree engine.
//!
//! The tree keeps no node state between calls. Every operation reads the
//! header to find the root, descends page by page, and writes back each page
//! it changes before returning.

mod delete;
mod insert;
mod inspect;

pub use inspect::{IntegrityReport, NodeSummary};

use std::path::Path;

use log::{debug, warn};

use crate::config::{StoreBuilder, StoreConfig};
use crate::errors::{StoreError, StoreResult};
use crate::page::{FileHeader, LeafNode, Node};
use crate::storage::PageStore;
use crate::types::{cut, NodeKind, PageNum, RangeEntry, RecordLocation, Value};

/// A single-table key-value store over a paged B+ tree file.
///
/// # Example
///
/// ```rust,ignore
/// use bptdb::{BPlusTree, Value};
///
/// let mut tree = BPlusTree::open("/tmp/example.db")?;
/// tree.insert(7, Value::try_from("seven")?)?;
/// assert_eq!(tree.find(7)?.map(|v| v.to_string_lossy()), Some("seven".into()));
/// tree.delete(7)?;
/// ```
pub struct BPlusTree {
    store: PageStore,
    leaf_capacity: usize,
    internal_capacity: usize,
}

impl BPlusTree {
    /// Opens the tree at `path` with default settings, creating the file if
    /// it does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<BPlusTree> {
        Self::open_with(path.as_ref(), StoreConfig::default())
    }

    /// Creates a builder for opening a tree with custom settings.
    #[inline]
    pub fn with_config() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub(crate) fn open_with(path: &Path, config: StoreConfig) -> StoreResult<BPlusTree> {
        config.validate()?;
        let (store, is_new) = PageStore::open_or_create(path, config.sync_writes())?;

        let header = if is_new {
            let header = FileHeader::new(&config);
            store.write_header(&header)?;
            debug!("Created tree file {:?}", path);
            header
        } else {
            let header = store.read_header()?;
            header.validate()?;
            debug!(
                "Opened tree file {:?} (root {}, {} pages)",
                path, header.root_page, header.page_count
            );
            header
        };

        let leaf_capacity = header.leaf_capacity as usize;
        let internal_capacity = header.internal_capacity as usize;
        if leaf_capacity != config.leaf_capacity()
            || internal_capacity != config.internal_capacity()
        {
            warn!(
                "{:?} was created with capacities leaf={} internal={}; ignoring configured leaf={} internal={}",
                path,
                leaf_capacity,
                internal_capacity,
                config.leaf_capacity(),
                config.internal_capacity()
            );
        }

        Ok(BPlusTree {
            store,
            leaf_capacity,
            internal_capacity,
        })
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    pub fn internal_capacity(&self) -> usize {
        self.internal_capacity
    }

    /// Current root page, `None` when the tree is empty.
    pub fn root(&self) -> StoreResult<Option<PageNum>> {
        Ok(self.store.read_header()?.root())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.root()?.is_none())
    }

    /// Looks up `key`.
    pub fn find(&self, key: i64) -> StoreResult<Option<Value>> {
        Ok(self
            .find_leaf(key)?
            .and_then(|(_, leaf)| leaf.get(key).map(|r| r.value)))
    }

    /// All records with `lo <= key <= hi` in ascending key order.
    ///
    /// Descends once to the leaf for `lo`, then follows the sibling chain.
    pub fn find_range(&self, lo: i64, hi: i64) -> StoreResult<Vec<RangeEntry>> {
        let mut results = Vec::new();
        if lo > hi {
            return Ok(results);
        }
        let Some((mut page, mut leaf)) = self.find_leaf(lo)? else {
            return Ok(results);
        };
        let limit = self.store.read_header()?.page_count;

        let mut slot = leaf.search(lo).unwrap_or_else(|slot| slot);
        for _ in 0..=limit {
            for (idx, record) in leaf.records.iter().enumerate().skip(slot) {
                if record.key > hi {
                    return Ok(results);
                }
                results.push(RangeEntry {
                    key: record.key,
                    value: record.value,
                    location: RecordLocation { page, slot: idx },
                });
            }
            match leaf.right_sibling {
                Some(next) => {
                    page = next;
                    leaf = self.store.read_leaf(next)?;
                    slot = 0;
                }
                None => return Ok(results),
            }
        }
        Err(StoreError::Corrupted(format!(
            "leaf chain loops near page {}",
            page
        )))
    }

    /// Forces all written pages to stable storage.
    pub fn flush(&self) -> StoreResult<()> {
        self.store.sync()
    }

    /// Flushes and closes the file.
    pub fn close(self) -> StoreResult<()> {
        self.flush()?;
        debug!("Closed tree file {:?}", self.store.path());
        Ok(())
    }

    /// The leaf where `key` belongs, with its page; `None` for an empty tree.
    pub(crate) fn find_leaf(&self, key: i64) -> StoreResult<Option<(PageNum, LeafNode)>> {
        let header = self.store.read_header()?;
        let Some(root) = header.root() else {
            return Ok(None);
        };

        let mut page = root;
        // a path longer than the page count means a cycle
        for _ in 0..=header.page_count {
            match self.store.read_node(page)? {
                Node::Leaf(leaf) => return Ok(Some((page, leaf))),
                Node::Internal(internal) => page = internal.child_for(key),
            }
        }
        Err(StoreError::Corrupted(format!(
            "descent from root {} does not reach a leaf",
            root
        )))
    }

    pub(crate) fn capacity(&self, kind: NodeKind) -> usize {
        match kind {
            NodeKind::Leaf => self.leaf_capacity,
            NodeKind::Internal => self.internal_capacity,
        }
    }

    /// Fewest keys a non-root node of `kind` may hold.
    pub(crate) fn min_keys(&self, kind: NodeKind) -> usize {
        match kind {
            NodeKind::Leaf => cut(self.leaf_capacity - 1),
            NodeKind::Internal => cut(self.internal_capacity) - 1,
        }
    }

    /// Rewrites the parent pointer of `child`.
    pub(crate) fn set_parent(&self, child: PageNum, parent: Option<PageNum>) -> StoreResult<()> {
        let mut node = self.store.read_node(child)?;
        node.set_parent(parent);
        self.store.write_node(child, &node)
    }
}
