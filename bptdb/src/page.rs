//! Page records: the header page, free pages, and leaf/internal node pages.
//!
//! Header and free pages are serde structs encoded with bincode's legacy
//! configuration (fixed-width little-endian integers). Node pages use an
//! explicit byte layout so that the kind tag sits at the same offset for both
//! node kinds and can be probed without knowing the kind in advance:
//!
//! ```text
//! 0..8      parent page (0 = none)
//! 8..12     kind tag (1 = leaf, 2 = internal)
//! 12..16    key count
//! 16..120   reserved
//! 120..128  right sibling (leaf) / leftmost child (internal)
//! 128..     records (8-byte key + 120-byte value) or entries (key + child)
//! ```

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::constants::*;
use crate::errors::{StoreError, StoreResult};
use crate::types::{Entry, NodeKind, PageNum, Record, Value};

/// One page worth of bytes.
pub type PageBuf = [u8; PAGE_SIZE];

// ============================================================================
// File Header
// ============================================================================

/// Header stored on page 0; the single source of truth for tree shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub page_size: u32,
    pub leaf_capacity: u32,
    pub internal_capacity: u32,
    pub root_page: u64,
    /// Next never-used page number outside the internal reservation.
    pub page_count: u64,
    pub free_leaf_head: u64,
    pub free_internal_head: u64,
    /// Pages `1..=internal_reservation` are minted only for internal nodes.
    pub internal_reservation: u64,
    /// Next unminted page in the internal reservation.
    pub internal_cursor: u64,
}

impl FileHeader {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            page_size: PAGE_SIZE as u32,
            leaf_capacity: config.leaf_capacity() as u32,
            internal_capacity: config.internal_capacity() as u32,
            root_page: 0,
            page_count: config.internal_reservation() + 1,
            free_leaf_head: 0,
            free_internal_head: 0,
            internal_reservation: config.internal_reservation(),
            internal_cursor: 1,
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.magic != MAGIC {
            return Err(StoreError::InvalidFormat("bad magic".into()));
        }
        if self.version != VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.page_size as usize != PAGE_SIZE {
            return Err(StoreError::InvalidFormat(format!(
                "page size {} (expected {})",
                self.page_size, PAGE_SIZE
            )));
        }
        let leaf = self.leaf_capacity as usize;
        let internal = self.internal_capacity as usize;
        if !(MIN_CAPACITY..=LEAF_CAPACITY).contains(&leaf)
            || !(MIN_CAPACITY..=INTERNAL_CAPACITY).contains(&internal)
        {
            return Err(StoreError::InvalidFormat(format!(
                "capacities out of range (leaf {}, internal {})",
                leaf, internal
            )));
        }
        if self.internal_reservation > MAX_INTERNAL_RESERVATION
            || self.page_count > MAX_PAGE_NUM
            || self.internal_cursor == 0
            || self.internal_cursor > self.internal_reservation + 1
            || self.page_count <= self.internal_reservation
        {
            return Err(StoreError::InvalidFormat(format!(
                "page counters inconsistent (page_count {}, cursor {}, reservation {})",
                self.page_count, self.internal_cursor, self.internal_reservation
            )));
        }
        Ok(())
    }

    pub fn root(&self) -> Option<PageNum> {
        PageNum::new(self.root_page)
    }

    pub fn set_root(&mut self, root: Option<PageNum>) {
        self.root_page = PageNum::raw(root);
    }

    pub fn free_head(&self, kind: NodeKind) -> Option<PageNum> {
        match kind {
            NodeKind::Leaf => PageNum::new(self.free_leaf_head),
            NodeKind::Internal => PageNum::new(self.free_internal_head),
        }
    }

    pub fn set_free_head(&mut self, kind: NodeKind, head: Option<PageNum>) {
        match kind {
            NodeKind::Leaf => self.free_leaf_head = PageNum::raw(head),
            NodeKind::Internal => self.free_internal_head = PageNum::raw(head),
        }
    }

    pub fn encode(&self) -> StoreResult<PageBuf> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::legacy())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut buf = [0u8; PAGE_SIZE];
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(buf)
    }

    pub fn decode(buf: &PageBuf) -> StoreResult<Self> {
        bincode::serde::decode_from_slice(buf, bincode::config::legacy())
            .map(|(header, _)| header)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

// ============================================================================
// Free Page
// ============================================================================

/// A page on a free-list chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreePage {
    /// Next free page of the same kind (0 = end of chain)
    pub next_free: u64,
}

impl FreePage {
    pub fn new(next: Option<PageNum>) -> Self {
        Self {
            next_free: PageNum::raw(next),
        }
    }

    pub fn next(&self) -> Option<PageNum> {
        PageNum::new(self.next_free)
    }

    /// Encodes the record; the rest of the page is zeroed so no old node
    /// contents survive.
    pub fn encode(&self) -> StoreResult<PageBuf> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::legacy())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut buf = [0u8; PAGE_SIZE];
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(buf)
    }

    pub fn decode(buf: &PageBuf) -> StoreResult<Self> {
        bincode::serde::decode_from_slice(buf, bincode::config::legacy())
            .map(|(page, _)| page)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

// ============================================================================
// Node Pages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub parent: Option<PageNum>,
    pub right_sibling: Option<PageNum>,
    /// Sorted strictly ascending by key.
    pub records: Vec<Record>,
}

impl LeafNode {
    pub fn new(parent: Option<PageNum>) -> Self {
        Self {
            parent,
            right_sibling: None,
            records: Vec::new(),
        }
    }

    /// Slot of `key`, or the slot it would be inserted at.
    pub fn search(&self, key: i64) -> Result<usize, usize> {
        self.records.binary_search_by_key(&key, |r| r.key)
    }

    pub fn get(&self, key: i64) -> Option<&Record> {
        self.search(key).ok().map(|slot| &self.records[slot])
    }

    /// Inserts in sorted position. The caller has ruled out duplicates.
    pub fn insert_sorted(&mut self, record: Record) {
        let slot = self.search(record.key).unwrap_or_else(|slot| slot);
        self.records.insert(slot, record);
    }

    pub fn remove(&mut self, key: i64) -> Option<Record> {
        self.search(key).ok().map(|slot| self.records.remove(slot))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    pub parent: Option<PageNum>,
    /// Routes keys below `entries[0].key`.
    pub leftmost_child: PageNum,
    /// Sorted strictly ascending by key.
    pub entries: Vec<Entry>,
}

impl InternalNode {
    pub fn new(parent: Option<PageNum>, leftmost_child: PageNum) -> Self {
        Self {
            parent,
            leftmost_child,
            entries: Vec::new(),
        }
    }

    /// Child covering `key`: the entry with the largest key `<= key`, or the
    /// leftmost child when `key` is below every entry.
    pub fn child_for(&self, key: i64) -> PageNum {
        let idx = self.entries.partition_point(|e| e.key <= key);
        if idx == 0 {
            self.leftmost_child
        } else {
            self.entries[idx - 1].child
        }
    }

    /// All children, leftmost first.
    pub fn children(&self) -> impl Iterator<Item = PageNum> + '_ {
        std::iter::once(self.leftmost_child).chain(self.entries.iter().map(|e| e.child))
    }

    /// Position of `child` among this node's pointers.
    pub fn position_of(&self, child: PageNum) -> Option<ChildPosition> {
        if self.leftmost_child == child {
            return Some(ChildPosition::Leftmost);
        }
        self.entries
            .iter()
            .position(|e| e.child == child)
            .map(ChildPosition::Entry)
    }

    pub fn remove_key(&mut self, key: i64) -> Option<Entry> {
        self.entries
            .iter()
            .position(|e| e.key == key)
            .map(|idx| self.entries.remove(idx))
    }
}

/// Where a child pointer sits inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPosition {
    Leftmost,
    Entry(usize),
}

/// A decoded node page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Leaf(_) => NodeKind::Leaf,
            Node::Internal(_) => NodeKind::Internal,
        }
    }

    pub fn parent(&self) -> Option<PageNum> {
        match self {
            Node::Leaf(leaf) => leaf.parent,
            Node::Internal(internal) => internal.parent,
        }
    }

    pub fn set_parent(&mut self, parent: Option<PageNum>) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Internal(internal) => internal.parent = parent,
        }
    }

    pub fn key_count(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.records.len(),
            Node::Internal(internal) => internal.entries.len(),
        }
    }

    pub fn keys(&self) -> Vec<i64> {
        match self {
            Node::Leaf(leaf) => leaf.records.iter().map(|r| r.key).collect(),
            Node::Internal(internal) => internal.entries.iter().map(|e| e.key).collect(),
        }
    }

    pub fn encode(&self) -> StoreResult<PageBuf> {
        let mut buf = [0u8; PAGE_SIZE];
        LittleEndian::write_u64(&mut buf[PARENT_OFFSET..], PageNum::raw(self.parent()));

        match self {
            Node::Leaf(leaf) => {
                if leaf.records.len() > LEAF_CAPACITY {
                    return Err(StoreError::Corrupted(format!(
                        "leaf holds {} records (max {})",
                        leaf.records.len(),
                        LEAF_CAPACITY
                    )));
                }
                LittleEndian::write_u32(&mut buf[KIND_OFFSET..], LEAF_TAG);
                LittleEndian::write_u32(&mut buf[KEY_COUNT_OFFSET..], leaf.records.len() as u32);
                LittleEndian::write_u64(&mut buf[LINK_OFFSET..], PageNum::raw(leaf.right_sibling));
                for (i, record) in leaf.records.iter().enumerate() {
                    let at = BODY_OFFSET + i * RECORD_SIZE;
                    LittleEndian::write_i64(&mut buf[at..], record.key);
                    buf[at + 8..at + RECORD_SIZE].copy_from_slice(record.value.as_bytes());
                }
            }
            Node::Internal(internal) => {
                if internal.entries.len() > INTERNAL_CAPACITY {
                    return Err(StoreError::Corrupted(format!(
                        "internal node holds {} entries (max {})",
                        internal.entries.len(),
                        INTERNAL_CAPACITY
                    )));
                }
                LittleEndian::write_u32(&mut buf[KIND_OFFSET..], INTERNAL_TAG);
                LittleEndian::write_u32(
                    &mut buf[KEY_COUNT_OFFSET..],
                    internal.entries.len() as u32,
                );
                LittleEndian::write_u64(&mut buf[LINK_OFFSET..], internal.leftmost_child.get());
                for (i, entry) in internal.entries.iter().enumerate() {
                    let at = BODY_OFFSET + i * ENTRY_SIZE;
                    LittleEndian::write_i64(&mut buf[at..], entry.key);
                    LittleEndian::write_u64(&mut buf[at + 8..], entry.child.get());
                }
            }
        }
        Ok(buf)
    }

    pub fn decode(page: PageNum, buf: &PageBuf) -> StoreResult<Node> {
        let parent = PageNum::new(LittleEndian::read_u64(&buf[PARENT_OFFSET..]));
        let count = LittleEndian::read_u32(&buf[KEY_COUNT_OFFSET..]) as usize;
        let link = LittleEndian::read_u64(&buf[LINK_OFFSET..]);

        match probe_kind(buf) {
            Some(NodeKind::Leaf) => {
                if count > LEAF_CAPACITY {
                    return Err(StoreError::Corrupted(format!(
                        "leaf page {} claims {} records",
                        page, count
                    )));
                }
                let records = (0..count)
                    .map(|i| {
                        let at = BODY_OFFSET + i * RECORD_SIZE;
                        let mut value = [0u8; VALUE_SIZE];
                        value.copy_from_slice(&buf[at + 8..at + RECORD_SIZE]);
                        Record {
                            key: LittleEndian::read_i64(&buf[at..]),
                            value: Value::from_array(value),
                        }
                    })
                    .collect();
                Ok(Node::Leaf(LeafNode {
                    parent,
                    right_sibling: PageNum::new(link),
                    records,
                }))
            }
            Some(NodeKind::Internal) => {
                if count > INTERNAL_CAPACITY {
                    return Err(StoreError::Corrupted(format!(
                        "internal page {} claims {} entries",
                        page, count
                    )));
                }
                let leftmost_child = PageNum::new(link).ok_or_else(|| {
                    StoreError::Corrupted(format!("internal page {} has no leftmost child", page))
                })?;
                let entries = (0..count)
                    .map(|i| {
                        let at = BODY_OFFSET + i * ENTRY_SIZE;
                        let child = PageNum::new(LittleEndian::read_u64(&buf[at + 8..]))
                            .ok_or_else(|| {
                                StoreError::Corrupted(format!(
                                    "internal page {} entry {} has a null child",
                                    page, i
                                ))
                            })?;
                        Ok(Entry {
                            key: LittleEndian::read_i64(&buf[at..]),
                            child,
                        })
                    })
                    .collect::<StoreResult<Vec<_>>>()?;
                Ok(Node::Internal(InternalNode {
                    parent,
                    leftmost_child,
                    entries,
                }))
            }
            None => Err(StoreError::Corrupted(format!(
                "page {} is neither leaf nor internal (tag {})",
                page,
                LittleEndian::read_u32(&buf[KIND_OFFSET..])
            ))),
        }
    }
}

/// Reads the kind tag without decoding the rest of the page.
pub fn probe_kind(buf: &PageBuf) -> Option<NodeKind> {
    match LittleEndian::read_u32(&buf[KIND_OFFSET..]) {
        LEAF_TAG => Some(NodeKind::Leaf),
        INTERNAL_TAG => Some(NodeKind::Internal),
        _ => None,
    }
}
