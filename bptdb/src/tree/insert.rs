//! Insertion with leaf and internal splitting.

use log::debug;

use super::BPlusTree;
use crate::errors::{StoreError, StoreResult};
use crate::free_list::FreeListManager;
use crate::page::{ChildPosition, InternalNode, LeafNode, Node};
use crate::types::{cut, Entry, NodeKind, PageNum, Record, Value};

impl BPlusTree {
    /// Inserts a new record. Fails with `DuplicateKey` before touching any
    /// page when `key` is already present.
    pub fn insert(&mut self, key: i64, value: Value) -> StoreResult<()> {
        let record = Record { key, value };
        let Some((page, mut leaf)) = self.find_leaf(key)? else {
            return self.start_new_tree(record);
        };

        if leaf.get(key).is_some() {
            return Err(StoreError::DuplicateKey(key));
        }

        if leaf.records.len() < self.leaf_capacity {
            leaf.insert_sorted(record);
            return self.store.write_node(page, &Node::Leaf(leaf));
        }

        self.split_leaf(page, leaf, record)
    }

    fn start_new_tree(&mut self, record: Record) -> StoreResult<()> {
        let page = FreeListManager::allocate_page(&self.store, NodeKind::Leaf)?;
        let mut leaf = LeafNode::new(None);
        leaf.records.push(record);
        self.store.write_node(page, &Node::Leaf(leaf))?;

        let mut header = self.store.read_header()?;
        header.set_root(Some(page));
        self.store.write_header(&header)?;

        debug!("Started new tree at leaf {}", page);
        Ok(())
    }

    /// Splits a full leaf around the incoming record. The left half keeps
    /// `cut(leaf_capacity)` records; the right half's first key moves up.
    fn split_leaf(&mut self, page: PageNum, mut leaf: LeafNode, record: Record) -> StoreResult<()> {
        leaf.insert_sorted(record);
        let right_records = leaf.records.split_off(cut(self.leaf_capacity));

        let new_page = FreeListManager::allocate_page(&self.store, NodeKind::Leaf)?;
        let new_leaf = LeafNode {
            parent: leaf.parent,
            right_sibling: leaf.right_sibling,
            records: right_records,
        };
        leaf.right_sibling = Some(new_page);

        let separator = new_leaf.records[0].key;
        let parent = leaf.parent;
        self.store.write_node(new_page, &Node::Leaf(new_leaf))?;
        self.store.write_node(page, &Node::Leaf(leaf))?;

        debug!("Split leaf {} at key {} into {}", page, separator, new_page);
        self.insert_into_parent(page, parent, separator, new_page)
    }

    /// Links `right` into `left`'s parent just after `left`, splitting the
    /// parent (and recursing upwards) when it is full.
    fn insert_into_parent(
        &mut self,
        left: PageNum,
        parent: Option<PageNum>,
        key: i64,
        right: PageNum,
    ) -> StoreResult<()> {
        let Some(parent_page) = parent else {
            return self.insert_into_new_root(left, key, right);
        };

        let mut parent = self.store.read_internal(parent_page)?;
        let idx = match parent.position_of(left) {
            Some(ChildPosition::Leftmost) => 0,
            Some(ChildPosition::Entry(i)) => i + 1,
            None => {
                return Err(StoreError::Corrupted(format!(
                    "page {} is not a child of its parent {}",
                    left, parent_page
                )))
            }
        };

        let entry = Entry { key, child: right };
        if parent.entries.len() < self.internal_capacity {
            parent.entries.insert(idx, entry);
            return self.store.write_node(parent_page, &Node::Internal(parent));
        }

        self.split_internal(parent_page, parent, idx, entry)
    }

    /// Splits a full internal node. Entry `cut(capacity + 1) - 1` of the
    /// overflowed sequence moves up; its child becomes the new node's
    /// leftmost child.
    fn split_internal(
        &mut self,
        page: PageNum,
        mut node: InternalNode,
        idx: usize,
        entry: Entry,
    ) -> StoreResult<()> {
        node.entries.insert(idx, entry);
        let split = cut(self.internal_capacity + 1);
        let mut moved = node.entries.split_off(split - 1);
        let promoted = moved.remove(0);

        let new_page = FreeListManager::allocate_page(&self.store, NodeKind::Internal)?;
        let new_node = InternalNode {
            parent: node.parent,
            leftmost_child: promoted.child,
            entries: moved,
        };

        let parent = node.parent;
        self.store.write_node(page, &Node::Internal(node))?;
        for child in new_node.children() {
            self.set_parent(child, Some(new_page))?;
        }
        self.store.write_node(new_page, &Node::Internal(new_node))?;

        debug!(
            "Split internal node {} at key {} into {}",
            page, promoted.key, new_page
        );
        self.insert_into_parent(page, parent, promoted.key, new_page)
    }

    fn insert_into_new_root(&mut self, left: PageNum, key: i64, right: PageNum) -> StoreResult<()> {
        let root = FreeListManager::allocate_page(&self.store, NodeKind::Internal)?;
        let mut node = InternalNode::new(None, left);
        node.entries.push(Entry { key, child: right });
        self.store.write_node(root, &Node::Internal(node))?;

        self.set_parent(left, Some(root))?;
        self.set_parent(right, Some(root))?;

        let mut header = self.store.read_header()?;
        header.set_root(Some(root));
        self.store.write_header(&header)?;

        debug!("New root {} over {} and {}", root, left, right);
        Ok(())
    }
}
