//! Deletion with merge and redistribution, plus whole-tree destruction.

use log::debug;

use super::BPlusTree;
use crate::errors::{StoreError, StoreResult};
use crate::free_list::FreeListManager;
use crate::page::{ChildPosition, InternalNode, Node};
use crate::types::{Entry, PageNum};

/// The sibling chosen to fix an underflowing node.
struct Neighbor {
    page: PageNum,
    node: Node,
    /// Index in the parent of the separator between the node and this sibling.
    separator_index: usize,
    /// True when the sibling sits to the left of the node.
    is_left: bool,
}

impl BPlusTree {
    /// Removes `key`. Fails with `KeyNotFound`, leaving the tree untouched,
    /// when the key is absent.
    pub fn delete(&mut self, key: i64) -> StoreResult<()> {
        let Some((page, mut leaf)) = self.find_leaf(key)? else {
            return Err(StoreError::KeyNotFound(key));
        };
        if leaf.remove(key).is_none() {
            return Err(StoreError::KeyNotFound(key));
        }
        self.rebalance(page, Node::Leaf(leaf))
    }

    /// Frees every node page and leaves an empty tree.
    pub fn destroy(&mut self) -> StoreResult<()> {
        let Some(root) = self.root()? else {
            return Ok(());
        };
        self.free_subtree(root)?;

        let mut header = self.store.read_header()?;
        header.set_root(None);
        self.store.write_header(&header)?;

        debug!("Destroyed tree rooted at {}", root);
        Ok(())
    }

    fn free_subtree(&mut self, page: PageNum) -> StoreResult<()> {
        if let Node::Internal(internal) = self.store.read_node(page)? {
            for child in internal.children() {
                self.free_subtree(child)?;
            }
        }
        FreeListManager::free_page(&self.store, page)
    }

    /// Writes back `node` after a removal, fixing the root or an underflow.
    ///
    /// `node` is the in-memory state after the removal; the page on disk
    /// still holds the state before it.
    fn rebalance(&mut self, page: PageNum, node: Node) -> StoreResult<()> {
        let Some(parent) = node.parent() else {
            if node.key_count() > 0 {
                return self.store.write_node(page, &node);
            }
            return self.adjust_root(page, node);
        };

        if node.key_count() >= self.min_keys(node.kind()) {
            return self.store.write_node(page, &node);
        }
        self.handle_underflow(page, node, parent)
    }

    /// Shrinks an empty root: an empty leaf empties the tree, an internal
    /// root with no keys hands the root to its only child.
    fn adjust_root(&mut self, page: PageNum, node: Node) -> StoreResult<()> {
        let new_root = match node {
            Node::Leaf(_) => None,
            Node::Internal(internal) => {
                self.set_parent(internal.leftmost_child, None)?;
                Some(internal.leftmost_child)
            }
        };

        FreeListManager::free_page(&self.store, page)?;
        let mut header = self.store.read_header()?;
        header.set_root(new_root);
        self.store.write_header(&header)?;

        match new_root {
            Some(root) => debug!("Root collapsed from {} to {}", page, root),
            None => debug!("Tree emptied, freed root {}", page),
        }
        Ok(())
    }

    fn handle_underflow(&mut self, page: PageNum, node: Node, parent_page: PageNum) -> StoreResult<()> {
        let parent = self.store.read_internal(parent_page)?;
        let neighbor = self.neighbor_of(page, parent_page, &parent)?;
        let separator = parent.entries[neighbor.separator_index].key;

        if neighbor.node.kind() != node.kind() {
            return Err(StoreError::Corrupted(format!(
                "siblings {} and {} differ in kind",
                page, neighbor.page
            )));
        }

        if node.key_count() + neighbor.node.key_count() < self.capacity(node.kind()) {
            if neighbor.is_left {
                self.coalesce(neighbor.page, neighbor.node, page, node, parent_page, separator)
            } else {
                self.coalesce(page, node, neighbor.page, neighbor.node, parent_page, separator)
            }
        } else {
            self.redistribute(page, node, neighbor, parent_page, parent)
        }
    }

    /// Left sibling when there is one; the leftmost child uses its right
    /// sibling instead.
    fn neighbor_of(
        &self,
        page: PageNum,
        parent_page: PageNum,
        parent: &InternalNode,
    ) -> StoreResult<Neighbor> {
        let (separator_index, sibling, is_left) = match parent.position_of(page) {
            Some(ChildPosition::Leftmost) => {
                let first = parent.entries.first().ok_or_else(|| {
                    StoreError::Corrupted(format!("parent {} has no entries", parent_page))
                })?;
                (0, first.child, false)
            }
            Some(ChildPosition::Entry(0)) => (0, parent.leftmost_child, true),
            Some(ChildPosition::Entry(i)) => (i, parent.entries[i - 1].child, true),
            None => {
                return Err(StoreError::Corrupted(format!(
                    "page {} is not a child of its parent {}",
                    page, parent_page
                )))
            }
        };

        Ok(Neighbor {
            page: sibling,
            node: self.store.read_node(sibling)?,
            separator_index,
            is_left,
        })
    }

    /// Merges `right` into `left`, frees `right` and removes the separator
    /// from the parent.
    fn coalesce(
        &mut self,
        left_page: PageNum,
        left: Node,
        right_page: PageNum,
        right: Node,
        parent_page: PageNum,
        separator: i64,
    ) -> StoreResult<()> {
        match (left, right) {
            (Node::Leaf(mut left), Node::Leaf(right)) => {
                left.records.extend(right.records);
                left.right_sibling = right.right_sibling;
                self.store.write_node(left_page, &Node::Leaf(left))?;
            }
            (Node::Internal(mut left), Node::Internal(right)) => {
                let moved: Vec<PageNum> = right.children().collect();
                left.entries.push(Entry {
                    key: separator,
                    child: right.leftmost_child,
                });
                left.entries.extend(right.entries);
                self.store.write_node(left_page, &Node::Internal(left))?;
                for child in moved {
                    self.set_parent(child, Some(left_page))?;
                }
            }
            _ => {
                return Err(StoreError::Corrupted(format!(
                    "cannot merge {} and {}: kinds differ",
                    left_page, right_page
                )))
            }
        }

        FreeListManager::free_page(&self.store, right_page)?;
        debug!("Merged {} into {}", right_page, left_page);

        let mut parent = self.store.read_internal(parent_page)?;
        match parent.remove_key(separator) {
            Some(entry) if entry.child == right_page => {}
            _ => {
                return Err(StoreError::Corrupted(format!(
                    "parent {} has no separator {} for {}",
                    parent_page, separator, right_page
                )))
            }
        }
        self.rebalance(parent_page, Node::Internal(parent))
    }

    /// Moves one record or entry from `neighbor` into `node` through the
    /// parent separator.
    fn redistribute(
        &mut self,
        page: PageNum,
        node: Node,
        neighbor: Neighbor,
        parent_page: PageNum,
        mut parent: InternalNode,
    ) -> StoreResult<()> {
        let sep = neighbor.separator_index;
        let separator = parent.entries[sep].key;

        match (node, neighbor.node) {
            (Node::Leaf(mut node), Node::Leaf(mut sibling)) => {
                if neighbor.is_left {
                    let moved = sibling.records.pop().ok_or_else(|| empty(neighbor.page))?;
                    node.records.insert(0, moved);
                    parent.entries[sep].key = moved.key;
                } else {
                    if sibling.records.len() < 2 {
                        return Err(empty(neighbor.page));
                    }
                    let moved = sibling.records.remove(0);
                    node.records.push(moved);
                    parent.entries[sep].key =
                        sibling.records.first().ok_or_else(|| empty(neighbor.page))?.key;
                }
                self.store.write_node(neighbor.page, &Node::Leaf(sibling))?;
                self.store.write_node(page, &Node::Leaf(node))?;
            }
            (Node::Internal(mut node), Node::Internal(mut sibling)) => {
                let moved_child = if neighbor.is_left {
                    let last = sibling.entries.pop().ok_or_else(|| empty(neighbor.page))?;
                    node.entries.insert(
                        0,
                        Entry {
                            key: separator,
                            child: node.leftmost_child,
                        },
                    );
                    node.leftmost_child = last.child;
                    parent.entries[sep].key = last.key;
                    last.child
                } else {
                    if sibling.entries.is_empty() {
                        return Err(empty(neighbor.page));
                    }
                    let first = sibling.entries.remove(0);
                    let moved_child = sibling.leftmost_child;
                    node.entries.push(Entry {
                        key: separator,
                        child: moved_child,
                    });
                    sibling.leftmost_child = first.child;
                    parent.entries[sep].key = first.key;
                    moved_child
                };
                self.store.write_node(neighbor.page, &Node::Internal(sibling))?;
                self.store.write_node(page, &Node::Internal(node))?;
                self.set_parent(moved_child, Some(page))?;
            }
            _ => {
                return Err(StoreError::Corrupted(format!(
                    "cannot redistribute between {} and {}: kinds differ",
                    page, neighbor.page
                )))
            }
        }

        self.store.write_node(parent_page, &Node::Internal(parent))?;
        debug!(
            "Borrowed from {} sibling {} into {}",
            if neighbor.is_left { "left" } else { "right" },
            neighbor.page,
            page
        );
        Ok(())
    }
}

fn empty(page: PageNum) -> StoreError {
    StoreError::Corrupted(format!("sibling {} has nothing to lend", page))
}
