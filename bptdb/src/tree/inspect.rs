//! Read-only inspection: shape queries and a full integrity check.

use std::collections::{HashSet, VecDeque};

use super::BPlusTree;
use crate::errors::{StoreError, StoreResult};
use crate::free_list::FreeListManager;
use crate::page::Node;
use crate::types::{NodeKind, PageNum};

/// One node as seen by [`BPlusTree::level_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub page: PageNum,
    pub kind: NodeKind,
    pub parent: Option<PageNum>,
    pub keys: Vec<i64>,
}

/// Result of integrity check
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    /// Number of node and free pages visited
    pub pages_checked: u64,
    pub leaf_pages: u64,
    pub internal_pages: u64,
    /// Records reachable from the root
    pub records: u64,
    /// Pages on either free list
    pub free_pages: u64,
    /// Edges from root to leaf, `None` for an empty tree
    pub height: Option<usize>,
    /// Problems found, one line each
    pub errors: Vec<String>,
    /// Whether the file is consistent
    pub is_valid: bool,
}

impl IntegrityReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    fn error(&mut self, message: String) {
        self.errors.push(message);
        self.is_valid = false;
    }
}

/// Walk state for the structural check.
struct Walk {
    visited: HashSet<PageNum>,
    leaves_in_order: Vec<PageNum>,
    leaf_depth: Option<usize>,
}

impl BPlusTree {
    /// Edges from the root to a leaf; `None` for an empty tree.
    pub fn height(&self) -> StoreResult<Option<usize>> {
        Ok(self.leftmost_path()?.map(|path| path.len() - 1))
    }

    /// Page of the leftmost leaf; `None` for an empty tree.
    pub fn leftmost_leaf(&self) -> StoreResult<Option<PageNum>> {
        Ok(self.leftmost_path()?.and_then(|path| path.last().copied()))
    }

    /// Keys of every leaf, following the sibling chain from the leftmost leaf.
    pub fn leaf_chain(&self) -> StoreResult<Vec<Vec<i64>>> {
        let mut chain = Vec::new();
        let limit = self.store.read_header()?.page_count as usize;
        let mut next = self.leftmost_leaf()?;

        while let Some(page) = next {
            if chain.len() > limit {
                return Err(StoreError::Corrupted(format!(
                    "leaf chain loops near page {}",
                    page
                )));
            }
            let leaf = self.store.read_leaf(page)?;
            chain.push(leaf.records.iter().map(|r| r.key).collect());
            next = leaf.right_sibling;
        }
        Ok(chain)
    }

    /// Nodes grouped by level, root first, each level left to right.
    pub fn level_order(&self) -> StoreResult<Vec<Vec<NodeSummary>>> {
        let mut levels: Vec<Vec<NodeSummary>> = Vec::new();
        let Some(root) = self.root()? else {
            return Ok(levels);
        };

        let mut queue = VecDeque::from([(root, 0usize)]);
        let mut seen = HashSet::new();
        while let Some((page, depth)) = queue.pop_front() {
            if !seen.insert(page) {
                return Err(StoreError::Corrupted(format!(
                    "page {} reachable twice",
                    page
                )));
            }
            let node = self.store.read_node(page)?;
            if let Node::Internal(internal) = &node {
                queue.extend(internal.children().map(|child| (child, depth + 1)));
            }
            if levels.len() <= depth {
                levels.push(Vec::new());
            }
            levels[depth].push(NodeSummary {
                page,
                kind: node.kind(),
                parent: node.parent(),
                keys: node.keys(),
            });
        }
        Ok(levels)
    }

    /// Checks the whole file: header, node structure and free lists.
    ///
    /// I/O failures are returned as errors; every structural problem is
    /// collected into the report instead.
    pub fn check_integrity(&self) -> StoreResult<IntegrityReport> {
        let mut report = IntegrityReport::new();
        let header = self.store.read_header()?;

        if let Err(e) = header.validate() {
            report.error(format!("Invalid header: {}", e));
            return Ok(report);
        }

        let mut walk = Walk {
            visited: HashSet::new(),
            leaves_in_order: Vec::new(),
            leaf_depth: None,
        };

        if let Some(root) = header.root() {
            self.check_node(root, None, None, None, 0, &mut walk, &mut report)?;
            report.height = walk.leaf_depth;
            self.check_leaf_chain(&walk.leaves_in_order, &mut report)?;
        }

        for kind in [NodeKind::Leaf, NodeKind::Internal] {
            let chain = match FreeListManager::free_chain(&self.store, kind) {
                Ok(chain) => chain,
                Err(StoreError::Io(e)) => return Err(StoreError::Io(e)),
                Err(e) => {
                    report.error(format!("{} free list: {}", kind, e));
                    continue;
                }
            };
            for page in chain {
                report.pages_checked += 1;
                report.free_pages += 1;
                if page.get() >= header.page_count {
                    report.error(format!(
                        "free page {} beyond page count {}",
                        page, header.page_count
                    ));
                }
                if !walk.visited.insert(page) {
                    report.error(format!("free page {} is also in use", page));
                }
            }
        }

        Ok(report)
    }

    /// Recursively checks the subtree at `page`, whose keys must lie in
    /// `[lower, upper)`.
    #[allow(clippy::too_many_arguments)]
    fn check_node(
        &self,
        page: PageNum,
        expected_parent: Option<PageNum>,
        lower: Option<i64>,
        upper: Option<i64>,
        depth: usize,
        walk: &mut Walk,
        report: &mut IntegrityReport,
    ) -> StoreResult<()> {
        if !walk.visited.insert(page) {
            report.error(format!("page {} reachable twice", page));
            return Ok(());
        }
        let node = match self.store.read_node(page) {
            Ok(node) => node,
            Err(StoreError::Io(e)) => return Err(StoreError::Io(e)),
            Err(e) => {
                report.error(format!("page {}: {}", page, e));
                return Ok(());
            }
        };
        report.pages_checked += 1;

        if node.parent() != expected_parent {
            report.error(format!(
                "page {} has parent {:?}, expected {:?}",
                page,
                node.parent().map(PageNum::get),
                expected_parent.map(PageNum::get)
            ));
        }

        let keys = node.keys();
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            report.error(format!("page {} keys are not strictly ascending", page));
        }
        if let (Some(lo), Some(first)) = (lower, keys.first()) {
            if *first < lo {
                report.error(format!("page {} key {} below separator {}", page, first, lo));
            }
        }
        if let (Some(hi), Some(last)) = (upper, keys.last()) {
            if *last >= hi {
                report.error(format!("page {} key {} not below separator {}", page, last, hi));
            }
        }

        let kind = node.kind();
        let count = node.key_count();
        if count > self.capacity(kind) {
            report.error(format!(
                "{} page {} holds {} keys (capacity {})",
                kind,
                page,
                count,
                self.capacity(kind)
            ));
        }
        if expected_parent.is_some() && count < self.min_keys(kind) {
            report.error(format!(
                "{} page {} underfull: {} keys (min {})",
                kind,
                page,
                count,
                self.min_keys(kind)
            ));
        }

        match node {
            Node::Leaf(leaf) => {
                report.leaf_pages += 1;
                report.records += leaf.records.len() as u64;
                if expected_parent.is_none() && leaf.records.is_empty() {
                    report.error(format!("root leaf {} is empty", page));
                }
                match walk.leaf_depth {
                    None => walk.leaf_depth = Some(depth),
                    Some(d) if d != depth => report.error(format!(
                        "leaf {} at depth {}, other leaves at depth {}",
                        page, depth, d
                    )),
                    _ => {}
                }
                walk.leaves_in_order.push(page);
            }
            Node::Internal(internal) => {
                report.internal_pages += 1;
                if internal.entries.is_empty() {
                    report.error(format!("internal page {} has no entries", page));
                }
                let mut bound = lower;
                let mut child = internal.leftmost_child;
                for entry in &internal.entries {
                    self.check_node(
                        child,
                        Some(page),
                        bound,
                        Some(entry.key),
                        depth + 1,
                        walk,
                        report,
                    )?;
                    bound = Some(entry.key);
                    child = entry.child;
                }
                self.check_node(child, Some(page), bound, upper, depth + 1, walk, report)?;
            }
        }
        Ok(())
    }

    /// The sibling chain must visit exactly the leaves found by the walk, in
    /// the same order.
    fn check_leaf_chain(&self, expected: &[PageNum], report: &mut IntegrityReport) -> StoreResult<()> {
        let mut next = expected.first().copied();
        let mut position = 0;

        while let Some(page) = next {
            if position >= expected.len() {
                report.error(format!("leaf chain runs past last leaf into page {}", page));
                return Ok(());
            }
            if page != expected[position] {
                report.error(format!(
                    "leaf chain visits {} where {} was expected",
                    page, expected[position]
                ));
                return Ok(());
            }
            next = match self.store.read_leaf(page) {
                Ok(leaf) => leaf.right_sibling,
                Err(StoreError::Io(e)) => return Err(StoreError::Io(e)),
                Err(e) => {
                    report.error(format!("leaf chain: {}", e));
                    return Ok(());
                }
            };
            position += 1;
        }

        if position != expected.len() {
            report.error(format!(
                "leaf chain stops after {} of {} leaves",
                position,
                expected.len()
            ));
        }
        Ok(())
    }

    /// Pages from the root down the leftmost edge.
    fn leftmost_path(&self) -> StoreResult<Option<Vec<PageNum>>> {
        let header = self.store.read_header()?;
        let Some(root) = header.root() else {
            return Ok(None);
        };

        let mut path = vec![root];
        let mut page = root;
        while let Node::Internal(internal) = self.store.read_node(page)? {
            if path.len() as u64 > header.page_count {
                return Err(StoreError::Corrupted(format!(
                    "leftmost descent from {} does not reach a leaf",
                    root
                )));
            }
            page = internal.leftmost_child;
            path.push(page);
        }
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{FreePage, LeafNode};
    use crate::types::Value;
    use std::path::Path;
    use tempfile::tempdir;

    fn value(key: i64) -> Value {
        Value::new(format!("value_{}", key).as_bytes()).unwrap()
    }

    fn tree_with(dir: &Path) -> BPlusTree {
        BPlusTree::with_config()
            .leaf_capacity(4)
            .internal_capacity(4)
            .internal_reservation(8)
            .sync_writes(false)
            .open(dir.join("inspect.db"))
            .unwrap()
    }

    #[test]
    fn test_empty_tree_shape() {
        let dir = tempdir().unwrap();
        let tree = tree_with(dir.path());
        assert_eq!(tree.height().unwrap(), None);
        assert_eq!(tree.leftmost_leaf().unwrap(), None);
        assert!(tree.leaf_chain().unwrap().is_empty());
        assert!(tree.level_order().unwrap().is_empty());

        let report = tree.check_integrity().unwrap();
        assert!(report.is_valid);
        assert_eq!(report.pages_checked, 0);
        assert_eq!(report.height, None);
    }

    #[test]
    fn test_level_order_two_levels() {
        let dir = tempdir().unwrap();
        let mut tree = tree_with(dir.path());
        for k in [10, 20, 30, 40, 50] {
            tree.insert(k, value(k)).unwrap();
        }

        let levels = tree.level_order().unwrap();
        assert_eq!(levels.len(), 2);
        let root = &levels[0][0];
        assert_eq!(root.kind, NodeKind::Internal);
        assert_eq!(root.parent, None);
        assert_eq!(root.keys, vec![30]);

        let leaves: Vec<Vec<i64>> = levels[1].iter().map(|s| s.keys.clone()).collect();
        assert_eq!(leaves, vec![vec![10, 20], vec![30, 40, 50]]);
        assert!(levels[1].iter().all(|s| s.parent == Some(root.page)));
        assert_eq!(tree.leftmost_leaf().unwrap(), Some(levels[1][0].page));
    }

    #[test]
    fn test_report_counts() {
        let dir = tempdir().unwrap();
        let mut tree = tree_with(dir.path());
        for k in 0..50 {
            tree.insert(k, value(k)).unwrap();
        }
        let report = tree.check_integrity().unwrap();
        assert!(report.is_valid, "{:?}", report.errors);
        assert_eq!(report.records, 50);
        assert_eq!(report.height, tree.height().unwrap());
        assert_eq!(
            report.pages_checked,
            report.leaf_pages + report.internal_pages + report.free_pages
        );
        assert_eq!(report.leaf_pages as usize, tree.leaf_chain().unwrap().len());
    }

    #[test]
    fn test_detects_bad_parent_pointer() {
        let dir = tempdir().unwrap();
        let mut tree = tree_with(dir.path());
        for k in [10, 20, 30, 40, 50] {
            tree.insert(k, value(k)).unwrap();
        }
        let leaf_page = tree.leftmost_leaf().unwrap().unwrap();
        tree.set_parent(leaf_page, None).unwrap();

        let report = tree.check_integrity().unwrap();
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("parent")));
    }

    #[test]
    fn test_detects_unsorted_leaf() {
        let dir = tempdir().unwrap();
        let mut tree = tree_with(dir.path());
        for k in [1, 2, 3] {
            tree.insert(k, value(k)).unwrap();
        }
        let root = tree.root().unwrap().unwrap();
        let mut leaf = tree.store.read_leaf(root).unwrap();
        leaf.records.swap(0, 2);
        tree.store.write_node(root, &Node::Leaf(leaf)).unwrap();

        let report = tree.check_integrity().unwrap();
        assert!(!report.is_valid);
    }

    #[test]
    fn test_detects_broken_sibling_chain() {
        let dir = tempdir().unwrap();
        let mut tree = tree_with(dir.path());
        for k in [10, 20, 30, 40, 50] {
            tree.insert(k, value(k)).unwrap();
        }
        let first = tree.leftmost_leaf().unwrap().unwrap();
        let mut leaf = tree.store.read_leaf(first).unwrap();
        leaf.right_sibling = None;
        tree.store.write_node(first, &Node::Leaf(leaf)).unwrap();

        let report = tree.check_integrity().unwrap();
        assert!(report.errors.iter().any(|e| e.contains("leaf chain")));
    }

    #[test]
    fn test_detects_live_page_on_free_list() {
        let dir = tempdir().unwrap();
        let mut tree = tree_with(dir.path());
        tree.insert(1, value(1)).unwrap();
        let root = tree.root().unwrap().unwrap();

        // push a spare leaf onto the free list, then point it at the live root
        let spare = PageNum::new(root.get() + 1).unwrap();
        tree.store.write_node(spare, &Node::Leaf(LeafNode::new(None))).unwrap();
        FreeListManager::free_page(&tree.store, spare).unwrap();
        tree.store.write_free_page(spare, &FreePage::new(Some(root))).unwrap();

        let report = tree.check_integrity().unwrap();
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("also in use")));
    }
}
