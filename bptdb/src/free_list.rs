//! Page allocation with one free list per node kind.

use log::trace;

use crate::errors::{StoreError, StoreResult};
use crate::page::FreePage;
use crate::storage::PageStore;
use crate::types::{NodeKind, PageNum};

/// Hands out recycled or never-used page numbers and takes pages back.
///
/// Both operations read, modify and rewrite the header page themselves, so
/// callers holding a header copy must re-read it afterwards.
pub struct FreeListManager;

impl FreeListManager {
    /// Allocate a page for a node of `kind`, reusing the head of that kind's
    /// free list when it is non-empty.
    pub fn allocate_page(store: &PageStore, kind: NodeKind) -> StoreResult<PageNum> {
        let mut header = store.read_header()?;

        let page = if let Some(head) = header.free_head(kind) {
            let free = store.read_free_page(head)?;
            header.set_free_head(kind, free.next());
            trace!("Reused free {} page {}", kind, head);
            head
        } else if kind == NodeKind::Internal
            && header.internal_cursor <= header.internal_reservation
        {
            let raw = header.internal_cursor;
            header.internal_cursor += 1;
            trace!("Minted reserved internal page {}", raw);
            Self::page_num(raw)?
        } else {
            let raw = header.page_count;
            header.page_count += 1;
            trace!("Minted {} page {}", kind, raw);
            Self::page_num(raw)?
        };

        store.write_header(&header)?;
        Ok(page)
    }

    /// Free a node page by pushing it on the free list for its kind.
    ///
    /// The page's kind tag decides the list; a page that does not hold a node
    /// is rejected. The free page is written before the header.
    pub fn free_page(store: &PageStore, page: PageNum) -> StoreResult<()> {
        let kind = store.page_kind(page)?.ok_or_else(|| {
            StoreError::Corrupted(format!("cannot free page {}: not a node page", page))
        })?;

        let mut header = store.read_header()?;
        store.write_free_page(page, &FreePage::new(header.free_head(kind)))?;
        header.set_free_head(kind, Some(page));
        store.write_header(&header)?;

        trace!("Freed {} page {}", kind, page);
        Ok(())
    }

    /// Pages on the free list for `kind`, head first.
    ///
    /// Fails on a cycle or a chain longer than the file can hold.
    pub fn free_chain(store: &PageStore, kind: NodeKind) -> StoreResult<Vec<PageNum>> {
        let header = store.read_header()?;
        let limit = header.page_count as usize;
        let mut chain = Vec::new();
        let mut next = header.free_head(kind);

        while let Some(page) = next {
            if chain.len() >= limit || chain.contains(&page) {
                return Err(StoreError::Corrupted(format!(
                    "{} free list loops at page {}",
                    kind, page
                )));
            }
            chain.push(page);
            next = store.read_free_page(page)?.next();
        }
        Ok(chain)
    }

    fn page_num(raw: u64) -> StoreResult<PageNum> {
        PageNum::new(raw)
            .ok_or_else(|| StoreError::Corrupted("allocator produced the header page".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::page::{FileHeader, InternalNode, LeafNode, Node};
    use tempfile::tempdir;

    fn setup(reservation: u64) -> (tempfile::TempDir, PageStore) {
        let dir = tempdir().unwrap();
        let (store, _) = PageStore::open_or_create(&dir.path().join("alloc.db"), false).unwrap();
        let mut config = StoreConfig::default();
        config.set_internal_reservation(reservation);
        store.write_header(&FileHeader::new(&config)).unwrap();
        (dir, store)
    }

    fn leaf() -> Node {
        Node::Leaf(LeafNode::new(None))
    }

    #[test]
    fn test_leaf_pages_start_after_reservation() {
        let (_dir, store) = setup(4);
        let a = FreeListManager::allocate_page(&store, NodeKind::Leaf).unwrap();
        let b = FreeListManager::allocate_page(&store, NodeKind::Leaf).unwrap();
        assert_eq!(a.get(), 5);
        assert_eq!(b.get(), 6);
        assert_eq!(store.read_header().unwrap().page_count, 7);
    }

    #[test]
    fn test_internal_pages_use_reservation_first() {
        let (_dir, store) = setup(2);
        let pages: Vec<u64> = (0..4)
            .map(|_| {
                FreeListManager::allocate_page(&store, NodeKind::Internal)
                    .unwrap()
                    .get()
            })
            .collect();
        // two reserved pages, then from the shared counter
        assert_eq!(pages, vec![1, 2, 3, 4]);
        let header = store.read_header().unwrap();
        assert_eq!(header.internal_cursor, 3);
        assert_eq!(header.page_count, 5);
    }

    #[test]
    fn test_zero_reservation() {
        let (_dir, store) = setup(0);
        let p = FreeListManager::allocate_page(&store, NodeKind::Internal).unwrap();
        assert_eq!(p.get(), 1);
        assert_eq!(store.read_header().unwrap().internal_cursor, 1);
    }

    #[test]
    fn test_free_then_reuse_same_kind() {
        let (_dir, store) = setup(4);
        let a = FreeListManager::allocate_page(&store, NodeKind::Leaf).unwrap();
        store.write_node(a, &leaf()).unwrap();

        FreeListManager::free_page(&store, a).unwrap();
        assert_eq!(store.read_header().unwrap().free_head(NodeKind::Leaf), Some(a));
        assert_eq!(store.page_kind(a).unwrap(), None);

        // an internal allocation does not take the freed leaf page
        let i = FreeListManager::allocate_page(&store, NodeKind::Internal).unwrap();
        assert_ne!(i, a);

        let again = FreeListManager::allocate_page(&store, NodeKind::Leaf).unwrap();
        assert_eq!(again, a);
        assert_eq!(store.read_header().unwrap().free_head(NodeKind::Leaf), None);
    }

    #[test]
    fn test_free_list_is_lifo_per_kind() {
        let (_dir, store) = setup(4);
        let i1 = FreeListManager::allocate_page(&store, NodeKind::Internal).unwrap();
        let i2 = FreeListManager::allocate_page(&store, NodeKind::Internal).unwrap();
        let l1 = FreeListManager::allocate_page(&store, NodeKind::Leaf).unwrap();
        for p in [i1, i2] {
            store
                .write_node(p, &Node::Internal(InternalNode::new(None, l1)))
                .unwrap();
        }
        store.write_node(l1, &leaf()).unwrap();

        FreeListManager::free_page(&store, i1).unwrap();
        FreeListManager::free_page(&store, l1).unwrap();
        FreeListManager::free_page(&store, i2).unwrap();

        assert_eq!(
            FreeListManager::free_chain(&store, NodeKind::Internal).unwrap(),
            vec![i2, i1]
        );
        assert_eq!(
            FreeListManager::free_chain(&store, NodeKind::Leaf).unwrap(),
            vec![l1]
        );
        assert_eq!(
            FreeListManager::allocate_page(&store, NodeKind::Internal).unwrap(),
            i2
        );
    }

    #[test]
    fn test_free_non_node_page_fails() {
        let (_dir, store) = setup(4);
        let a = FreeListManager::allocate_page(&store, NodeKind::Leaf).unwrap();
        store.write_node(a, &leaf()).unwrap();
        FreeListManager::free_page(&store, a).unwrap();

        // already free: tag no longer names a node
        assert!(matches!(
            FreeListManager::free_page(&store, a),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn test_free_chain_detects_cycle() {
        let (_dir, store) = setup(4);
        let a = PageNum::new(5).unwrap();
        store.write_free_page(a, &FreePage::new(Some(a))).unwrap();
        let mut header = store.read_header().unwrap();
        header.set_free_head(NodeKind::Leaf, Some(a));
        header.page_count = 6;
        store.write_header(&header).unwrap();

        assert!(FreeListManager::free_chain(&store, NodeKind::Leaf).is_err());
    }
}
