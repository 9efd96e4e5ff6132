//! Page store over a single backing file.
//!
//! Every call addresses exactly one page: one seek plus one read or write.
//! Nothing is cached; the tree re-reads what it needs on every operation.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::constants::{HEADER_PAGE, PAGE_SIZE};
use crate::errors::{StoreError, StoreResult};
use crate::page::{probe_kind, FileHeader, FreePage, Node, PageBuf};
use crate::types::{NodeKind, PageNum};

/// Reads and writes fixed-size pages by page number.
pub struct PageStore {
    file: Mutex<File>,
    path: PathBuf,
    sync_writes: bool,
}

impl PageStore {
    /// Opens `path` for read/write, creating an empty file if it is missing.
    /// Returns the store and whether the file was empty.
    pub fn open_or_create(path: &Path, sync_writes: bool) -> StoreResult<(Self, bool)> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let is_new = file.metadata()?.len() == 0;

        Ok((
            Self {
                file: Mutex::new(file),
                path: path.to_path_buf(),
                sync_writes,
            },
            is_new,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads page `page_num`. Reading past the end of the file is an I/O error.
    pub fn read_page(&self, page_num: u64) -> StoreResult<PageBuf> {
        let mut buf = [0u8; PAGE_SIZE];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_offset(page_num)?))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Writes page `page_num`, extending the file if needed.
    pub fn write_page(&self, page_num: u64, buf: &PageBuf) -> StoreResult<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_offset(page_num)?))?;
        file.write_all(buf)?;
        if self.sync_writes {
            file.sync_all()?;
        }
        Ok(())
    }

    pub fn read_header(&self) -> StoreResult<FileHeader> {
        FileHeader::decode(&self.read_page(HEADER_PAGE)?)
    }

    pub fn write_header(&self, header: &FileHeader) -> StoreResult<()> {
        self.write_page(HEADER_PAGE, &header.encode()?)
    }

    /// Reads a SINGLE node (one seek + one read).
    pub fn read_node(&self, page: PageNum) -> StoreResult<Node> {
        Node::decode(page, &self.read_page(page.get())?)
    }

    pub fn write_node(&self, page: PageNum, node: &Node) -> StoreResult<()> {
        self.write_page(page.get(), &node.encode()?)
    }

    pub fn read_free_page(&self, page: PageNum) -> StoreResult<FreePage> {
        FreePage::decode(&self.read_page(page.get())?)
    }

    pub fn write_free_page(&self, page: PageNum, free: &FreePage) -> StoreResult<()> {
        self.write_page(page.get(), &free.encode()?)
    }

    /// Kind tag of a page, `None` when it does not hold a node.
    pub fn page_kind(&self, page: PageNum) -> StoreResult<Option<NodeKind>> {
        Ok(probe_kind(&self.read_page(page.get())?))
    }

    /// Number of whole pages currently in the file.
    pub fn page_span(&self) -> StoreResult<u64> {
        let len = self.file.lock().metadata()?.len();
        Ok(len / PAGE_SIZE as u64)
    }

    /// Sync file to disk
    pub fn sync(&self) -> StoreResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    /// Reads a node that must be a leaf.
    pub(crate) fn read_leaf(&self, page: PageNum) -> StoreResult<crate::page::LeafNode> {
        match self.read_node(page)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(StoreError::Corrupted(format!(
                "page {} expected leaf, found internal node",
                page
            ))),
        }
    }

    /// Reads a node that must be internal.
    pub(crate) fn read_internal(&self, page: PageNum) -> StoreResult<crate::page::InternalNode> {
        match self.read_node(page)? {
            Node::Internal(internal) => Ok(internal),
            Node::Leaf(_) => Err(StoreError::Corrupted(format!(
                "page {} expected internal node, found leaf",
                page
            ))),
        }
    }
}

/// Byte offset of page `page_num` in the backing file.
fn page_offset(page_num: u64) -> StoreResult<u64> {
    page_num.checked_mul(PAGE_SIZE as u64).ok_or_else(|| {
        StoreError::Corrupted(format!("page {} lies beyond any file offset", page_num))
    })
}
