//! Constants for the on-disk page format.

/// Size of every page in the backing file.
pub const PAGE_SIZE: usize = 4096;

/// Fixed length of a stored value.
pub const VALUE_SIZE: usize = 120;

/// Maximum number of records in a leaf page.
pub const LEAF_CAPACITY: usize = 31;

/// Maximum number of (key, child) entries in an internal page.
pub const INTERNAL_CAPACITY: usize = 248;

/// Smallest node capacity that keeps split and merge arithmetic sound.
pub const MIN_CAPACITY: usize = 3;

/// Page number of the header page. Never a valid node.
pub const HEADER_PAGE: u64 = 0;

/// Number of low page numbers reserved for internal nodes in a new file.
pub const DEFAULT_INTERNAL_RESERVATION: u64 = 128;

/// Largest page number whose byte offset fits in a `u64`.
pub const MAX_PAGE_NUM: u64 = u64::MAX / PAGE_SIZE as u64;

/// Largest reservation that still leaves an addressable page for the first leaf.
pub const MAX_INTERNAL_RESERVATION: u64 = MAX_PAGE_NUM - 1;

/// Magic number for file format identification
pub const MAGIC: u32 = 0x4250_5444; // "BPTD"

/// File format version
pub const VERSION: u32 = 1;

// Node page layout, shared by leaf and internal pages.
pub(crate) const PARENT_OFFSET: usize = 0;
pub(crate) const KIND_OFFSET: usize = 8;
pub(crate) const KEY_COUNT_OFFSET: usize = 12;
pub(crate) const LINK_OFFSET: usize = 120;
pub(crate) const BODY_OFFSET: usize = 128;

pub(crate) const RECORD_SIZE: usize = 8 + VALUE_SIZE;
pub(crate) const ENTRY_SIZE: usize = 16;

/// Kind tag stored at `KIND_OFFSET` of a leaf page.
pub(crate) const LEAF_TAG: u32 = 1;
/// Kind tag stored at `KIND_OFFSET` of an internal page.
pub(crate) const INTERNAL_TAG: u32 = 2;

const _: () = assert!(BODY_OFFSET + LEAF_CAPACITY * RECORD_SIZE == PAGE_SIZE);
const _: () = assert!(BODY_OFFSET + INTERNAL_CAPACITY * ENTRY_SIZE == PAGE_SIZE);
