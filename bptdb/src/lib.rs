//! # bptdb - Disk-Backed B+ Tree Key-Value Store
//!
//! A single-table store mapping `i64` keys to fixed 120-byte values, kept in
//! a B+ tree whose nodes are 4096-byte pages of one file.
//!
//! ## Features
//!
//! - **Paged Storage**: every node is one page, read and written on demand
//! - **No Cache**: each operation touches only the pages on its path
//! - **Page Reuse**: freed pages go to per-kind free lists tracked in the header
//! - **Range Scans**: one descent, then a walk along the leaf sibling chain
//! - **Integrity Check**: structural validation of the whole file
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bptdb::{BPlusTree, Value};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tree = BPlusTree::open("/tmp/bptdb-example.db")?;
//!
//! tree.insert(42, Value::try_from("answer")?)?;
//! let value = tree.find(42)?;
//! assert_eq!(value.map(|v| v.to_string_lossy()), Some("answer".to_string()));
//!
//! for entry in tree.find_range(0, 100)? {
//!     println!("{} -> {:?} at {:?}", entry.key, entry.value, entry.location);
//! }
//!
//! tree.delete(42)?;
//! tree.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use bptdb::BPlusTree;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tree = BPlusTree::with_config()
//!     .leaf_capacity(8)
//!     .internal_capacity(8)
//!     .sync_writes(false)
//!     .open("/tmp/bptdb-small.db")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Durability
//!
//! Each page write is atomic on its own. An insert or delete that splits or
//! merges nodes writes several pages, so a crash part-way through can leave
//! the file inconsistent; [`BPlusTree::check_integrity`] reports such damage.

pub mod config;
pub mod constants;
pub mod errors;
pub mod free_list;
pub mod page;
pub mod storage;
pub mod tree;
pub mod types;

pub use config::{StoreBuilder, StoreConfig};
pub use constants::{INTERNAL_CAPACITY, LEAF_CAPACITY, PAGE_SIZE, VALUE_SIZE};
pub use errors::{StoreError, StoreResult};
pub use free_list::FreeListManager;
pub use page::{FileHeader, FreePage, InternalNode, LeafNode, Node};
pub use storage::PageStore;
pub use tree::{BPlusTree, IntegrityReport, NodeSummary};
pub use types::{Entry, NodeKind, PageNum, Record, RecordLocation, RangeEntry, Value};
