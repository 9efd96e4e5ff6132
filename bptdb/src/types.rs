//! Core value types: page numbers, node kinds, fixed-size values and records.

use std::fmt::{Display, Formatter};
use std::num::NonZeroU64;

use crate::constants::VALUE_SIZE;
use crate::errors::{StoreError, StoreResult};

/// Page number of a node page.
///
/// Page 0 holds the header and doubles as the null link on disk, so a
/// `PageNum` is never zero. A missing link is `Option<PageNum>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageNum(NonZeroU64);

impl PageNum {
    /// Wraps a raw page number; `None` for the null page.
    pub fn new(raw: u64) -> Option<PageNum> {
        NonZeroU64::new(raw).map(PageNum)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Raw on-disk form of an optional link.
    pub fn raw(page: Option<PageNum>) -> u64 {
        page.map_or(0, PageNum::get)
    }
}

impl Display for PageNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node kinds, one free list each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Internal,
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Leaf => write!(f, "leaf"),
            NodeKind::Internal => write!(f, "internal"),
        }
    }
}

/// A fixed-length value. Shorter inputs are zero padded.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Value([u8; VALUE_SIZE]);

impl Value {
    /// Builds a value from at most `VALUE_SIZE` bytes.
    pub fn new(bytes: &[u8]) -> StoreResult<Value> {
        if bytes.len() > VALUE_SIZE {
            return Err(StoreError::ValueTooLarge { len: bytes.len() });
        }
        let mut buf = [0u8; VALUE_SIZE];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Value(buf))
    }

    pub fn from_array(bytes: [u8; VALUE_SIZE]) -> Value {
        Value(bytes)
    }

    pub fn zeroed() -> Value {
        Value([0u8; VALUE_SIZE])
    }

    /// All `VALUE_SIZE` bytes, padding included.
    pub fn as_bytes(&self) -> &[u8; VALUE_SIZE] {
        &self.0
    }

    /// The bytes with trailing zero padding removed.
    pub fn trimmed(&self) -> &[u8] {
        let end = self.0.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        &self.0[..end]
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.trimmed()).into_owned()
    }
}

impl TryFrom<&[u8]> for Value {
    type Error = StoreError;

    fn try_from(bytes: &[u8]) -> StoreResult<Value> {
        Value::new(bytes)
    }
}

impl TryFrom<&str> for Value {
    type Error = StoreError;

    fn try_from(s: &str) -> StoreResult<Value> {
        Value::new(s.as_bytes())
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Value({:?})", self.to_string_lossy())
    }
}

/// A key-value record stored in a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub key: i64,
    pub value: Value,
}

/// A routing entry in an internal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub key: i64,
    pub child: PageNum,
}

/// Where a record lives: leaf page and slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    pub page: PageNum,
    pub slot: usize,
}

/// One result of a range scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEntry {
    pub key: i64,
    pub value: Value,
    pub location: RecordLocation,
}

/// `ceil(n / 2)`: split point and occupancy arithmetic.
pub fn cut(n: usize) -> usize {
    n.div_ceil(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_num_null() {
        assert!(PageNum::new(0).is_none());
        let p = PageNum::new(7).unwrap();
        assert_eq!(p.get(), 7);
        assert_eq!(PageNum::raw(Some(p)), 7);
        assert_eq!(PageNum::raw(None), 0);
    }

    #[test]
    fn test_option_page_num_is_word_sized() {
        assert_eq!(std::mem::size_of::<Option<PageNum>>(), 8);
    }

    #[test]
    fn test_value_padding() {
        let v = Value::try_from("hello").unwrap();
        assert_eq!(v.trimmed(), b"hello");
        assert_eq!(v.as_bytes().len(), VALUE_SIZE);
        assert!(v.as_bytes()[5..].iter().all(|b| *b == 0));
        assert_eq!(v.to_string_lossy(), "hello");
    }

    #[test]
    fn test_value_full_length() {
        let bytes = [b'x'; VALUE_SIZE];
        let v = Value::new(&bytes).unwrap();
        assert_eq!(v.trimmed().len(), VALUE_SIZE);
    }

    #[test]
    fn test_value_too_large() {
        let bytes = [1u8; VALUE_SIZE + 1];
        match Value::new(&bytes) {
            Err(StoreError::ValueTooLarge { len }) => assert_eq!(len, VALUE_SIZE + 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cut() {
        assert_eq!(cut(31), 16);
        assert_eq!(cut(30), 15);
        assert_eq!(cut(249), 125);
        assert_eq!(cut(248), 124);
        assert_eq!(cut(0), 0);
    }
}
