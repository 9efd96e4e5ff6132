//! Error and result types for the store.

use std::io;
use thiserror::Error;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Key {0} already exists")]
    DuplicateKey(i64),

    #[error("Key {0} not found")]
    KeyNotFound(i64),

    #[error("Value of {len} bytes exceeds the fixed value size")]
    ValueTooLarge { len: usize },

    #[error("Tree corrupted: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// True for failures that leave the file untouched and are expected in
    /// normal use (duplicate insert, missing key, oversized value).
    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateKey(_)
                | StoreError::KeyNotFound(_)
                | StoreError::ValueTooLarge { .. }
        )
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
