//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// Attempted to truncate to a size larger than the storage.
    #[error("cannot truncate to {new_size} bytes, storage is only {size} bytes")]
    TruncatePastEnd {
        /// The requested size.
        new_size: u64,
        /// The current storage size.
        size: u64,
    },

    /// A write was attempted on a read-only backend.
    #[error("storage is read-only")]
    ReadOnly,

    /// The file is locked by another handle.
    #[error("file is locked by another handle")]
    Locked,
}

impl StorageError {
    /// Returns `true` if this error means the target path does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}
