//! Error types for chainstore core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in chainstore core operations.
///
/// A damaged but recoverable file is not an error: the store opens and
/// reports the damage through [`Store::is_damaged`](crate::Store::is_damaged).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] chainstore_storage::StorageError),

    /// Document codec error.
    #[error("codec error: {0}")]
    Codec(#[from] chainstore_codec::CodecError),

    /// I/O error outside the storage backend (rename, remove).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file cannot be interpreted: bad header, no valid commit, or
    /// undecodable content inside a checksum-valid commit.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A snapshot was requested at a checkpoint the log never reached.
    #[error("checkpoint {checkpoint:#x} not found in log")]
    CheckpointNotFound {
        /// The requested checkpoint.
        checkpoint: u64,
    },

    /// A write was attempted on a read-only store or snapshot.
    #[error("store is read-only")]
    ReadOnly,

    /// Another handle holds the file lock.
    #[error("store locked: another handle has exclusive access")]
    DatabaseLocked,

    /// Strict insert of a key that is already live.
    #[error("key already exists: {key}")]
    KeyExists {
        /// The key, lossily rendered as UTF-8.
        key: String,
    },

    /// An argument was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a key exists error.
    pub fn key_exists(key: &[u8]) -> Self {
        Self::KeyExists {
            key: String::from_utf8_lossy(key).into_owned(),
        }
    }

    /// Returns `true` if the file could not be opened because its format
    /// is unusable. No store state is available in that case.
    #[must_use]
    pub fn is_fatal_format(&self) -> bool {
        matches!(self, Self::InvalidFormat { .. })
    }
}
