//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Ephemeral stores that don't need persistence
///
/// Handles created with [`InMemoryBackend::share`] see the same bytes,
/// which lets a test close a store and "reopen" it from the same data.
///
/// # Example
///
/// ```rust
/// use chainstore_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let offset = backend.append(b"test data").unwrap();
/// assert_eq!(offset, 0);
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
    read_only: bool,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            read_only: false,
        }
    }

    /// Returns another writable handle onto the same bytes.
    #[must_use]
    pub fn share(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            read_only: false,
        }
    }

    /// Returns a read-only handle onto the same bytes.
    #[must_use]
    pub fn share_read_only(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            read_only: true,
        }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Overwrites the byte at `offset`, bypassing the append-only API.
    ///
    /// Used by tests to simulate corruption.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`] if `offset` is out of range.
    pub fn poke(&self, offset: u64, byte: u8) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        let slot = usize::try_from(offset)
            .ok()
            .and_then(|i| data.get_mut(i))
            .ok_or(StorageError::ReadPastEnd {
                offset,
                len: 1,
                size,
            })?;
        *slot = byte;
        Ok(())
    }

    fn ensure_writable(&self) -> StorageResult<()> {
        if self.read_only {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        let start = offset as usize;
        Ok(data[start..start + len].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        self.ensure_writable()?;
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        // In-memory backend has no pending writes
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.ensure_writable()?;
        let mut data = self.data.write();
        let size = data.len() as u64;

        if new_size > size {
            return Err(StorageError::TruncatePastEnd { new_size, size });
        }

        data.truncate(new_size as usize);
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
