//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// How a [`FileBackend`] opens its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    /// Read/write, creating the file if it does not exist.
    Create,
    /// Read/write, the file must already exist.
    ReadWrite,
    /// Read-only, the file must already exist.
    ReadOnly,
}

impl FileAccess {
    /// Returns `true` if this access mode permits writes.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// A file-based storage backend.
///
/// This backend provides persistent storage using OS file APIs.
/// Data survives process restarts.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Locking
///
/// [`FileBackend::try_lock`] takes an advisory lock on the file itself.
/// The lock is released when the backend is dropped.
///
/// # Example
///
/// ```no_run
/// use chainstore_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("data.bin")).unwrap();
/// let offset = backend.append(b"persistent data").unwrap();
/// backend.sync().unwrap();  // Ensure data is durable
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    access: FileAccess,
    file: RwLock<File>,
    size: RwLock<u64>,
}

impl FileBackend {
    /// Opens or creates a read/write file backend at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with(path, FileAccess::Create)
    }

    /// Opens a file backend with the given access mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened. A missing file with
    /// [`FileAccess::ReadWrite`] or [`FileAccess::ReadOnly`] is reported as
    /// an I/O `NotFound` error.
    pub fn open_with(path: &Path, access: FileAccess) -> StorageResult<Self> {
        let file = match access {
            FileAccess::Create => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)?,
            FileAccess::ReadWrite => OpenOptions::new().read(true).write(true).open(path)?,
            FileAccess::ReadOnly => OpenOptions::new().read(true).open(path)?,
        };

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            access,
            file: RwLock::new(file),
            size: RwLock::new(size),
        })
    }

    /// Deletes the file at `path`.
    ///
    /// Deleting a file that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn delete(path: &Path) -> StorageResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Tries to take an advisory lock on the file without blocking.
    ///
    /// An exclusive lock excludes every other lock; a shared lock only
    /// excludes exclusive ones.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another handle holds a
    /// conflicting lock, or an I/O error.
    pub fn try_lock(&self, exclusive: bool) -> StorageResult<()> {
        let file = self.file.read();
        let result = if exclusive {
            FileExt::try_lock_exclusive(&*file)
        } else {
            FileExt::try_lock_shared(&*file)
        };
        result.map_err(|e| {
            if e.kind() == fs2::lock_contended_error().kind() {
                StorageError::Locked
            } else {
                StorageError::Io(e)
            }
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the access mode the file was opened with.
    #[must_use]
    pub fn access(&self) -> FileAccess {
        self.access
    }

    fn ensure_writable(&self) -> StorageResult<()> {
        if self.access.is_writable() {
            Ok(())
        } else {
            Err(StorageError::ReadOnly)
        }
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.ensure_writable()?;
        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if !self.access.is_writable() {
            return Ok(());
        }
        let mut file = self.file.write();
        file.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        if !self.access.is_writable() {
            return Ok(());
        }
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.ensure_writable()?;
        let file = self.file.write();
        let mut size = self.size.write();

        if new_size > *size {
            return Err(StorageError::TruncatePastEnd {
                new_size,
                size: *size,
            });
        }

        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;

        Ok(())
    }

    fn is_read_only(&self) -> bool {
        !self.access.is_writable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn file_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let mut backend = FileBackend::open(&path).unwrap();

        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.size().unwrap(), 11);

        let data = backend.read_at(0, 11).unwrap();
        assert_eq!(&data, b"hello world");
    }

    #[test]
    fn file_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"hello").unwrap();

        let result = backend.read_at(3, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"persistent data").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open_with(&path, FileAccess::ReadOnly).unwrap();
        assert_eq!(backend.size().unwrap(), 15);
        assert_eq!(backend.read_at(0, 15).unwrap(), b"persistent data");
    }

    #[test]
    fn read_write_requires_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        let err = FileBackend::open_with(&path, FileAccess::ReadWrite).unwrap_err();
        assert!(err.is_not_found());
        assert!(!path.exists());
    }

    #[test]
    fn read_only_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");
        FileBackend::open(&path).unwrap().append(b"abc").unwrap();

        let mut backend = FileBackend::open_with(&path, FileAccess::ReadOnly).unwrap();
        assert!(backend.is_read_only());
        assert!(matches!(backend.append(b"x"), Err(StorageError::ReadOnly)));
        assert!(matches!(backend.truncate(0), Err(StorageError::ReadOnly)));
        assert!(backend.flush().is_ok());
    }

    #[test]
    fn append_after_truncate_overwrites_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"hello garbage").unwrap();
        backend.truncate(5).unwrap();
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.read_at(0, 11).unwrap(), b"hello world");
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 11);
    }

    #[test]
    fn truncate_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"hello").unwrap();
        assert!(matches!(
            backend.truncate(100),
            Err(StorageError::TruncatePastEnd { .. })
        ));
    }

    #[test]
    fn exclusive_lock_conflicts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");

        let first = FileBackend::open(&path).unwrap();
        first.try_lock(true).unwrap();

        let second = FileBackend::open(&path).unwrap();
        assert!(matches!(second.try_lock(true), Err(StorageError::Locked)));
        assert!(matches!(second.try_lock(false), Err(StorageError::Locked)));

        drop(first);
        assert!(second.try_lock(true).is_ok());
    }

    #[test]
    fn shared_locks_coexist_but_block_writers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");
        FileBackend::open(&path).unwrap();

        let reader_a = FileBackend::open_with(&path, FileAccess::ReadOnly).unwrap();
        let reader_b = FileBackend::open_with(&path, FileAccess::ReadOnly).unwrap();
        reader_a.try_lock(false).unwrap();
        reader_b.try_lock(false).unwrap();

        let writer = FileBackend::open_with(&path, FileAccess::ReadWrite).unwrap();
        assert!(matches!(writer.try_lock(true), Err(StorageError::Locked)));

        drop(reader_a);
        drop(reader_b);
        assert!(writer.try_lock(true).is_ok());
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.bin");
        FileBackend::open(&path).unwrap();

        FileBackend::delete(&path).unwrap();
        assert!(!path.exists());
        // Deleting again is harmless.
        FileBackend::delete(&path).unwrap();
    }
}
