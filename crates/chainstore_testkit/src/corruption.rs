//! Corruption and crash simulation.
//!
//! File helpers damage a store file the way a torn write or bit rot
//! would. [`FaultyBackend`] fails writes on demand, so tests can check
//! that a failed commit never leaves a valid-looking chain behind.

use chainstore_storage::{StorageBackend, StorageError, StorageResult};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Inverts every bit of the byte at `offset`.
pub fn flip_byte(path: &Path, offset: u64) -> io::Result<()> {
    let mut data = fs::read(path)?;
    let index = usize::try_from(offset)
        .ok()
        .filter(|&i| i < data.len())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "offset past end of file"))?;
    data[index] ^= 0xff;
    fs::write(path, data)
}

/// Damages the first byte of the file (inside the header magic).
pub fn corrupt_first_byte(path: &Path) -> io::Result<()> {
    flip_byte(path, 0)
}

/// Damages the last byte of the file (inside the last trailer).
pub fn corrupt_last_byte(path: &Path) -> io::Result<()> {
    let len = fs::metadata(path)?.len();
    if len == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty file"));
    }
    flip_byte(path, len - 1)
}

/// Appends `bytes` to the end of the file.
pub fn append_garbage(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Cuts the file down to `len` bytes.
pub fn truncate_file(path: &Path, len: u64) -> io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(len)
}

/// Returns the file size.
pub fn file_len(path: &Path) -> io::Result<u64> {
    Ok(fs::metadata(path)?.len())
}

/// Shared switches controlling a [`FaultyBackend`].
#[derive(Debug)]
pub struct FaultPlan {
    fail_append_after: AtomicU64,
    appended: AtomicU64,
    fail_sync: AtomicBool,
    fail_truncate: AtomicBool,
    tripped: AtomicBool,
}

impl FaultPlan {
    fn new() -> Self {
        Self {
            fail_append_after: AtomicU64::new(u64::MAX),
            appended: AtomicU64::new(0),
            fail_sync: AtomicBool::new(false),
            fail_truncate: AtomicBool::new(false),
            tripped: AtomicBool::new(false),
        }
    }

    /// Fails the append that would take the byte count past `bytes`;
    /// the bytes before that point are still written.
    pub fn fail_append_after(&self, bytes: u64) {
        self.appended.store(0, Ordering::SeqCst);
        self.fail_append_after.store(bytes, Ordering::SeqCst);
    }

    /// Makes `flush` and `sync` fail.
    pub fn set_fail_sync(&self, fail: bool) {
        self.fail_sync.store(fail, Ordering::SeqCst);
    }

    /// Makes `truncate` fail, so a failed commit cannot be rolled back.
    pub fn set_fail_truncate(&self, fail: bool) {
        self.fail_truncate.store(fail, Ordering::SeqCst);
    }

    /// Clears every fault.
    pub fn reset(&self) {
        self.fail_append_after.store(u64::MAX, Ordering::SeqCst);
        self.appended.store(0, Ordering::SeqCst);
        self.fail_sync.store(false, Ordering::SeqCst);
        self.fail_truncate.store(false, Ordering::SeqCst);
        self.tripped.store(false, Ordering::SeqCst);
    }

    /// Returns `true` once any fault has fired.
    pub fn has_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    fn trip(&self, what: &str) -> StorageError {
        self.tripped.store(true, Ordering::SeqCst);
        StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("simulated failure during {what}"),
        ))
    }
}

/// A storage backend wrapper that fails on demand.
pub struct FaultyBackend {
    inner: Box<dyn StorageBackend>,
    plan: Arc<FaultPlan>,
}

impl FaultyBackend {
    /// Wraps `inner`, returning the backend and the switches driving it.
    pub fn new(inner: Box<dyn StorageBackend>) -> (Self, Arc<FaultPlan>) {
        let plan = Arc::new(FaultPlan::new());
        let backend = Self {
            inner,
            plan: Arc::clone(&plan),
        };
        (backend, plan)
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let limit = self.plan.fail_append_after.load(Ordering::SeqCst);
        let before = self.plan.appended.load(Ordering::SeqCst);
        let len = data.len() as u64;

        if before.saturating_add(len) > limit {
            let partial = usize::try_from(limit.saturating_sub(before)).unwrap_or(data.len());
            if partial > 0 {
                self.inner.append(&data[..partial])?;
            }
            self.plan.appended.store(limit, Ordering::SeqCst);
            return Err(self.plan.trip("append"));
        }

        self.plan.appended.store(before + len, Ordering::SeqCst);
        self.inner.append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.plan.fail_sync.load(Ordering::SeqCst) {
            return Err(self.plan.trip("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.plan.fail_sync.load(Ordering::SeqCst) {
            return Err(self.plan.trip("sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.plan.fail_truncate.load(Ordering::SeqCst) {
            return Err(self.plan.trip("truncate"));
        }
        self.inner.truncate(new_size)
    }

    fn is_read_only(&self) -> bool {
        self.inner.is_read_only()
    }
}
