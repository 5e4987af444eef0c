//! Test fixtures and store helpers.
//!
//! Provides temporary store files and in-memory stores with a small page
//! size, so tests produce compact files.

use chainstore_core::{Config, CoreResult, OpenMode, Store};
use chainstore_storage::InMemoryBackend;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Page size used by test stores.
pub const TEST_PAGE_SIZE: u32 = 256;

/// Configuration used by test stores.
#[must_use]
pub fn test_config() -> Config {
    Config::new().page_size(TEST_PAGE_SIZE)
}

/// A store file in a temporary directory, removed on drop.
pub struct TempStore {
    dir: TempDir,
    path: PathBuf,
}

impl TempStore {
    /// Creates a temporary directory holding `test.chain` (not yet created).
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("test.chain");
        Self { dir, path }
    }

    /// Path of the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of another file in the same temporary directory.
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Creates (or opens) the store for writing.
    pub fn create(&self) -> Store {
        Store::open_with_config(&self.path, OpenMode::CreateAndWrite, test_config())
            .expect("Failed to create store")
    }

    /// Opens the store file with `mode`.
    pub fn open(&self, mode: OpenMode) -> CoreResult<Store> {
        Store::open_with_config(&self.path, mode, test_config())
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory store plus a handle on its bytes.
///
/// Reopening shares the same bytes, so tests can inspect and damage what
/// the store wrote.
pub struct MemoryStore {
    /// Shared handle on the store's bytes.
    pub backend: InMemoryBackend,
}

impl MemoryStore {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self {
            backend: InMemoryBackend::new(),
        }
    }

    /// Opens a store over the shared bytes.
    pub fn open(&self, mode: OpenMode) -> CoreResult<Store> {
        let backend = match mode {
            OpenMode::ReadOnly => self.backend.share_read_only(),
            _ => self.backend.share(),
        };
        Store::open_with_backend(Box::new(backend), mode, test_config())
    }

    /// Opens the store for writing, initialising it if empty.
    pub fn create(&self) -> Store {
        self.open(OpenMode::CreateAndWrite)
            .expect("Failed to open in-memory store")
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a temporary file-backed store.
///
/// The closure receives the open store and the fixture, so it can drop
/// the store and reopen the file.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(Store, &TempStore) -> R,
{
    let temp = TempStore::new();
    let store = temp.create();
    f(store, &temp)
}
