//! Store configuration.

use crate::error::{CoreError, CoreResult};

/// Smallest accepted non-zero page size.
pub const MIN_PAGE_SIZE: u32 = 64;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 1024 * 1024;

/// How a store file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Read/write; a missing or empty file is initialised.
    CreateAndWrite,
    /// Read/write; the file must already exist.
    Write,
    /// Read-only; the file must already exist.
    ReadOnly,
}

impl OpenMode {
    /// Returns `true` if stores opened in this mode accept commits.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to sync (data and metadata) after every commit. When off,
    /// commits are only flushed to the OS.
    pub sync_on_commit: bool,

    /// Commit frames are zero-padded so every checkpoint lands on a
    /// multiple of this size. 0 disables padding.
    ///
    /// Only used when a new file is created; existing files keep the page
    /// size recorded in their header.
    pub page_size: u32,

    /// Whether replay decodes every stored value.
    pub verify_values: bool,

    /// Whether to take an advisory lock on the store file.
    pub lock_file: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
            page_size: 4096,
            verify_values: true,
            lock_file: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to sync on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the page size for new files.
    #[must_use]
    pub const fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Sets whether replay decodes stored values.
    #[must_use]
    pub const fn verify_values(mut self, value: bool) -> Self {
        self.verify_values = value;
        self
    }

    /// Sets whether to lock the store file.
    #[must_use]
    pub const fn lock_file(mut self, value: bool) -> Self {
        self.lock_file = value;
        self
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the page size is not 0 or a power of
    /// two between [`MIN_PAGE_SIZE`] and [`MAX_PAGE_SIZE`].
    pub fn validate(&self) -> CoreResult<()> {
        check_page_size(self.page_size).map_err(CoreError::invalid_argument)
    }
}

/// Returns a description of what is wrong with `page_size`, if anything.
pub(crate) fn check_page_size(page_size: u32) -> Result<(), String> {
    if page_size == 0
        || (page_size.is_power_of_two() && (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size))
    {
        Ok(())
    } else {
        Err(format!(
            "page size {page_size} must be 0 or a power of two in {MIN_PAGE_SIZE}..={MAX_PAGE_SIZE}"
        ))
    }
}
