//! Export of live state into a fresh file.
//!
//! The compactor writes a header and one commit holding every live
//! key/value pair. History is not carried over: the new commit's previous
//! checkpoint is 0.
//!
//! ## Invariants
//!
//! - Compaction **MUST NOT** change logical state
//! - The source store and its file are never modified
//! - The target path only ever holds a complete file (write, sync, rename)

use crate::error::{CoreError, CoreResult};
use crate::index::Index;
use crate::log::{Header, LogWriter, Mutation, HEADER_SIZE};
use crate::types::Checkpoint;
use chainstore_storage::{FileAccess, FileBackend, StorageBackend};
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionResult {
    /// Checkpoint of the single commit in the new file.
    pub checkpoint: Checkpoint,
    /// Number of entries written.
    pub entries: usize,
    /// Size of the new file in bytes.
    pub bytes_written: u64,
}

/// Writes the live contents of an index to a new store file.
pub struct Compactor {
    page_size: u32,
}

impl Compactor {
    /// Creates a compactor producing files with the given page size.
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self { page_size }
    }

    /// Writes `index` to `path`, replacing any existing file.
    ///
    /// The file is built at `<path>.tmp`, synced, then renamed over
    /// `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if any file operation fails; `path` is left
    /// untouched in that case.
    pub fn export(&self, index: &Index, path: &Path) -> CoreResult<CompactionResult> {
        let temp_path = temp_path_for(path);
        FileBackend::delete(&temp_path)?;

        let result = self.write_file(index, &temp_path);
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                if let Err(cleanup) = FileBackend::delete(&temp_path) {
                    warn!(
                        path = %temp_path.display(),
                        error = %cleanup,
                        "failed to remove partial export"
                    );
                }
                return Err(err);
            }
        };

        fs::rename(&temp_path, path)?;
        sync_parent_directory(path)?;

        info!(
            path = %path.display(),
            checkpoint = %result.checkpoint,
            entries = result.entries,
            bytes = result.bytes_written,
            "store exported"
        );
        Ok(result)
    }

    fn write_file(&self, index: &Index, path: &Path) -> CoreResult<CompactionResult> {
        let mut backend = FileBackend::open_with(path, FileAccess::Create)?;
        backend.append(&Header::new(self.page_size).encode())?;

        let mutations: Vec<Mutation> = index
            .iter()
            .map(|(key, value)| Mutation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            })
            .collect();
        let entries = mutations.len();

        let mut writer = LogWriter::new(
            Box::new(backend),
            self.page_size,
            true,
            HEADER_SIZE as u64,
            Checkpoint::NONE,
        );
        let checkpoint = writer.append_commit(&mutations)?;
        let bytes_written = writer.backend().size()?;

        Ok(CompactionResult {
            checkpoint,
            entries,
            bytes_written,
        })
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Makes the rename durable.
#[cfg(unix)]
fn sync_parent_directory(path: &Path) -> CoreResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_directory(_path: &Path) -> CoreResult<()> {
    // NTFS journals metadata updates
    Ok(())
}

impl From<CompactionResult> for Checkpoint {
    fn from(result: CompactionResult) -> Self {
        result.checkpoint
    }
}

/// Rejects exporting a store onto its own file.
pub(crate) fn ensure_distinct(source: Option<&Path>, target: &Path) -> CoreResult<()> {
    let Some(source) = source else {
        return Ok(());
    };
    let same = match (fs::canonicalize(source), fs::canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => source == target,
    };
    if same {
        return Err(CoreError::invalid_argument(
            "cannot export a store onto its own file",
        ));
    }
    Ok(())
}
