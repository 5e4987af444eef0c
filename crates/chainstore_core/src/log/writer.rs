//! Commit writer.

use crate::error::{CoreError, CoreResult};
use crate::log::format::encode_frame;
use crate::log::record::{encode_body, Mutation};
use crate::types::Checkpoint;
use chainstore_storage::StorageBackend;
use tracing::{debug, warn};

/// Appends commits to the log.
///
/// The writer owns the storage backend and remembers where the last valid
/// commit ends. Anything past that point (the unreadable tail of a
/// damaged file, or the remains of a failed append) is cut off before the
/// next commit is written, so the checkpoint chain stays contiguous.
pub struct LogWriter {
    /// Storage backend holding the log.
    backend: Box<dyn StorageBackend>,
    /// Checkpoint alignment from the header.
    page_size: u32,
    /// Whether to sync after each commit.
    sync_on_commit: bool,
    /// End offset of the last valid commit (or of the header).
    end: u64,
    /// Checkpoint of the last valid commit.
    last: Checkpoint,
}

impl LogWriter {
    /// Creates a writer that appends after `end`, chaining to `last`.
    pub fn new(
        backend: Box<dyn StorageBackend>,
        page_size: u32,
        sync_on_commit: bool,
        end: u64,
        last: Checkpoint,
    ) -> Self {
        Self {
            backend,
            page_size,
            sync_on_commit,
            end,
            last,
        }
    }

    /// Writes one commit holding `mutations` and makes it durable.
    ///
    /// The frame is appended in a single call and flushed (or synced)
    /// before returning. If either step fails the file is truncated back
    /// to its previous end, so a failed commit never leaves bytes that a
    /// later append could turn into a valid-looking chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit is too large or any I/O step fails.
    pub fn append_commit(&mut self, mutations: &[Mutation]) -> CoreResult<Checkpoint> {
        let body = encode_body(mutations)?;
        let (frame, checkpoint) = encode_frame(&body, self.end, self.last, self.page_size)?;

        let size = self.backend.size()?;
        if size < self.end {
            return Err(CoreError::invalid_operation(format!(
                "log shrank underneath the store: {size} bytes, expected at least {}",
                self.end
            )));
        }
        if size > self.end {
            warn!(
                valid_end = self.end,
                discarded = size - self.end,
                "truncating unreadable tail before append"
            );
            self.backend.truncate(self.end)?;
        }

        let written = self.backend.append(&frame).and_then(|_| {
            if self.sync_on_commit {
                self.backend.sync()
            } else {
                self.backend.flush()
            }
        });
        if let Err(err) = written {
            if let Err(rollback) = self.backend.truncate(self.end) {
                warn!(error = %rollback, "failed to roll back partial commit");
            }
            return Err(err.into());
        }

        debug!(
            checkpoint = %checkpoint,
            previous = %self.last,
            mutations = mutations.len(),
            bytes = frame.len(),
            "commit appended"
        );
        self.end = checkpoint.as_u64();
        self.last = checkpoint;
        Ok(checkpoint)
    }

    /// Returns the storage backend.
    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Returns the end offset of the last valid commit.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Returns the checkpoint of the last valid commit.
    pub fn last_checkpoint(&self) -> Checkpoint {
        self.last
    }

    /// Flushes the backend to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }
}
