//! Sequential replay of the commit log.
//!
//! Replay starts right after the header and validates one commit frame at
//! a time. A frame that is incomplete or fails validation ends replay at a
//! **fault boundary**: the bytes from there on are invisible to the
//! index. Whether that is survivable depends on what came before it:
//!
//! - Clean end of file at a commit boundary: not damaged.
//! - Fault after at least one valid commit: damaged, but the store opens
//!   at the last valid checkpoint.
//! - Fault before any valid commit: fatal, there is no state to return.
//!
//! A frame whose checksum is valid but whose body or values cannot be
//! decoded is fatal regardless of position: the bytes are exactly what a
//! writer produced, so the content itself is unsupported.

use crate::error::{CoreError, CoreResult};
use crate::index::Index;
use crate::log::format::{
    align_up, frame_crc, read_u32, Header, Trailer, COMMIT_MAGIC, COMMIT_PREFIX_SIZE, HEADER_SIZE,
    TRAILER_SIZE,
};
use crate::log::record::{decode_body, Mutation};
use crate::types::Checkpoint;
use chainstore_codec::from_cbor;
use chainstore_storage::StorageBackend;
use std::fmt;

/// Why replay stopped before the end of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultReason {
    /// Not enough bytes left for a complete frame.
    Truncated,
    /// The frame does not start with the commit magic.
    BadCommitMagic,
    /// The trailer magic is missing.
    BadTrailerMagic,
    /// The frame checksum does not match.
    ChecksumMismatch {
        /// Checksum stored in the trailer.
        expected: u32,
        /// Checksum computed over the frame.
        actual: u32,
    },
    /// The trailer's length or checkpoint disagrees with the frame's
    /// position in the file.
    CheckpointMismatch,
    /// The trailer does not link back to the preceding checkpoint.
    BrokenChain,
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => f.write_str("truncated commit"),
            Self::BadCommitMagic => f.write_str("bad commit magic"),
            Self::BadTrailerMagic => f.write_str("bad trailer magic"),
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected:08x}, got {actual:08x}")
            }
            Self::CheckpointMismatch => f.write_str("trailer checkpoint does not match position"),
            Self::BrokenChain => f.write_str("trailer does not link to previous checkpoint"),
        }
    }
}

/// Where and why replay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// Offset of the frame that failed validation.
    pub offset: u64,
    /// What was wrong with it.
    pub reason: FaultReason,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {:#x}", self.reason, self.offset)
    }
}

/// Outcome of the replay performed when a store was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Number of commits validated and applied.
    pub commits_applied: u64,
    /// End offset of the last applied commit (header end if none).
    pub valid_end: u64,
    /// File size seen by replay.
    pub file_size: u64,
    /// The fault that ended replay, if it did not reach a clean end.
    pub fault: Option<Fault>,
}

impl RecoveryReport {
    /// Returns `true` if replay stopped at a fault.
    #[must_use]
    pub fn is_damaged(&self) -> bool {
        self.fault.is_some()
    }

    /// Bytes past the last applied commit.
    #[must_use]
    pub fn discarded_bytes(&self) -> u64 {
        self.file_size.saturating_sub(self.valid_end)
    }
}

/// A validated commit read from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Checkpoint reached by this commit.
    pub checkpoint: Checkpoint,
    /// Checkpoint of the preceding commit.
    pub previous: Checkpoint,
    /// The commit's mutations in file order.
    pub mutations: Vec<Mutation>,
}

/// State rebuilt by replay.
#[derive(Debug)]
pub struct Replayed {
    /// Committed key/value state.
    pub index: Index,
    /// Checkpoint of the last applied commit.
    pub checkpoint: Checkpoint,
    /// Checkpoint preceding it.
    pub previous: Checkpoint,
    /// Replay diagnostics.
    pub report: RecoveryReport,
}

/// Reads and validates commit frames one by one.
pub struct CommitReader<'a> {
    backend: &'a dyn StorageBackend,
    page_size: u32,
    size: u64,
    pos: u64,
    last: Checkpoint,
}

impl<'a> CommitReader<'a> {
    /// Creates a reader positioned at the first commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(backend: &'a dyn StorageBackend, header: &Header) -> CoreResult<Self> {
        Ok(Self {
            backend,
            page_size: header.page_size,
            size: backend.size()?,
            pos: HEADER_SIZE as u64,
            last: Checkpoint::NONE,
        })
    }

    /// Offset of the next frame.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// File size seen by this reader.
    pub fn file_size(&self) -> u64 {
        self.size
    }

    /// Returns `true` once every byte has been consumed.
    pub fn at_end(&self) -> bool {
        self.pos >= self.size
    }

    /// Reads the next commit.
    ///
    /// Returns `Ok(Ok(commit))` for a valid frame and `Ok(Err(reason))` at
    /// a fault boundary; the reader does not advance past a fault.
    ///
    /// # Errors
    ///
    /// Returns an error for I/O failures and for undecodable bodies
    /// inside checksum-valid frames.
    pub fn next_commit(&mut self) -> CoreResult<Result<Commit, FaultReason>> {
        let remaining = self.size.saturating_sub(self.pos);
        if remaining < COMMIT_PREFIX_SIZE as u64 {
            return Ok(Err(FaultReason::Truncated));
        }

        let prefix = self.backend.read_at(self.pos, COMMIT_PREFIX_SIZE)?;
        if prefix[0..4] != COMMIT_MAGIC {
            return Ok(Err(FaultReason::BadCommitMagic));
        }
        let body_len = u64::from(read_u32(&prefix, 4));

        let min_len = (COMMIT_PREFIX_SIZE + TRAILER_SIZE) as u64 + body_len;
        if min_len > remaining {
            return Ok(Err(FaultReason::Truncated));
        }
        let frame_len = align_up(self.pos + min_len, self.page_size) - self.pos;
        if frame_len > remaining {
            return Ok(Err(FaultReason::Truncated));
        }
        let Ok(frame_len_usize) = usize::try_from(frame_len) else {
            return Ok(Err(FaultReason::Truncated));
        };

        let frame = self.backend.read_at(self.pos, frame_len_usize)?;
        let Some(trailer) = Trailer::decode(&frame[frame_len_usize - TRAILER_SIZE..]) else {
            return Ok(Err(FaultReason::BadTrailerMagic));
        };

        let actual = frame_crc(&frame);
        if trailer.crc32 != actual {
            return Ok(Err(FaultReason::ChecksumMismatch {
                expected: trailer.crc32,
                actual,
            }));
        }

        let end = self.pos + frame_len;
        if u64::from(trailer.frame_len) != frame_len || trailer.checkpoint.as_u64() != end {
            return Ok(Err(FaultReason::CheckpointMismatch));
        }
        if trailer.previous != self.last {
            return Ok(Err(FaultReason::BrokenChain));
        }

        // body_len <= frame_len, which fits in usize.
        let body_end = COMMIT_PREFIX_SIZE + body_len as usize;
        let mutations = decode_body(&frame[COMMIT_PREFIX_SIZE..body_end]).map_err(|err| {
            CoreError::invalid_format(format!("commit at offset {:#x}: {err}", self.pos))
        })?;

        self.pos = end;
        self.last = trailer.checkpoint;
        Ok(Ok(Commit {
            checkpoint: trailer.checkpoint,
            previous: trailer.previous,
            mutations,
        }))
    }
}

/// Rebuilds the committed state from the log.
///
/// With `stop_at` set, replay stops right after the commit that reaches
/// that checkpoint; the checkpoint must be reached, otherwise
/// `CheckpointNotFound` is returned.
///
/// # Errors
///
/// - `InvalidFormat` if the first commit is already invalid (or missing
///   bytes), or a checksum-valid commit holds undecodable content
/// - `CheckpointNotFound` if `stop_at` is never reached
/// - Storage errors from the backend
pub fn replay(
    backend: &dyn StorageBackend,
    header: &Header,
    stop_at: Option<Checkpoint>,
    verify_values: bool,
) -> CoreResult<Replayed> {
    let mut reader = CommitReader::new(backend, header)?;
    let mut index = Index::new();
    let mut checkpoint = Checkpoint::NONE;
    let mut previous = Checkpoint::NONE;
    let mut commits_applied = 0u64;
    let mut fault = None;

    if stop_at == Some(Checkpoint::NONE) {
        return Err(CoreError::CheckpointNotFound { checkpoint: 0 });
    }

    while stop_at != Some(checkpoint) && !reader.at_end() {
        let offset = reader.position();
        let commit = match reader.next_commit()? {
            Ok(commit) => commit,
            Err(reason) => {
                fault = Some(Fault { offset, reason });
                break;
            }
        };

        if verify_values {
            for mutation in &commit.mutations {
                if let Mutation::Put { key, value } = mutation {
                    from_cbor(value).map_err(|err| {
                        CoreError::invalid_format(format!(
                            "undecodable value for key {:?} in commit {}: {err}",
                            String::from_utf8_lossy(key),
                            commit.checkpoint
                        ))
                    })?;
                }
            }
        }

        index.apply(commit.mutations);
        previous = checkpoint;
        checkpoint = commit.checkpoint;
        commits_applied += 1;
    }

    if let Some(fault) = fault {
        if commits_applied == 0 {
            return Err(CoreError::invalid_format(format!(
                "no valid commit in file: {fault}"
            )));
        }
    }
    if let Some(target) = stop_at {
        if target != checkpoint {
            return Err(CoreError::CheckpointNotFound {
                checkpoint: target.as_u64(),
            });
        }
    }

    Ok(Replayed {
        index,
        checkpoint,
        previous,
        report: RecoveryReport {
            commits_applied,
            valid_end: reader.position(),
            file_size: reader.file_size(),
            fault,
        },
    })
}
