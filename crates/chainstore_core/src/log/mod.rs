//! The append-only commit log.
//!
//! A store file is a header followed by a chain of commit frames. Each
//! frame carries every mutation of one commit and ends with a trailer
//! that checksums the frame and links it to the previous checkpoint.
//!
//! ## File Layout
//!
//! ```text
//! | header (20) | commit 1 | commit 2 | ...
//!
//! header: | "CHNSTORE" (8) | version (2) | codec (1) | flags (1) | page_size (4) | crc32 (4) |
//! commit: | "CMIT" (4) | body_len (4) | body | zero padding | trailer (32) |
//! trailer: | crc32 (4) | frame_len (4) | checkpoint (8) | previous (8) | "CHNTRAIL" (8) |
//! ```
//!
//! All integers are little-endian. The checkpoint of a commit is the
//! offset of the end of its frame; with a non-zero page size, padding puts
//! every checkpoint on a page boundary.
//!
//! ## Invariants
//!
//! - The log is **append-only**: committed bytes are never rewritten
//! - A commit is written with **one append** and flushed before it is
//!   acknowledged
//! - Every trailer links to the checkpoint of the frame before it (or 0)
//! - Replay never exposes part of a commit

mod format;
mod record;
mod replay;
mod writer;

pub use format::{
    align_up, encode_frame, frame_crc, frame_len, Header, Trailer, CODEC_CANONICAL_CBOR,
    COMMIT_MAGIC, COMMIT_PREFIX_SIZE, FORMAT_VERSION, HEADER_MAGIC, HEADER_SIZE, TRAILER_MAGIC,
    TRAILER_SIZE,
};
pub use record::{decode_body, encode_body, validate_key, Mutation, MutationOp, MAX_KEY_SIZE};
pub use replay::{replay, Commit, CommitReader, Fault, FaultReason, RecoveryReport, Replayed};
pub use writer::LogWriter;
