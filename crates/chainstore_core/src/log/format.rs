//! Header, commit frame and trailer layout.

use crate::config::check_page_size;
use crate::error::{CoreError, CoreResult};
use crate::types::Checkpoint;

/// Magic bytes at the start of every store file.
pub const HEADER_MAGIC: [u8; 8] = *b"CHNSTORE";

/// Current file format version.
pub const FORMAT_VERSION: u16 = 1;

/// Codec id for canonical CBOR values.
pub const CODEC_CANONICAL_CBOR: u8 = 1;

/// Size of the file header.
/// magic (8) + version (2) + codec (1) + flags (1) + page size (4) + crc32 (4)
pub const HEADER_SIZE: usize = 20;

/// Magic bytes at the start of every commit frame.
pub const COMMIT_MAGIC: [u8; 4] = *b"CMIT";

/// Size of the commit prefix: magic (4) + body length (4).
pub const COMMIT_PREFIX_SIZE: usize = 8;

/// Magic bytes closing every trailer.
pub const TRAILER_MAGIC: [u8; 8] = *b"CHNTRAIL";

/// Size of the trailer.
/// crc32 (4) + frame length (4) + checkpoint (8) + previous (8) + magic (8)
pub const TRAILER_SIZE: usize = 32;

/// Global parameters needed to interpret every commit in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Format version.
    pub version: u16,
    /// Value codec id.
    pub codec: u8,
    /// Checkpoint alignment (0 = unaligned).
    pub page_size: u32,
}

impl Header {
    /// Creates a header for a new file.
    #[must_use]
    pub const fn new(page_size: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            codec: CODEC_CANONICAL_CBOR,
            page_size,
        }
    }

    /// Serializes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&HEADER_MAGIC);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[10] = self.codec;
        buf[11] = 0; // flags
        buf[12..16].copy_from_slice(&self.page_size.to_le_bytes());
        let crc = crc32fast::hash(&buf[..16]);
        buf[16..20].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Parses and validates a header.
    ///
    /// # Errors
    ///
    /// Any problem is fatal: returns `InvalidFormat`.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CoreError::invalid_format(format!(
                "header truncated: {} of {HEADER_SIZE} bytes",
                bytes.len()
            )));
        }
        if bytes[0..8] != HEADER_MAGIC {
            return Err(CoreError::invalid_format("not a chainstore file (bad magic)"));
        }
        let stored_crc = read_u32(bytes, 16);
        let actual_crc = crc32fast::hash(&bytes[..16]);
        if stored_crc != actual_crc {
            return Err(CoreError::invalid_format(format!(
                "header checksum mismatch: expected {stored_crc:08x}, got {actual_crc:08x}"
            )));
        }

        let version = u16::from_le_bytes([bytes[8], bytes[9]]);
        if version == 0 || version > FORMAT_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported format version {version}"
            )));
        }
        let codec = bytes[10];
        if codec != CODEC_CANONICAL_CBOR {
            return Err(CoreError::invalid_format(format!("unknown value codec {codec}")));
        }
        if bytes[11] != 0 {
            return Err(CoreError::invalid_format(format!(
                "unknown header flags {:#04x}",
                bytes[11]
            )));
        }
        let page_size = read_u32(bytes, 12);
        check_page_size(page_size).map_err(CoreError::invalid_format)?;

        Ok(Self {
            version,
            codec,
            page_size,
        })
    }
}

/// Integrity record closing a commit frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// CRC32 over every frame byte except this field.
    pub crc32: u32,
    /// Length of the whole frame, trailer included.
    pub frame_len: u32,
    /// Checkpoint reached by this commit (offset of the frame end).
    pub checkpoint: Checkpoint,
    /// Checkpoint of the preceding commit, or [`Checkpoint::NONE`].
    pub previous: Checkpoint,
}

impl Trailer {
    /// Serializes the trailer.
    #[must_use]
    pub fn encode(&self) -> [u8; TRAILER_SIZE] {
        let mut buf = [0u8; TRAILER_SIZE];
        buf[0..4].copy_from_slice(&self.crc32.to_le_bytes());
        buf[4..8].copy_from_slice(&self.frame_len.to_le_bytes());
        buf[8..16].copy_from_slice(&self.checkpoint.as_u64().to_le_bytes());
        buf[16..24].copy_from_slice(&self.previous.as_u64().to_le_bytes());
        buf[24..32].copy_from_slice(&TRAILER_MAGIC);
        buf
    }

    /// Parses a trailer. Returns `None` if the magic does not match or
    /// fewer than [`TRAILER_SIZE`] bytes are given.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < TRAILER_SIZE || bytes[24..32] != TRAILER_MAGIC {
            return None;
        }
        Some(Self {
            crc32: read_u32(bytes, 0),
            frame_len: read_u32(bytes, 4),
            checkpoint: Checkpoint::new(read_u64(bytes, 8)),
            previous: Checkpoint::new(read_u64(bytes, 16)),
        })
    }
}

/// Length of the frame holding a `body_len` byte body that starts at
/// `start`.
///
/// With a non-zero page size the frame is padded so that it ends on a
/// page boundary.
///
/// # Errors
///
/// Returns `InvalidArgument` if the frame length does not fit the
/// trailer's 32-bit field.
pub fn frame_len(start: u64, body_len: u64, page_size: u32) -> CoreResult<u64> {
    let min_end = start + (COMMIT_PREFIX_SIZE + TRAILER_SIZE) as u64 + body_len;
    let len = align_up(min_end, page_size) - start;
    if u32::try_from(len).is_err() {
        return Err(CoreError::invalid_argument(format!(
            "commit too large: {len} byte frame"
        )));
    }
    Ok(len)
}

/// Rounds `offset` up to a multiple of `page_size` (no-op for 0).
#[must_use]
pub fn align_up(offset: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return offset;
    }
    let page = u64::from(page_size);
    offset.div_ceil(page) * page
}

/// Computes the frame checksum: everything but the trailer's crc field.
#[must_use]
pub fn frame_crc(frame: &[u8]) -> u32 {
    let crc_pos = frame.len().saturating_sub(TRAILER_SIZE);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&frame[..crc_pos]);
    hasher.update(&frame[(crc_pos + 4).min(frame.len())..]);
    hasher.finalize()
}

/// Builds a complete commit frame for `body` placed at `start`.
///
/// Returns the frame bytes and the checkpoint the frame reaches.
///
/// # Errors
///
/// Returns `InvalidArgument` if the body is too large for one frame.
pub fn encode_frame(
    body: &[u8],
    start: u64,
    previous: Checkpoint,
    page_size: u32,
) -> CoreResult<(Vec<u8>, Checkpoint)> {
    let body_len = u32::try_from(body.len())
        .map_err(|_| CoreError::invalid_argument("commit body exceeds 4 GiB"))?;
    let len = frame_len(start, u64::from(body_len), page_size)?;
    let checkpoint = Checkpoint::new(start + len);
    let len = usize::try_from(len)
        .map_err(|_| CoreError::invalid_argument("commit frame exceeds address space"))?;

    let mut frame = Vec::with_capacity(len);
    frame.extend_from_slice(&COMMIT_MAGIC);
    frame.extend_from_slice(&body_len.to_le_bytes());
    frame.extend_from_slice(body);
    frame.resize(len - TRAILER_SIZE, 0);

    let mut trailer = Trailer {
        crc32: 0,
        // Checked to fit in frame_len().
        frame_len: u32::try_from(len).unwrap_or(u32::MAX),
        checkpoint,
        previous,
    };
    frame.extend_from_slice(&trailer.encode());
    trailer.crc32 = frame_crc(&frame);
    frame[len - TRAILER_SIZE..len - TRAILER_SIZE + 4].copy_from_slice(&trailer.crc32.to_le_bytes());

    Ok((frame, checkpoint))
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}
