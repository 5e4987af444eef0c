//! Mutation records and commit body serialization.

use crate::error::{CoreError, CoreResult};
use crate::log::format::read_u32;

/// Maximum key length in bytes.
pub const MAX_KEY_SIZE: usize = 64 * 1024;

/// Type of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MutationOp {
    /// Store a value under a key.
    Put = 1,
    /// Remove a key.
    Remove = 2,
}

impl MutationOp {
    /// Converts a byte to a mutation op.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Remove),
            _ => None,
        }
    }

    /// Converts the op to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single key change inside a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Store an encoded value under a key.
    Put {
        /// The key.
        key: Vec<u8>,
        /// Canonical CBOR encoding of the value.
        value: Vec<u8>,
    },
    /// Remove a key.
    Remove {
        /// The key.
        key: Vec<u8>,
    },
}

impl Mutation {
    /// Returns the key this mutation applies to.
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Remove { key } => key,
        }
    }

    /// Returns the mutation op.
    pub fn op(&self) -> MutationOp {
        match self {
            Self::Put { .. } => MutationOp::Put,
            Self::Remove { .. } => MutationOp::Remove,
        }
    }
}

/// Checks that `key` can be stored.
///
/// # Errors
///
/// Returns `InvalidArgument` for empty keys or keys over [`MAX_KEY_SIZE`].
pub fn validate_key(key: &[u8]) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::invalid_argument("key must not be empty"));
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(CoreError::invalid_argument(format!(
            "key too large: {} bytes exceeds maximum of {MAX_KEY_SIZE} bytes",
            key.len()
        )));
    }
    Ok(())
}

/// Serializes a mutation list into a commit body.
///
/// ```text
/// | count (4) | op (1) | key_len (4) | key | [value_len (4) | value] | ...
/// ```
///
/// # Errors
///
/// Returns an error if a key is invalid or a length exceeds 32 bits.
pub fn encode_body(mutations: &[Mutation]) -> CoreResult<Vec<u8>> {
    let count = u32::try_from(mutations.len())
        .map_err(|_| CoreError::invalid_argument("too many mutations in one commit"))?;
    let capacity = 4 + mutations
        .iter()
        .map(|m| match m {
            Mutation::Put { key, value } => 9 + key.len() + value.len(),
            Mutation::Remove { key } => 5 + key.len(),
        })
        .sum::<usize>();

    let mut buf = Vec::with_capacity(capacity);
    buf.extend_from_slice(&count.to_le_bytes());

    for mutation in mutations {
        let key = mutation.key();
        validate_key(key)?;
        buf.push(mutation.op().as_byte());
        // Bounded by MAX_KEY_SIZE.
        buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buf.extend_from_slice(key);

        if let Mutation::Put { value, .. } = mutation {
            let len = u32::try_from(value.len())
                .map_err(|_| CoreError::invalid_argument("value exceeds 4 GiB"))?;
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(value);
        }
    }

    Ok(buf)
}

/// Parses a commit body.
///
/// The body sits inside a checksum-valid frame, so any inconsistency here
/// means the content itself is wrong, not that the write was torn.
///
/// # Errors
///
/// Returns `InvalidFormat` for unknown ops, truncated records, invalid
/// keys or trailing bytes.
pub fn decode_body(body: &[u8]) -> CoreResult<Vec<Mutation>> {
    let mut reader = BodyReader { body, pos: 0 };

    let count = reader.take_len()?;
    // Smallest record: op + key_len + 1 byte key.
    let mut mutations = Vec::with_capacity(count.min(body.len() / 6));

    for _ in 0..count {
        let op_byte = reader.take(1)?[0];
        let op = MutationOp::from_byte(op_byte)
            .ok_or_else(|| CoreError::invalid_format(format!("unknown mutation op {op_byte}")))?;
        let key_len = reader.take_len()?;
        let key = reader.take(key_len)?.to_vec();
        validate_key(&key).map_err(|e| CoreError::invalid_format(e.to_string()))?;

        let mutation = match op {
            MutationOp::Put => {
                let value_len = reader.take_len()?;
                let value = reader.take(value_len)?.to_vec();
                Mutation::Put { key, value }
            }
            MutationOp::Remove => Mutation::Remove { key },
        };
        mutations.push(mutation);
    }

    if reader.pos != body.len() {
        return Err(CoreError::invalid_format(format!(
            "{} trailing bytes in commit body",
            body.len() - reader.pos
        )));
    }

    Ok(mutations)
}

struct BodyReader<'a> {
    body: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.body.len())
            .ok_or_else(|| CoreError::invalid_format("commit body truncated"))?;
        let bytes = &self.body[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn take_len(&mut self) -> CoreResult<usize> {
        let bytes = self.take(4)?;
        Ok(read_u32(bytes, 0) as usize)
    }
}
