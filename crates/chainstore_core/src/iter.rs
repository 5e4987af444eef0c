//! Iteration over live entries.

use crate::error::CoreResult;
use chainstore_codec::{from_cbor, Value};
use std::sync::Arc;

/// A value captured by an iterator.
#[derive(Debug, Clone)]
pub(crate) enum Captured {
    /// Committed or staged bytes, decoded on demand.
    Encoded(Arc<[u8]>),
    /// The content of an overlay at capture time.
    Decoded(Value),
}

/// Lazy iterator over `(key, value)` pairs.
///
/// The set of entries is captured when the iterator is created, so later
/// changes to the store do not affect it. Values are decoded only when
/// reached. Entries come in key order; cloning the iterator or calling
/// [`restart`](Self::restart) replays the same sequence.
#[derive(Debug, Clone)]
pub struct Iter {
    entries: Arc<[(Vec<u8>, Captured)]>,
    pos: usize,
}

impl Iter {
    pub(crate) fn new(entries: Vec<(Vec<u8>, Captured)>) -> Self {
        Self {
            entries: entries.into(),
            pos: 0,
        }
    }

    /// Rewinds to the first entry.
    pub fn restart(&mut self) {
        self.pos = 0;
    }

    /// Keys in iteration order, without decoding values.
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(|(k, _)| k.as_slice())
    }
}

impl Iterator for Iter {
    type Item = CoreResult<(Vec<u8>, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, captured) = self.entries.get(self.pos)?;
        self.pos += 1;
        let value = match captured {
            Captured::Encoded(bytes) => match from_cbor(bytes) {
                Ok(value) => value,
                Err(err) => return Some(Err(err.into())),
            },
            Captured::Decoded(value) => value.clone(),
        };
        Some(Ok((key.clone(), value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Iter {}
