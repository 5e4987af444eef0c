//! Transaction buffer: staged mutations and live overlays.

use crate::error::CoreResult;
use crate::index::Index;
use crate::log::Mutation;
use chainstore_codec::{MutableDict, Value};
use std::collections::btree_map::{self, BTreeMap};

/// What an overlay was seeded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayOrigin {
    /// The committed value of the key.
    Committed,
    /// A value staged by `put` in the same buffer.
    Staged,
    /// Nothing: the key was absent or staged for removal.
    Absent,
}

/// Represents a pending write in the buffer.
#[derive(Debug, Clone)]
pub enum PendingWrite {
    /// Store a value.
    Put {
        /// Value payload (canonical CBOR bytes).
        payload: Vec<u8>,
    },
    /// Remove a committed key.
    Remove,
    /// A mutable overlay, re-encoded at commit.
    Overlay {
        /// The document being edited.
        dict: MutableDict,
        /// What the overlay replaced.
        origin: OverlayOrigin,
    },
}

impl PendingWrite {
    /// Returns `true` if the key is live once this write is applied.
    ///
    /// An untouched overlay over an absent key does not create it.
    pub fn is_live(&self) -> bool {
        match self {
            Self::Put { .. } => true,
            Self::Remove => false,
            Self::Overlay { dict, origin } => dict.is_changed() || *origin != OverlayOrigin::Absent,
        }
    }
}

/// Mutations staged since the last commit.
///
/// Entries are keyed and ordered by store key; a later write to the same
/// key replaces the earlier one. At most one overlay exists per key, so
/// repeated requests for it see the same pending edits.
#[derive(Debug, Default)]
pub struct TransactionBuffer {
    writes: BTreeMap<Vec<u8>, PendingWrite>,
}

impl TransactionBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pending write for `key`.
    pub fn get(&self, key: &[u8]) -> Option<&PendingWrite> {
        self.writes.get(key)
    }

    /// Stages `write` for `key`, replacing any earlier write.
    pub fn stage(&mut self, key: Vec<u8>, write: PendingWrite) {
        self.writes.insert(key, write);
    }

    /// Drops whatever is staged for `key`.
    pub fn discard(&mut self, key: &[u8]) -> Option<PendingWrite> {
        self.writes.remove(key)
    }

    /// Returns the overlay staged for `key`, if any.
    pub fn overlay_mut(&mut self, key: &[u8]) -> Option<&mut MutableDict> {
        match self.writes.get_mut(key) {
            Some(PendingWrite::Overlay { dict, .. }) => Some(dict),
            _ => None,
        }
    }

    /// Returns `true` if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Discards every staged entry.
    pub fn clear(&mut self) {
        self.writes.clear();
    }

    /// Iterates over staged entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, Vec<u8>, PendingWrite> {
        self.writes.iter()
    }

    /// Resolves the buffer into the mutations a commit must write.
    ///
    /// Overlays are re-encoded only if edited (or if they replaced a staged
    /// put). An untouched overlay that replaced a removal still removes the
    /// committed key. The result is in key order and may be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if an overlay cannot be encoded.
    pub fn to_mutations(&self, index: &Index) -> CoreResult<Vec<Mutation>> {
        let mut mutations = Vec::with_capacity(self.writes.len());
        for (key, write) in &self.writes {
            let mutation = match write {
                PendingWrite::Put { payload } => Some(Mutation::Put {
                    key: key.clone(),
                    value: payload.clone(),
                }),
                PendingWrite::Remove => Some(Mutation::Remove { key: key.clone() }),
                PendingWrite::Overlay { dict, origin } => {
                    if dict.is_changed() || *origin == OverlayOrigin::Staged {
                        Some(Mutation::Put {
                            key: key.clone(),
                            value: dict.reencode()?,
                        })
                    } else if *origin == OverlayOrigin::Absent && index.contains(key) {
                        Some(Mutation::Remove { key: key.clone() })
                    } else {
                        None
                    }
                }
            };
            mutations.extend(mutation);
        }
        Ok(mutations)
    }
}

/// Current value of a pending write, decoded.
///
/// # Errors
///
/// Returns an error if a staged payload cannot be decoded.
pub fn pending_value(write: &PendingWrite) -> CoreResult<Option<Value>> {
    Ok(match write {
        PendingWrite::Put { payload } => Some(chainstore_codec::from_cbor(payload)?),
        PendingWrite::Remove => None,
        PendingWrite::Overlay { dict, .. } => write.is_live().then(|| dict.to_value()),
    })
}
