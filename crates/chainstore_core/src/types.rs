//! Core type definitions for chainstore.

use std::fmt;

/// Identifier of a durable store state.
///
/// A checkpoint is the file offset just past the commit that produced it,
/// so checkpoints strictly increase along the log. [`Checkpoint::NONE`]
/// (0) stands for "no commit", e.g. the predecessor of the first commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Checkpoint(pub u64);

impl Checkpoint {
    /// The checkpoint before any commit.
    pub const NONE: Self = Self(0);

    /// Creates a checkpoint from its raw value.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` for [`Checkpoint::NONE`].
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cp:{:#x}", self.0)
    }
}

impl From<Checkpoint> for u64 {
    fn from(cp: Checkpoint) -> Self {
        cp.0
    }
}
