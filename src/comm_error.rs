//! ScatterError: unified error type for the collective primitives.
//!
//! Every failure is local to the rank that detects it. A collective that fails
//! on one rank leaves the other ranks blocked in the same call; callers must
//! abort the whole group when any participant reports an error.

use std::collections::TryReserveError;
use thiserror::Error;

/// Error type for scatter/gather operations.
#[derive(Debug, Error)]
pub enum ScatterError {
    /// A root or peer rank outside `[0, size)`.
    #[error("invalid rank {rank}: group size is {size}")]
    InvalidRank { rank: usize, size: usize },

    /// Declared counts exceed a buffer, or participants disagree on a size.
    #[error("size mismatch in {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A growable receive buffer could not be grown to the required length.
    #[error("could not grow receive buffer to {requested} elements")]
    AllocationFailure {
        requested: usize,
        #[source]
        source: TryReserveError,
    },

    /// The count-exchange phase did not complete consistently.
    #[error("count negotiation failed on rank {rank}: {reason}")]
    NegotiationFailure { rank: usize, reason: String },

    /// An index map is not injective or points outside its buffer.
    #[error("invalid index map: {0}")]
    InvalidIndexMap(String),

    /// The transport could not deliver a message.
    #[error("transport failure talking to rank {peer}")]
    Transport {
        peer: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ScatterError {
    pub(crate) fn size_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            what,
            expected,
            actual,
        }
    }

    /// A size that does not fit in `usize`; reported with `expected = usize::MAX`.
    pub(crate) fn too_large(what: &'static str, actual: usize) -> Self {
        Self::size_mismatch(what, usize::MAX, actual)
    }

    pub(crate) fn transport(peer: usize, msg: impl Into<String>) -> Self {
        Self::Transport {
            peer,
            source: msg.into().into(),
        }
    }

    /// Re-label a failure of the count phase as a negotiation failure.
    pub(crate) fn into_negotiation(self, rank: usize) -> Self {
        match self {
            e @ Self::NegotiationFailure { .. } => e,
            e @ Self::SizeMismatch { .. } => e,
            other => Self::NegotiationFailure {
                rank,
                reason: other.to_string(),
            },
        }
    }
}
