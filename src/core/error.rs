// ============================================================================
// spark-reactive - Errors
// Rejected accesses through the interception layer
// ============================================================================

use std::fmt;

use thiserror::Error;

use super::types::PropKey;

/// The mutation a rejected access attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Set,
    Delete,
    Splice,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Set => f.write_str("set"),
            Operation::Delete => f.write_str("delete"),
            Operation::Splice => f.write_str("splice"),
        }
    }
}

/// Why a write through a tracked object was not performed.
///
/// None of these are fatal. The infallible accessors (`set`, `delete`,
/// `push`, ...) log them as warnings and carry on; the `try_*` variants
/// return them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// Write or delete through a read-only wrapper
    #[error("cannot {operation} `{key}`: target is read-only")]
    ReadOnly { key: PropKey, operation: Operation },

    /// Length must be a non-negative integer
    #[error("invalid sequence length: {0}")]
    InvalidLength(String),

    /// Named (non-index) key written on a sequence
    #[error("key `{0}` is not an index")]
    NotAnIndex(PropKey),

    /// Sequence-only operation on a record
    #[error("{0} requires a sequence")]
    NotASequence(Operation),
}
