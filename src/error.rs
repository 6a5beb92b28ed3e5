//! The crate's error taxonomy.
//!
//! Only two rows of the design's error table ever reach a caller as an `Err`:
//! out-of-bounds coordinates, and a reference to a buffer that has since been
//! retired. Everything else (missing symbols, malformed macro-argument
//! reparses, token overlap, denylisted diagnostics, missing dependencies) is
//! recoverable in place and is reported by returning `None`/`&[]` and logging,
//! never by propagating an `Err` — see the module docs on
//! [`crate::analysis::shallow::ShallowAnalysis`] for where each of those is
//! handled.

use thiserror::Error;

use crate::arena::Id;

/// Errors that can be returned from the small set of fallible operations in
/// this crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A `(line, column)` pair, or a byte offset, fell outside the bounds of
    /// the buffer it was resolved against.
    #[error("position out of range for buffer {buffer}")]
    InvalidRange {
        /// The buffer the position was resolved against.
        buffer: Id,
    },

    /// A tree, token, or node referenced a [`BufferId`](crate::source::BufferId)
    /// that the source manager no longer considers current.
    #[error("buffer {buffer} is stale and must be reparsed")]
    StaleBuffer {
        /// The retired buffer identity.
        buffer: Id,
    },

    /// A file could not be read from disk.
    #[error("failed to read source file {path}: {reason}")]
    Io {
        /// The path that failed to load.
        path: String,
        /// A human-readable description of the underlying I/O failure.
        reason: String,
    },
}
