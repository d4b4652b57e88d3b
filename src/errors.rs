//! Error Types
//!
//! Recoverable conditions that the facade surfaces through plain return
//! values (a sentinel id, `false`, a shared empty default) are *not*
//! represented here — see [`crate::facade`]. This type exists for the
//! handful of internal paths where a `Result` is the idiomatic shape: pool
//! exhaustion and clip layout validation ahead of a pool mutation.

use thiserror::Error;

/// Errors produced by the pool manager's fallible internals.
#[derive(Error, Debug)]
pub enum AnimError {
    /// A fixed-capacity pool has no room left for another item.
    #[error("pool exhausted: {pool}")]
    PoolExhausted {
        /// Name of the exhausted pool (e.g. `"curve"`, `"clip"`, `"key"`).
        pool: &'static str,
    },

    /// A clip's curve layout does not match what its library expects.
    #[error("layout mismatch in clip {clip}: expected {expected} curves, found {found}")]
    LayoutMismatch {
        /// Name of the offending clip.
        clip: String,
        /// Curve count the skeleton/library layout requires.
        expected: usize,
        /// Curve count actually supplied.
        found: usize,
    },

    /// Referenced a library id that does not resolve to a live library.
    #[error("unknown library id")]
    UnknownLibrary,

    /// Referenced a skeleton id that does not resolve to a live skeleton.
    #[error("unknown skeleton id")]
    UnknownSkeleton,

    /// `write_keys` was given a byte slice of the wrong length for the
    /// curve's key count and format.
    #[error("key byte count mismatch: expected {expected}, found {found}")]
    KeyByteCountMismatch {
        /// Expected byte count.
        expected: usize,
        /// Byte count actually supplied.
        found: usize,
    },
}

/// Alias for `Result<T, AnimError>`.
pub type Result<T> = std::result::Result<T, AnimError>;
