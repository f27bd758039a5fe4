//! Error types for ring mutations.
//!
//! Only usage errors are represented here. Argument errors (non-positive
//! weights) and internal invariant violations abort with a panic instead,
//! because they signal a programming bug rather than a recoverable
//! condition.

/// Result type alias for ring operations.
pub type RingResult<T> = std::result::Result<T, RingError>;

/// A recoverable usage error reported by a ring mutation.
///
/// The ring state is unchanged whenever one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    /// An item with the same identity digest is already on the ring.
    #[error("hashring: item already exists")]
    AlreadyExists,

    /// The item is not on the ring.
    #[error("hashring: item does not exist")]
    NotFound,
}
