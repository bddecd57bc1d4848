//! The error type of ring setup, the copy adapters and descriptor encoding.
use thiserror::Error;

/// The result type of fallible ring operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors of ring setup and the scatter-gather adapters.
///
/// Loss on the drain path is not an error. It is part of the result, see [`Drained`].
///
/// [`Drained`]: ../sg/struct.Drained.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum Error {
    /// Not enough free slots for the whole input.
    ///
    /// Recoverable: the ring was not modified. Retry after the consumer made progress or with a
    /// smaller payload.
    #[error("not enough free slots in the ring")]
    OutOfSpace,

    /// The memory for the slot table or the buffer arena could not be reserved.
    #[error("allocating the ring failed")]
    AllocationFailure,

    /// The ring configuration can not be realized.
    ///
    /// A ring needs at least one slot, buffers of at least one byte, and its slot count must
    /// leave room for the doubled cursor range.
    #[error("invalid ring configuration")]
    BadConfig,

    /// A byte buffer is too short for the descriptors it should hold.
    #[error("buffer too short for a slot descriptor")]
    Truncated,
}
