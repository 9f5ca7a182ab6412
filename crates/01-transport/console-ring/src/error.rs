//! Error surface for the console ring crate.
//!
//! Backpressure (full output ring) and an empty input ring are not errors: the
//! ring operations report them as zero-length transfers. What remains is
//! allocation/geometry validation and the one protocol violation a consumer or
//! producer can observe directly: an index pair that claims more bytes in
//! flight than the ring can hold.

use thiserror::Error;

/// Convenience result alias for fallible ring operations.
pub type RingResult<T, E = RingError> = Result<T, E>;

/// Errors surfaced by the shared console page and its rings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingError {
    /// The producer and consumer indices disagree by more than the ring capacity.
    ///
    /// Only a corrupted page or a misbehaving peer can produce this; the
    /// session cannot be repaired.
    #[error(
        "ring index overrun: producer={producer} consumer={consumer} exceeds capacity {capacity}"
    )]
    IndexOverrun {
        producer: u32,
        consumer: u32,
        capacity: u32,
    },

    /// Ring capacity must be a non-zero power of two.
    #[error("ring capacity {requested} must be a non-zero power of two")]
    InvalidCapacity { requested: usize },

    /// The two rings plus the trailing indices do not fit in the address space.
    #[error("ring capacities {input} + {output} do not fit in one addressable page")]
    GeometryTooLarge { input: usize, output: usize },

    /// Allocation of the shared page failed for the given size/alignment pair.
    #[error("failed to allocate shared region of {size} bytes aligned to {alignment}")]
    AllocationFailed { size: usize, alignment: usize },

    /// A foreign page address was null or not suitably aligned for the index fields.
    #[error("console page address {address:#x} is null or misaligned")]
    BadAddress { address: usize },
}
