//! Shared-memory rings for a paravirtualized console.
//!
//! * [`ConsolePage`] – the page both domains map: an input and an output byte
//!   array followed by four `u32` indices.
//! * [`RingProducer`] / [`RingConsumer`] – the two halves of one ring; each
//!   index field has exactly one writer.
//! * [`Doorbell`] – futex-backed coalescing wake-up counter for hosted peers.
//! * [`SharedRegion`] – owned (mmap/heap) or foreign backing memory.
//! * [`RingError`] – geometry, allocation and index-overrun failures.

mod doorbell;
mod error;
mod page;
mod region;
mod ring;
pub mod wait;

pub use doorbell::Doorbell;
pub use error::{RingError, RingResult};
pub use page::{
    BackendRings, ConsolePage, Geometry, GuestRings, RingId, PAGE_SHIFT,
    STANDARD_INPUT_CAPACITY, STANDARD_OUTPUT_CAPACITY,
};
pub use region::SharedRegion;
pub use ring::{RingConsumer, RingProducer};
