//! Single-producer/single-consumer byte ring living in the console page.
//!
//! Indices are free-running `u32` counters: occupancy is
//! `producer.wrapping_sub(consumer)` and the slot for index `i` is
//! `i & (capacity - 1)`. Because every capacity is a power of two it divides
//! 2^32, so slot arithmetic stays correct when the counters themselves wrap.
//!
//! Ordering discipline:
//! * consumer: `Acquire` load of the producer index, then the payload reads,
//!   then a `Release` store of the consumer index;
//! * producer: `Acquire` load of the consumer index, then the payload writes,
//!   then a `Release` store of the producer index.
//!
//! Each side loads its own index `Relaxed`; nobody else writes it.

use crate::page::{ConsolePage, RingId, RingParts};
use crate::{RingError, RingResult};
#[cfg(feature = "loom")]
use loom::sync::atomic::Ordering;
use std::fmt;
use std::sync::Arc;
#[cfg(not(feature = "loom"))]
use std::sync::atomic::Ordering;
use tracing::error;

/// One ring of the page, shared by exactly one producer and one consumer half.
pub(crate) struct RingChannel {
    page: Arc<ConsolePage>,
    id: RingId,
}

impl RingChannel {
    pub(crate) fn new(page: Arc<ConsolePage>, id: RingId) -> Self {
        Self { page, id }
    }

    fn parts(&self) -> RingParts<'_> {
        self.page.ring(self.id)
    }

    fn capacity(&self) -> u32 {
        self.page.geometry().capacity(self.id)
    }

    fn indices(&self) -> (u32, u32) {
        let parts = self.parts();
        let consumer = parts.consumer.load(Ordering::Acquire);
        let producer = parts.producer.load(Ordering::Acquire);
        (producer, consumer)
    }

    /// Occupied byte count for an observed index pair, validating the bound.
    fn occupied(&self, producer: u32, consumer: u32) -> RingResult<u32> {
        let capacity = self.capacity();
        let used = producer.wrapping_sub(consumer);
        if used > capacity {
            error!(
                ring = ?self.id,
                producer,
                consumer,
                capacity,
                "console ring index overrun"
            );
            return Err(RingError::IndexOverrun {
                producer,
                consumer,
                capacity,
            });
        }
        Ok(used)
    }
}

impl fmt::Debug for RingChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (producer, consumer) = self.indices();
        f.debug_struct("RingChannel")
            .field("id", &self.id)
            .field("capacity", &self.capacity())
            .field("producer", &producer)
            .field("consumer", &consumer)
            .finish()
    }
}

/// Consumer half: the only writer of this ring's consumer index.
#[derive(Debug)]
pub struct RingConsumer {
    channel: RingChannel,
}

impl RingConsumer {
    pub(crate) fn new(channel: RingChannel) -> Self {
        Self { channel }
    }

    /// Ring capacity in bytes.
    pub fn capacity(&self) -> u32 {
        self.channel.capacity()
    }

    /// Which ring of the page this half consumes.
    pub fn ring_id(&self) -> RingId {
        self.channel.id
    }

    /// Snapshot of `(producer, consumer)` indices.
    pub fn indices(&self) -> (u32, u32) {
        self.channel.indices()
    }

    /// Bytes committed by the producer and not yet consumed.
    ///
    /// Always reloads the producer index; the peer may advance it at any time.
    pub fn available_to_read(&self) -> RingResult<u32> {
        let parts = self.channel.parts();
        let consumer = parts.consumer.load(Ordering::Relaxed);
        let producer = parts.producer.load(Ordering::Acquire);
        self.channel.occupied(producer, consumer)
    }

    /// Consumes one byte, or returns `None` when the ring is empty.
    pub fn read_byte(&mut self) -> RingResult<Option<u8>> {
        let parts = self.channel.parts();
        let consumer = parts.consumer.load(Ordering::Relaxed);
        let producer = parts.producer.load(Ordering::Acquire);
        if self.channel.occupied(producer, consumer)? == 0 {
            return Ok(None);
        }

        let slot = (consumer & (parts.capacity - 1)) as usize;
        let byte = unsafe {
            // SAFETY: slot < capacity, and the Acquire load above proves the
            // producer finished writing it.
            parts.data.add(slot).read_volatile()
        };
        parts
            .consumer
            .store(consumer.wrapping_add(1), Ordering::Release);
        Ok(Some(byte))
    }

    /// Consumes up to `buf.len()` bytes, returning how many were copied.
    ///
    /// All bytes are read before the single consumer-index update.
    pub fn read_slice(&mut self, buf: &mut [u8]) -> RingResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let parts = self.channel.parts();
        let consumer = parts.consumer.load(Ordering::Relaxed);
        let producer = parts.producer.load(Ordering::Acquire);
        let available = self.channel.occupied(producer, consumer)? as usize;
        let count = available.min(buf.len());
        if count == 0 {
            return Ok(0);
        }

        let mask = parts.capacity - 1;
        for (offset, out) in buf[..count].iter_mut().enumerate() {
            let slot = (consumer.wrapping_add(offset as u32) & mask) as usize;
            *out = unsafe {
                // SAFETY: slot < capacity and lies behind the observed producer index.
                parts.data.add(slot).read_volatile()
            };
        }
        parts
            .consumer
            .store(consumer.wrapping_add(count as u32), Ordering::Release);
        Ok(count)
    }
}

/// Producer half: the only writer of this ring's producer index and free slots.
#[derive(Debug)]
pub struct RingProducer {
    channel: RingChannel,
}

impl RingProducer {
    pub(crate) fn new(channel: RingChannel) -> Self {
        Self { channel }
    }

    /// Ring capacity in bytes.
    pub fn capacity(&self) -> u32 {
        self.channel.capacity()
    }

    /// Which ring of the page this half produces into.
    pub fn ring_id(&self) -> RingId {
        self.channel.id
    }

    /// Snapshot of `(producer, consumer)` indices.
    pub fn indices(&self) -> (u32, u32) {
        self.channel.indices()
    }

    /// Bytes the producer may write right now without overwriting unread data.
    pub fn free_space(&self) -> RingResult<u32> {
        let parts = self.channel.parts();
        let producer = parts.producer.load(Ordering::Relaxed);
        let consumer = parts.consumer.load(Ordering::Acquire);
        let used = self.channel.occupied(producer, consumer)?;
        Ok(parts.capacity - used)
    }

    /// Copies as much of `data` as fits and publishes it; returns the count.
    ///
    /// A short (or zero) count is backpressure, not an error.
    pub fn write_slice(&mut self, data: &[u8]) -> RingResult<usize> {
        let parts = self.channel.parts();
        let producer = parts.producer.load(Ordering::Relaxed);
        let consumer = parts.consumer.load(Ordering::Acquire);
        let used = self.channel.occupied(producer, consumer)?;
        let free = (parts.capacity - used) as usize;
        let count = free.min(data.len());
        if count == 0 {
            return Ok(0);
        }

        let mask = parts.capacity - 1;
        for (offset, byte) in data[..count].iter().enumerate() {
            let slot = (producer.wrapping_add(offset as u32) & mask) as usize;
            unsafe {
                // SAFETY: slot < capacity and lies in the free window, which the
                // consumer released with its Release store.
                parts.data.add(slot).write_volatile(*byte);
            }
        }
        parts
            .producer
            .store(producer.wrapping_add(count as u32), Ordering::Release);
        Ok(count)
    }
}
