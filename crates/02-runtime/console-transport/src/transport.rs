//! Guest side of the console: byte-level read/write over the page rings.
//!
//! Writes never fail short: a full output ring is backpressure, resolved by
//! yielding to the host scheduler and retrying for as long as it takes. The
//! most interesting console output is produced when the rest of the system is
//! already broken, so the transport never gives up on the backend.

use crate::config::{ConsoleConfig, ReadWait};
use crate::error::ConsoleResult;
use crate::notify::EventNotifier;
use crate::sched::{Scheduler, ThreadYield};
use console_ring::{GuestRings, RingConsumer, RingProducer};
use std::io;
use tracing::{trace, warn};

/// Guest endpoint of one console session.
///
/// Owns the consumer half of the input ring, the producer half of the output
/// ring, and the notifier bound to the backend. Methods that move data take
/// `&mut self`; callers sharing a transport must serialise access themselves.
#[derive(Debug)]
pub struct ConsoleTransport<N, S = ThreadYield> {
    input: RingConsumer,
    output: RingProducer,
    notifier: N,
    scheduler: S,
    config: ConsoleConfig,
}

impl<N: EventNotifier> ConsoleTransport<N, ThreadYield> {
    /// Builds a transport that yields the OS thread under backpressure.
    pub fn new(rings: GuestRings, notifier: N, config: ConsoleConfig) -> Self {
        Self::with_scheduler(rings, notifier, ThreadYield, config)
    }
}

impl<N: EventNotifier, S: Scheduler> ConsoleTransport<N, S> {
    pub fn with_scheduler(
        rings: GuestRings,
        notifier: N,
        scheduler: S,
        config: ConsoleConfig,
    ) -> Self {
        let GuestRings { input, output } = rings;
        Self {
            input,
            output,
            notifier,
            scheduler,
            config,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// The notifier bound to the backend, for code that must signal it directly.
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// True iff the input ring holds unread bytes. Side-effect free.
    pub fn poll_readable(&self) -> ConsoleResult<bool> {
        Ok(self.input.available_to_read()? > 0)
    }

    /// Blocks until a byte arrives, consumes it and tells the backend.
    ///
    /// There is no timeout: if the backend never produces, this never returns.
    pub fn read_one_byte(&mut self) -> ConsoleResult<u8> {
        loop {
            let epoch = self.park_epoch();
            if let Some(byte) = self.input.read_byte()? {
                // The backend may be waiting for space in the input ring.
                self.notifier.notify();
                return Ok(byte);
            }
            self.wait_for_input(epoch);
        }
    }

    /// Consumes whatever is available (up to `buf.len()`) without blocking.
    pub fn try_read(&mut self, buf: &mut [u8]) -> ConsoleResult<usize> {
        let count = self.input.read_slice(buf)?;
        if count > 0 {
            self.notifier.notify();
        }
        Ok(count)
    }

    /// Blocks until at least one byte is available, then drains as much as fits.
    pub fn read(&mut self, buf: &mut [u8]) -> ConsoleResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let epoch = self.park_epoch();
            let count = self.try_read(buf)?;
            if count > 0 {
                return Ok(count);
            }
            self.wait_for_input(epoch);
        }
    }

    /// One non-blocking attempt: publishes what fits and notifies if anything did.
    pub fn try_write(&mut self, data: &[u8]) -> ConsoleResult<usize> {
        let sent = self.output.write_slice(data)?;
        if sent > 0 {
            self.notifier.notify();
        }
        Ok(sent)
    }

    /// Publishes every byte of `data`, yielding while the output ring is full.
    ///
    /// Returns `data.len()`; short writes are absorbed by the retry loop.
    pub fn write_all(&mut self, data: &[u8]) -> ConsoleResult<usize> {
        let mut written = 0;
        let mut stalled: u32 = 0;
        while written < data.len() {
            let sent = self.try_write(&data[written..])?;
            if sent > 0 {
                written += sent;
                stalled = 0;
                continue;
            }

            stalled = stalled.saturating_add(1);
            if stalled == self.config.stall_warn_after {
                warn!(
                    port = %self.notifier.port(),
                    remaining = data.len() - written,
                    yields = stalled,
                    "console output ring still full; backend is not draining"
                );
            }
            trace!("console output ring full, yielding");
            self.scheduler.yield_now();
        }
        Ok(written)
    }

    /// Writes a single byte. No newline translation happens here.
    pub fn put_one_byte(&mut self, byte: u8) -> ConsoleResult<()> {
        self.write_all(&[byte]).map(|_| ())
    }

    fn park_epoch(&self) -> Option<u32> {
        match self.config.read_wait {
            ReadWait::Park => self.notifier.inbound_epoch(),
            ReadWait::Spin => None,
        }
    }

    fn wait_for_input(&self, epoch: Option<u32>) {
        match epoch {
            Some(epoch) => self.notifier.wait_inbound(epoch),
            None => std::hint::spin_loop(),
        }
    }
}

impl<N: EventNotifier, S: Scheduler> io::Write for ConsoleTransport<N, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(ConsoleTransport::write_all(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Bytes are visible to the backend as soon as the producer index moves.
        Ok(())
    }
}

impl<N: EventNotifier, S: Scheduler> io::Read for ConsoleTransport<N, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(ConsoleTransport::read(self, buf)?)
    }
}
