//! Hosted stand-in for the privileged console daemon.
//!
//! The backend consumes the output ring and produces into the input ring,
//! i.e. it holds the opposite halves from the guest. Every mutation that could
//! unblock the guest is followed by a notify.

use crate::error::BackendResult;
use console_ring::BackendRings;
use console_transport::{EventEndpoint, EventNotifier};
use std::collections::VecDeque;
use std::io::Write;
use std::thread;
use std::time::Duration;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendOptions {
    /// Largest number of bytes drained from the output ring in one step.
    pub drain_chunk: usize,
    /// Pause after every drained chunk, to emulate a slow daemon.
    pub drain_delay: Duration,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            drain_chunk: 256,
            drain_delay: Duration::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Bytes taken from the output ring.
    pub drained: u64,
    /// Bytes placed into the input ring.
    pub fed: u64,
    /// Notifications sent to the guest.
    pub notified: u64,
    /// Times the service loop parked on its doorbell.
    pub parks: u64,
}

pub struct ConsoleBackend {
    rings: BackendRings,
    events: EventEndpoint,
    options: BackendOptions,
    pending: VecDeque<u8>,
    stats: BackendStats,
}

impl ConsoleBackend {
    pub fn new(rings: BackendRings, events: EventEndpoint, options: BackendOptions) -> Self {
        Self {
            rings,
            events,
            options,
            pending: VecDeque::new(),
            stats: BackendStats::default(),
        }
    }

    pub fn events(&self) -> &EventEndpoint {
        &self.events
    }

    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    /// Queues bytes for the guest; they enter the input ring as space allows.
    pub fn queue_input(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
    }

    pub fn pending_input(&self) -> usize {
        self.pending.len()
    }

    /// Moves everything currently in the output ring into `sink`.
    pub fn drain_output<W: Write>(&mut self, sink: &mut W) -> BackendResult<usize> {
        let mut buf = vec![0u8; self.options.drain_chunk.max(1)];
        let mut total = 0;
        loop {
            let count = self.rings.output.read_slice(&mut buf)?;
            if count == 0 {
                break;
            }
            sink.write_all(&buf[..count])?;
            total += count;
            if !self.options.drain_delay.is_zero() {
                thread::sleep(self.options.drain_delay);
            }
        }
        if total > 0 {
            sink.flush()?;
            self.stats.drained += total as u64;
            trace!(bytes = total, "drained guest output");
            self.notify_guest();
        }
        Ok(total)
    }

    /// Pushes queued input into the input ring; returns how many bytes entered.
    pub fn push_input(&mut self) -> BackendResult<usize> {
        let mut total = 0;
        while !self.pending.is_empty() {
            let sent = {
                let (head, _) = self.pending.as_slices();
                self.rings.input.write_slice(head)?
            };
            if sent == 0 {
                break;
            }
            self.pending.drain(..sent);
            total += sent;
        }
        if total > 0 {
            self.stats.fed += total as u64;
            trace!(bytes = total, "fed guest input");
            self.notify_guest();
        }
        Ok(total)
    }

    /// One service pass: drain output, then feed input. Returns bytes moved.
    pub fn service<W: Write>(&mut self, sink: &mut W) -> BackendResult<usize> {
        let drained = self.drain_output(sink)?;
        let fed = self.push_input()?;
        Ok(drained + fed)
    }

    pub(crate) fn park(&mut self, epoch: u32) {
        self.stats.parks += 1;
        self.events.wait(epoch);
    }

    fn notify_guest(&mut self) {
        self.stats.notified += 1;
        self.events.notify();
    }
}
