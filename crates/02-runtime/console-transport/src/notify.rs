//! Event notification between the guest and the console backend.
//!
//! A notification carries no payload and is never acknowledged: it only tells
//! the peer to re-check ring state. Senders must notify after every mutation
//! that could unblock the peer; extra notifications are harmless because the
//! peer re-validates the rings instead of counting events.

use console_ring::Doorbell;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::trace;

/// Identifier of the event channel bound to the console. Zero means "none"
/// and is therefore unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventPort(NonZeroU32);

impl EventPort {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for EventPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evtchn:{}", self.0)
    }
}

/// Fire-and-forget signal to the peer bound to [`EventNotifier::port`].
///
/// Implementations that can also block the local side until the peer signals
/// back override [`EventNotifier::inbound_epoch`] and
/// [`EventNotifier::wait_inbound`]; the transport then parks readers instead
/// of spinning.
pub trait EventNotifier: Send + Sync {
    fn port(&self) -> EventPort;

    /// Signals the peer. Never blocks, never fails.
    fn notify(&self);

    /// Snapshot of inbound signals, or `None` when this notifier cannot block.
    fn inbound_epoch(&self) -> Option<u32> {
        None
    }

    /// Blocks until an inbound signal arrives after `epoch` was observed.
    fn wait_inbound(&self, epoch: u32) {
        let _ = epoch;
    }
}

impl<T: EventNotifier + ?Sized> EventNotifier for Arc<T> {
    fn port(&self) -> EventPort {
        (**self).port()
    }

    fn notify(&self) {
        (**self).notify()
    }

    fn inbound_epoch(&self) -> Option<u32> {
        (**self).inbound_epoch()
    }

    fn wait_inbound(&self, epoch: u32) {
        (**self).wait_inbound(epoch)
    }
}

/// Notifier backed by a platform send primitive, e.g. an event-channel hypercall.
pub struct HypercallNotifier<F> {
    port: EventPort,
    send: F,
}

impl<F> HypercallNotifier<F>
where
    F: Fn(EventPort) + Send + Sync,
{
    pub fn new(port: EventPort, send: F) -> Self {
        Self { port, send }
    }
}

impl<F> fmt::Debug for HypercallNotifier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HypercallNotifier")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl<F> EventNotifier for HypercallNotifier<F>
where
    F: Fn(EventPort) + Send + Sync,
{
    fn port(&self) -> EventPort {
        self.port
    }

    fn notify(&self) {
        trace!(port = %self.port, "notify remote");
        (self.send)(self.port)
    }
}

/// Hosted event channel: one doorbell per direction.
pub struct EventChannel;

impl EventChannel {
    /// Builds the `(guest, backend)` endpoints of one channel.
    pub fn pair(port: EventPort) -> (EventEndpoint, EventEndpoint) {
        let to_guest = Arc::new(Doorbell::new());
        let to_backend = Arc::new(Doorbell::new());
        let guest = EventEndpoint {
            port,
            local: Arc::clone(&to_guest),
            remote: Arc::clone(&to_backend),
        };
        let backend = EventEndpoint {
            port,
            local: to_backend,
            remote: to_guest,
        };
        (guest, backend)
    }
}

/// One side of a hosted [`EventChannel`]: rings the peer's doorbell, parks on its own.
#[derive(Clone, Debug)]
pub struct EventEndpoint {
    port: EventPort,
    local: Arc<Doorbell>,
    remote: Arc<Doorbell>,
}

impl EventEndpoint {
    /// Inbound epoch; snapshot it before checking ring state.
    pub fn epoch(&self) -> u32 {
        self.local.epoch()
    }

    /// Parks until the peer (or [`EventEndpoint::interrupt`]) signals after `epoch`.
    pub fn wait(&self, epoch: u32) {
        self.local.wait(epoch)
    }

    /// Returns true when an inbound signal arrived after `epoch`.
    pub fn signalled_since(&self, epoch: u32) -> bool {
        self.local.rung_since(epoch)
    }

    /// Wakes this endpoint's own waiter, e.g. to deliver a shutdown request.
    pub fn interrupt(&self) {
        self.local.ring()
    }
}

impl EventNotifier for EventEndpoint {
    fn port(&self) -> EventPort {
        self.port
    }

    fn notify(&self) {
        trace!(port = %self.port, "notify remote");
        self.remote.ring()
    }

    fn inbound_epoch(&self) -> Option<u32> {
        Some(self.epoch())
    }

    fn wait_inbound(&self, epoch: u32) {
        self.wait(epoch)
    }
}
