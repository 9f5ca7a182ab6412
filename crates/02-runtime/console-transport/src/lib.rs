//! Guest-side paravirtualized console transport.
//!
//! * [`ConsoleTransport`] – byte-level read/write/poll over the shared rings,
//!   with yield-and-retry under backpressure.
//! * [`LineConsole`] – `\n` → `\r\n` presentation and `core::fmt::Write`.
//! * [`EventNotifier`] – fire-and-forget peer signal; [`EventChannel`] is the
//!   hosted implementation, [`HypercallNotifier`] wraps a platform primitive.
//! * [`Scheduler`] – the single "yield" hook used while the output ring is full.
//! * [`ConsoleParams`] – discovery of the page and event channel.

mod config;
mod discovery;
mod error;
mod line;
mod notify;
mod sched;
mod transport;

pub use config::{ConsoleConfig, ReadWait};
pub use discovery::{ConsoleParams, HvmParam, ParamSource, ParamStatus};
pub use error::{ConsoleError, ConsoleResult, SetupError};
pub use line::LineConsole;
pub use notify::{EventChannel, EventEndpoint, EventNotifier, EventPort, HypercallNotifier};
pub use sched::{Scheduler, ThreadYield, YieldFn};
pub use transport::ConsoleTransport;

pub use console_ring::{BackendRings, ConsolePage, Geometry, GuestRings, RingError};
