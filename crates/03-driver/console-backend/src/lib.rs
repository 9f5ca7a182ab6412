//! Hosted console backend.
//!
//! Plays the role of the privileged console daemon for a guest transport:
//! it drains the output ring into an [`std::io::Write`] sink and feeds queued
//! bytes into the input ring, notifying the guest after each mutation.
//! [`ConsoleBackend`] is driven by hand; [`BackendHandle`] runs it on a thread.

mod backend;
mod error;
mod runner;
mod sink;

pub use backend::{BackendOptions, BackendStats, ConsoleBackend};
pub use error::{BackendError, BackendResult};
pub use runner::BackendHandle;
pub use sink::CaptureSink;
