use thiserror::Error;

use console_ring::RingError;

use crate::discovery::HvmParam;

pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Failures while turning discovered parameters into a live transport.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The hypervisor reports no console event channel: the console is simply
    /// not configured for this guest.
    #[error("no console channel is configured")]
    NotConfigured,

    #[error("querying {param:?} failed with status {status}")]
    ParamQuery { param: HvmParam, status: i32 },

    #[error("console channel is present but malformed: {0}")]
    Malformed(&'static str),

    #[error("console page rejected: {0}")]
    Ring(#[from] RingError),
}

impl SetupError {
    /// True when the error means "no console", which callers treat as absence.
    pub fn is_absent(&self) -> bool {
        matches!(self, SetupError::NotConfigured)
    }
}

/// Failures of an established session. Only protocol violations remain:
/// backpressure and empty input are resolved internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("console protocol violation: {0}")]
    Protocol(#[from] RingError),
}

impl From<ConsoleError> for std::io::Error {
    fn from(err: ConsoleError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}
