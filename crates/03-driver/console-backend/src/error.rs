use thiserror::Error;

use console_ring::RingError;

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("console ring error: {0}")]
    Ring(#[from] RingError),

    #[error("console sink failed: {0}")]
    Sink(#[from] std::io::Error),

    #[error("backend thread panicked")]
    Panicked,
}
