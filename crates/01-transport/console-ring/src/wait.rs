//! Atomic wait/notify shims backing the hosted [`Doorbell`](crate::Doorbell).
//!
//! Native targets park on the `atomic-wait` crate (futex-backed where
//! available). Loom builds yield to the model scheduler instead, and wasm32
//! builds without a futex spin, so callers must always loop on the value they
//! are waiting for.

#[cfg(feature = "loom")]
use loom::sync::atomic::AtomicU32;
#[cfg(not(feature = "loom"))]
use std::sync::atomic::AtomicU32;

/// Result of attempting to wait on an atomic location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult {
    /// The caller parked and was woken (possibly spuriously).
    Woken,
    /// The caller returned without parking; the value may or may not have changed.
    NotParked,
}

#[cfg(feature = "loom")]
mod imp {
    use super::{AtomicU32, WaitResult};

    #[inline]
    pub(crate) fn wait_u32(atomic: &AtomicU32, expected: u32) -> WaitResult {
        let _ = (atomic, expected);
        loom::thread::yield_now();
        WaitResult::NotParked
    }

    #[inline]
    pub(crate) fn wake_all(atomic: &AtomicU32) {
        let _ = atomic;
    }
}

#[cfg(all(not(feature = "loom"), target_arch = "wasm32"))]
mod imp {
    use super::{AtomicU32, WaitResult};

    #[inline]
    pub(crate) fn wait_u32(atomic: &AtomicU32, expected: u32) -> WaitResult {
        let _ = (atomic, expected);
        core::hint::spin_loop();
        WaitResult::NotParked
    }

    #[inline]
    pub(crate) fn wake_all(atomic: &AtomicU32) {
        let _ = atomic;
    }
}

#[cfg(all(not(feature = "loom"), not(target_arch = "wasm32")))]
mod imp {
    use super::{AtomicU32, WaitResult};

    #[inline]
    pub(crate) fn wait_u32(atomic: &AtomicU32, expected: u32) -> WaitResult {
        atomic_wait::wait(atomic, expected);
        WaitResult::Woken
    }

    #[inline]
    pub(crate) fn wake_all(atomic: &AtomicU32) {
        atomic_wait::wake_all(atomic as *const AtomicU32);
    }
}

/// Blocks the caller while `atomic` still holds `expected`, or until a wakeup occurs.
///
/// Spurious returns are possible on every backend.
#[inline]
pub fn wait_u32(atomic: &AtomicU32, expected: u32) -> WaitResult {
    imp::wait_u32(atomic, expected)
}

/// Wakes all waiters parked on `atomic`.
#[inline]
pub fn wake_all(atomic: &AtomicU32) {
    imp::wake_all(atomic)
}
