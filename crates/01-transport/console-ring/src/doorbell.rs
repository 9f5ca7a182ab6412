//! Coalescing wake-up counter.
//!
//! A doorbell is the hosted stand-in for one direction of an event channel.
//! Ringing bumps a sequence counter and wakes every parked waiter. A waiter
//! snapshots the counter (its *epoch*) before re-checking ring state and then
//! parks only while the counter still equals that epoch, so a ring that races
//! with the check is never lost, and any number of rings between two waits
//! collapse into a single wake-up.

use crate::wait;
#[cfg(feature = "loom")]
use loom::sync::atomic::{AtomicU32, Ordering};
#[cfg(not(feature = "loom"))]
use std::sync::atomic::{AtomicU32, Ordering};

/// Futex-backed, coalescing notification counter.
#[derive(Debug)]
pub struct Doorbell {
    seq: AtomicU32,
}

impl Default for Doorbell {
    fn default() -> Self {
        Self::new()
    }
}

impl Doorbell {
    pub fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
        }
    }

    /// Current epoch. Take this *before* inspecting the state the bell guards.
    pub fn epoch(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }

    /// Bumps the epoch and wakes every waiter.
    pub fn ring(&self) {
        self.seq.fetch_add(1, Ordering::Release);
        wait::wake_all(&self.seq);
    }

    /// Parks until the epoch differs from `epoch`.
    ///
    /// Returns immediately if the bell was rung after `epoch` was observed.
    pub fn wait(&self, epoch: u32) {
        while self.seq.load(Ordering::Acquire) == epoch {
            wait::wait_u32(&self.seq, epoch);
        }
    }

    /// Returns true when the bell was rung since `epoch` was observed.
    pub fn rung_since(&self, epoch: u32) -> bool {
        self.epoch() != epoch
    }
}


#[cfg(all(test, feature = "loom"))]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    /// Loom: a ring issued between the epoch snapshot and the park is never lost.
    #[test]
    #[ignore]
    fn slow_loom_doorbell_no_lost_wakeup() {
        loom::model(|| {
            let bell = Arc::new(Doorbell::new());
            let flag = Arc::new(AtomicU32::new(0));

            let ringer = {
                let bell = Arc::clone(&bell);
                let flag = Arc::clone(&flag);
                thread::spawn(move || {
                    flag.store(1, Ordering::Release);
                    bell.ring();
                })
            };

            loop {
                let epoch = bell.epoch();
                if flag.load(Ordering::Acquire) == 1 {
                    break;
                }
                bell.wait(epoch);
            }

            ringer.join().unwrap();
        });
    }
}
