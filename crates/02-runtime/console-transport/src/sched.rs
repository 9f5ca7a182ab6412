//! Host scheduler hook invoked while the output ring is full.

use std::fmt;

/// Relinquishes the processor briefly, then returns to the caller.
pub trait Scheduler {
    fn yield_now(&self);
}

/// Yields the current OS thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadYield;

impl Scheduler for ThreadYield {
    fn yield_now(&self) {
        std::thread::yield_now();
    }
}

/// Scheduler backed by a platform primitive such as a `sched_op(yield)` hypercall.
#[derive(Clone, Copy)]
pub struct YieldFn<F>(pub F);

impl<F: Fn()> Scheduler for YieldFn<F> {
    fn yield_now(&self) {
        (self.0)()
    }
}

impl<F> fmt::Debug for YieldFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("YieldFn")
    }
}
