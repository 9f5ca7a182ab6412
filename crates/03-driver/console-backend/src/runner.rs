use crate::backend::{BackendStats, ConsoleBackend};
use crate::error::{BackendError, BackendResult};
use console_transport::EventEndpoint;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// A backend serviced on its own thread.
///
/// The thread parks on the backend's doorbell and wakes when the guest
/// notifies, when input is sent, or when shutdown is requested.
pub struct BackendHandle {
    stop: Arc<AtomicBool>,
    input: Sender<Vec<u8>>,
    wake: EventEndpoint,
    thread: Option<JoinHandle<BackendResult<BackendStats>>>,
}

impl BackendHandle {
    pub fn spawn<W>(backend: ConsoleBackend, sink: W) -> std::io::Result<Self>
    where
        W: Write + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let (input, inbox) = crossbeam_channel::unbounded();
        let wake = backend.events().clone();
        let thread = thread::Builder::new()
            .name("console-backend".into())
            .spawn({
                let stop = Arc::clone(&stop);
                move || service_loop(backend, sink, inbox, &stop)
            })?;
        Ok(Self {
            stop,
            input,
            wake,
            thread: Some(thread),
        })
    }

    /// Queues bytes for the guest's input ring.
    ///
    /// Returns false, and drops the bytes, when the backend thread has already exited.
    pub fn send_input(&self, bytes: impl Into<Vec<u8>>) -> bool {
        match self.input.send(bytes.into()) {
            Ok(()) => {
                self.wake.interrupt();
                true
            }
            Err(rejected) => {
                warn!(bytes = rejected.0.len(), "console backend has exited; input dropped");
                false
            }
        }
    }

    /// Stops the thread after a final pass and returns its counters.
    pub fn shutdown(mut self) -> BackendResult<BackendStats> {
        self.join()
    }

    fn join(&mut self) -> BackendResult<BackendStats> {
        self.stop.store(true, Ordering::Release);
        self.wake.interrupt();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| BackendError::Panicked)?,
            None => Ok(BackendStats::default()),
        }
    }
}

impl Drop for BackendHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(err) = self.join() {
                error!(%err, "console backend stopped with an error");
            }
        }
    }
}

fn service_loop<W: Write>(
    mut backend: ConsoleBackend,
    mut sink: W,
    inbox: Receiver<Vec<u8>>,
    stop: &AtomicBool,
) -> BackendResult<BackendStats> {
    debug!("console backend started");
    loop {
        // Epoch before `stop`: a shutdown landing after this snapshot rings the
        // bell, so the park below returns and the next pass sees it.
        let epoch = backend.events().epoch();
        // Anything published before `stop` was set is visible to this pass.
        let stopping = stop.load(Ordering::Acquire);
        loop {
            match inbox.try_recv() {
                Ok(bytes) => backend.queue_input(&bytes),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        let moved = backend.service(&mut sink)?;
        if moved > 0 {
            continue;
        }
        if stopping {
            break;
        }
        backend.park(epoch);
    }
    let stats = backend.stats();
    debug!(
        drained = stats.drained,
        fed = stats.fed,
        undelivered = backend.pending_input(),
        "console backend stopped"
    );
    Ok(stats)
}
