//! Line-oriented presentation over a [`ConsoleTransport`].

use crate::error::ConsoleResult;
use crate::notify::EventNotifier;
use crate::sched::{Scheduler, ThreadYield};
use crate::transport::ConsoleTransport;
use std::fmt;
use tracing::error;

/// Console that turns `\n` into `\r\n` (when [`ConsoleConfig::crlf`] is set)
/// before bytes reach the transport.
///
/// [`ConsoleConfig::crlf`]: crate::ConsoleConfig::crlf
#[derive(Debug)]
pub struct LineConsole<N, S = ThreadYield> {
    transport: ConsoleTransport<N, S>,
}

impl<N: EventNotifier, S: Scheduler> LineConsole<N, S> {
    pub fn new(transport: ConsoleTransport<N, S>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &ConsoleTransport<N, S> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut ConsoleTransport<N, S> {
        &mut self.transport
    }

    pub fn into_inner(self) -> ConsoleTransport<N, S> {
        self.transport
    }

    pub fn put_char(&mut self, byte: u8) -> ConsoleResult<()> {
        if byte == b'\n' && self.transport.config().crlf {
            return self.transport.write_all(b"\r\n").map(|_| ());
        }
        self.transport.put_one_byte(byte)
    }

    /// Writes `text`, translating line feeds, in as few ring updates as possible.
    pub fn puts(&mut self, text: &str) -> ConsoleResult<()> {
        if !self.transport.config().crlf {
            return self.transport.write_all(text.as_bytes()).map(|_| ());
        }
        let mut lines = text.split('\n');
        if let Some(first) = lines.next() {
            self.transport.write_all(first.as_bytes())?;
        }
        for line in lines {
            self.transport.write_all(b"\r\n")?;
            self.transport.write_all(line.as_bytes())?;
        }
        Ok(())
    }

    pub fn get_char(&mut self) -> ConsoleResult<u8> {
        self.transport.read_one_byte()
    }

    pub fn tstc(&self) -> ConsoleResult<bool> {
        self.transport.poll_readable()
    }

    /// Reads bytes up to (not including) `\n`, dropping any `\r`.
    pub fn read_line(&mut self) -> ConsoleResult<String> {
        let mut line = Vec::new();
        loop {
            match self.transport.read_one_byte()? {
                b'\n' => break,
                b'\r' => {}
                byte => line.push(byte),
            }
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

impl<N: EventNotifier, S: Scheduler> fmt::Write for LineConsole<N, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // `fmt::Error` carries nothing, so the cause is reported here.
        self.puts(s).map_err(|err| {
            error!(port = %self.transport.notifier().port(), %err, "console write failed");
            fmt::Error
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleConfig;
    use crate::notify::{EventChannel, EventEndpoint, EventPort};
    use console_ring::{BackendRings, ConsolePage, Geometry};
    use std::fmt::Write;
    use std::ptr::NonNull;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::Registry;

    fn console(crlf: bool) -> (LineConsole<EventEndpoint>, BackendRings) {
        let geometry = Geometry::new(64, 64).unwrap();
        let (guest, backend) = ConsolePage::new_shared(geometry).unwrap();
        let (events, _peer) = EventChannel::pair(EventPort::new(1).unwrap());
        let config = ConsoleConfig::default().with_crlf(crlf);
        (LineConsole::new(ConsoleTransport::new(guest, events, config)), backend)
    }

    fn output(backend: &mut BackendRings) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let n = backend.output.read_slice(&mut buf).unwrap();
        buf[..n].to_vec()
    }

    #[test]
    fn put_char_translates_line_feed() {
        let (mut console, mut backend) = console(true);
        for byte in b"a\nb" {
            console.put_char(*byte).unwrap();
        }
        assert_eq!(output(&mut backend), b"a\r\nb");
    }

    #[test]
    fn puts_translates_every_line_feed() {
        let (mut console, mut backend) = console(true);
        console.puts("\none\ntwo\n\n").unwrap();
        assert_eq!(output(&mut backend), b"\r\none\r\ntwo\r\n\r\n");
    }

    #[test]
    fn raw_mode_passes_bytes_through() {
        let (mut console, mut backend) = console(false);
        console.put_char(b'\n').unwrap();
        console.puts("x\ny").unwrap();
        assert_eq!(output(&mut backend), b"\nx\ny");
    }

    #[test]
    fn fmt_write_goes_through_puts() {
        let (mut console, mut backend) = console(true);
        writeln!(console, "boot {}", 3).unwrap();
        assert_eq!(output(&mut backend), b"boot 3\r\n");
    }

    /// Collects the targets of `ERROR` events.
    struct ErrorTargets(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> Layer<S> for ErrorTargets {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.lock().push(event.metadata().target().to_owned());
            }
        }
    }

    #[test]
    fn fmt_write_reports_protocol_violation() {
        #[repr(C, align(4096))]
        struct Page([u8; 4096]);

        // out_cons ahead of out_prod: the page claims more than the ring holds.
        let mut page = Box::new(Page([0u8; 4096]));
        page.0[3080..3084].copy_from_slice(&5u32.to_ne_bytes());
        let base = NonNull::new(page.0.as_mut_ptr()).unwrap();
        let guest = unsafe { ConsolePage::attach(base) }.unwrap();
        let (events, _peer) = EventChannel::pair(EventPort::new(2).unwrap());
        let mut console =
            LineConsole::new(ConsoleTransport::new(guest, events, ConsoleConfig::default()));

        let targets = Arc::new(Mutex::new(Vec::new()));
        let subscriber = Registry::default().with(ErrorTargets(Arc::clone(&targets)));
        let result = tracing::subscriber::with_default(subscriber, || writeln!(console, "boom"));

        assert_eq!(result, Err(fmt::Error));
        let targets = targets.lock();
        assert!(
            targets.iter().any(|t| t.starts_with("console_transport")),
            "{targets:?}"
        );
        drop(console);
        drop(page);
    }

    #[test]
    fn read_line_strips_carriage_returns() {
        let (mut console, mut backend) = console(true);
        assert_eq!(console.tstc(), Ok(false));
        backend.input.write_slice(b"ls -l\r\nrest").unwrap();
        assert_eq!(console.tstc(), Ok(true));
        assert_eq!(console.read_line().unwrap(), "ls -l");
        assert_eq!(console.get_char(), Ok(b'r'));
    }
}
