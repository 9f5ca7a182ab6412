/// How a blocking read waits for the input ring to become non-empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadWait {
    /// Busy-poll the ring. Works everywhere, including before any scheduler exists.
    #[default]
    Spin,
    /// Park on the notifier's inbound signal when it supports blocking, and
    /// re-check the ring after every wake. Falls back to spinning otherwise.
    Park,
}

/// Session-wide tunables for a console transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub read_wait: ReadWait,
    /// Translate `\n` into `\r\n` in [`LineConsole`](crate::LineConsole).
    pub crlf: bool,
    /// Consecutive fruitless yields before a stalled write is reported once.
    /// Zero disables the report. Writes never give up either way.
    pub stall_warn_after: u32,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            read_wait: ReadWait::Spin,
            crlf: true,
            stall_warn_after: 100_000,
        }
    }
}

impl ConsoleConfig {
    pub fn with_read_wait(mut self, read_wait: ReadWait) -> Self {
        self.read_wait = read_wait;
        self
    }

    pub fn with_crlf(mut self, crlf: bool) -> Self {
        self.crlf = crlf;
        self
    }

    pub fn with_stall_warn_after(mut self, yields: u32) -> Self {
        self.stall_warn_after = yields;
        self
    }
}
