//! Runs a guest console session against an in-process backend.
//!
//! Guest output is drained to stdout by the backend thread; diagnostics go to
//! stderr so the two never interleave.

use std::{fmt::Write as _, io, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use console_backend::{BackendHandle, BackendOptions, ConsoleBackend};
use console_ring::{ConsolePage, Geometry};
use console_transport::{
    ConsoleConfig, ConsoleTransport, EventChannel, EventPort, LineConsole, ReadWait,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WaitMode {
    Spin,
    Park,
}

impl From<WaitMode> for ReadWait {
    fn from(mode: WaitMode) -> Self {
        match mode {
            WaitMode::Spin => ReadWait::Spin,
            WaitMode::Park => ReadWait::Park,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Loop a guest console through a hosted backend")]
struct Args {
    /// Line written to the console
    #[arg(long, default_value = "hello from the guest console")]
    message: String,

    /// How many times the line is written
    #[arg(long, default_value_t = 1)]
    repeat: usize,

    /// Line fed to the guest's input ring and read back
    #[arg(long)]
    input: Option<String>,

    /// How a blocked read waits for input
    #[arg(long, value_enum, default_value_t = WaitMode::Spin)]
    read_wait: WaitMode,

    /// Ring capacity in bytes for both directions (power of two); standard layout if unset
    #[arg(long)]
    capacity: Option<usize>,

    /// Backend pause after every drained chunk, in microseconds
    #[arg(long, default_value_t = 0)]
    drain_delay_us: u64,

    /// Largest chunk the backend drains at once
    #[arg(long, default_value_t = 256)]
    drain_chunk: usize,

    /// Send line feeds untranslated
    #[arg(long)]
    no_crlf: bool,

    /// Fruitless yields before a stalled write is reported (0 disables)
    #[arg(long, default_value_t = 100_000)]
    stall_warn_after: u32,

    /// Event channel port number
    #[arg(long, default_value_t = 1)]
    port: u32,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let geometry = match args.capacity {
        Some(capacity) => Geometry::new(capacity, capacity)
            .with_context(|| format!("invalid ring capacity {capacity}"))?,
        None => Geometry::STANDARD,
    };
    let Some(port) = EventPort::new(args.port) else {
        bail!("event channel port must be non-zero");
    };

    let (guest_rings, backend_rings) =
        ConsolePage::new_shared(geometry).context("failed to allocate console page")?;
    let (guest_events, backend_events) = EventChannel::pair(port);

    let options = BackendOptions {
        drain_chunk: args.drain_chunk,
        drain_delay: Duration::from_micros(args.drain_delay_us),
    };
    let backend = ConsoleBackend::new(backend_rings, backend_events, options);
    let handle = BackendHandle::spawn(backend, io::stdout())
        .context("failed to start console backend thread")?;

    let config = ConsoleConfig::default()
        .with_read_wait(args.read_wait.into())
        .with_crlf(!args.no_crlf)
        .with_stall_warn_after(args.stall_warn_after);
    let mut console = LineConsole::new(ConsoleTransport::new(guest_rings, guest_events, config));
    info!(
        %port,
        input_capacity = geometry.input_capacity(),
        output_capacity = geometry.output_capacity(),
        "console session started"
    );

    for _ in 0..args.repeat {
        writeln!(console, "{}", args.message).context("console write failed")?;
    }

    if let Some(line) = &args.input {
        if !handle.send_input(format!("{line}\n")) {
            handle.shutdown().context("console backend failed")?;
            bail!("console backend exited before input could be delivered");
        }
        let echoed = console.read_line().context("console read failed")?;
        writeln!(console, "echo: {echoed}").context("console write failed")?;
    }

    let stats = handle.shutdown().context("console backend failed")?;
    info!(
        drained = stats.drained,
        fed = stats.fed,
        notified = stats.notified,
        parks = stats.parks,
        "console session finished"
    );
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}
