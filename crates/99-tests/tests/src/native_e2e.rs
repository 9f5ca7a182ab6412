#![cfg(all(test, not(target_arch = "wasm32")))]

use console_backend::{BackendHandle, BackendOptions, CaptureSink, ConsoleBackend};
use console_ring::{ConsolePage, Geometry};
use console_transport::{
    ConsoleConfig, ConsoleTransport, EventChannel, EventEndpoint, EventNotifier, EventPort,
    LineConsole, ReadWait,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::thread;
use std::time::Duration;

const PORT: u32 = 3;

fn session(
    geometry: Geometry,
    config: ConsoleConfig,
    options: BackendOptions,
) -> (ConsoleTransport<EventEndpoint>, ConsoleBackend) {
    let (guest, rings) = ConsolePage::new_shared(geometry).expect("console page");
    let (guest_events, backend_events) = EventChannel::pair(EventPort::new(PORT).unwrap());
    (
        ConsoleTransport::new(guest, guest_events, config),
        ConsoleBackend::new(rings, backend_events, options),
    )
}

fn tiny(capacity: usize) -> Geometry {
    Geometry::new(capacity, capacity).expect("power-of-two capacity")
}

fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen()).collect()
}

#[test]
fn native_output_stream_arrives_in_order() {
    const LEN: usize = 64 * 1024;
    let options = BackendOptions {
        drain_chunk: 5,
        drain_delay: Duration::ZERO,
    };
    let (mut transport, backend) = session(tiny(16), ConsoleConfig::default(), options);
    let sink = CaptureSink::new();
    let handle = BackendHandle::spawn(backend, sink.clone()).unwrap();

    let payload = random_bytes(LEN, 0x5EED);
    let mut rng = StdRng::seed_from_u64(7);
    let mut offset = 0;
    while offset < LEN {
        let step = rng.gen_range(1..=40).min(LEN - offset);
        assert_eq!(transport.write_all(&payload[offset..offset + step]), Ok(step));
        offset += step;
    }

    let stats = handle.shutdown().unwrap();
    assert_eq!(stats.drained, LEN as u64);
    assert_eq!(sink.contents(), payload);
}

#[test]
fn native_write_larger_than_ring_survives_slow_backend() {
    let options = BackendOptions {
        drain_chunk: 4,
        drain_delay: Duration::from_micros(200),
    };
    let (mut transport, backend) = session(tiny(8), ConsoleConfig::default(), options);
    let sink = CaptureSink::new();
    let handle = BackendHandle::spawn(backend, sink.clone()).unwrap();

    let message = b"the quick brown fox jumps over the lazy dog".repeat(3);
    assert_eq!(transport.write_all(&message), Ok(message.len()));

    handle.shutdown().unwrap();
    assert_eq!(sink.contents(), message);
}

#[test]
fn native_standard_page_session() {
    let (mut transport, backend) =
        session(Geometry::STANDARD, ConsoleConfig::default(), BackendOptions::default());
    let sink = CaptureSink::new();
    let handle = BackendHandle::spawn(backend, sink.clone()).unwrap();

    let payload = random_bytes(10_000, 42);
    assert_eq!(transport.write_all(&payload), Ok(payload.len()));
    handle.send_input(b"abc".to_vec());

    let mut buf = [0u8; 3];
    let mut received = 0;
    while received < buf.len() {
        received += transport.read(&mut buf[received..]).unwrap();
    }
    assert_eq!(&buf, b"abc");

    handle.shutdown().unwrap();
    assert_eq!(sink.contents(), payload);
}

#[test]
fn native_line_echo_round_trip() {
    for read_wait in [ReadWait::Spin, ReadWait::Park] {
        let config = ConsoleConfig::default().with_read_wait(read_wait);
        let (transport, backend) = session(tiny(32), config, BackendOptions::default());
        let sink = CaptureSink::new();
        let handle = BackendHandle::spawn(backend, sink.clone()).unwrap();
        let mut console = LineConsole::new(transport);

        handle.send_input(b"status\r\n".to_vec());
        let line = console.read_line().unwrap();
        assert_eq!(line, "status");
        writeln!(console, "{line}: ok").unwrap();

        handle.shutdown().unwrap();
        assert_eq!(sink.contents(), b"status: ok\r\n", "{read_wait:?}");
    }
}

#[test]
fn native_parked_reader_wakes_on_late_input() {
    let config = ConsoleConfig::default().with_read_wait(ReadWait::Park);
    let (mut transport, backend) = session(tiny(8), config, BackendOptions::default());
    let handle = BackendHandle::spawn(backend, CaptureSink::new()).unwrap();

    let reader = thread::spawn(move || {
        let byte = transport.read_one_byte().unwrap();
        (byte, transport)
    });
    thread::sleep(Duration::from_millis(25));
    handle.send_input(b"!".to_vec());

    let (byte, transport) = reader.join().unwrap();
    assert_eq!(byte, b'!');
    assert_eq!(transport.poll_readable(), Ok(false));
    handle.shutdown().unwrap();
}

#[test]
fn native_input_larger_than_ring_is_delivered_in_order() {
    let config = ConsoleConfig::default().with_read_wait(ReadWait::Park);
    let (mut transport, backend) = session(tiny(4), config, BackendOptions::default());
    let handle = BackendHandle::spawn(backend, CaptureSink::new()).unwrap();

    let payload = random_bytes(1000, 9);
    handle.send_input(payload.clone());
    let mut received = Vec::with_capacity(payload.len());
    let mut buf = [0u8; 3];
    while received.len() < payload.len() {
        let n = transport.read(&mut buf).unwrap();
        received.extend_from_slice(&buf[..n]);
    }
    assert_eq!(received, payload);
    assert_eq!(handle.shutdown().unwrap().fed, 1000);
}

#[test]
fn notifications_coalesce_without_losing_bytes() {
    let (mut transport, mut backend) =
        session(tiny(64), ConsoleConfig::default(), BackendOptions::default());
    let epoch = backend.events().epoch();
    for byte in b"0123456789" {
        transport.put_one_byte(*byte).unwrap();
    }
    assert!(backend.events().signalled_since(epoch));

    let mut sink = CaptureSink::new();
    assert_eq!(backend.service(&mut sink).unwrap(), 10);
    assert_eq!(sink.contents(), b"0123456789");

    // A guest that sees the drain notification re-checks and finds space.
    let guest_epoch = transport.notifier().inbound_epoch().unwrap();
    assert_eq!(backend.service(&mut sink).unwrap(), 0);
    assert_eq!(transport.notifier().inbound_epoch(), Some(guest_epoch));
}
