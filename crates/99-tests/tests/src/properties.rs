use console_backend::{BackendOptions, CaptureSink, ConsoleBackend};
use console_ring::{ConsolePage, Geometry};
use console_transport::{ConsoleConfig, ConsoleTransport, EventChannel, EventPort, LineConsole};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Step {
    Write(Vec<u8>),
    Read(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..24).prop_map(Step::Write),
        (0usize..24).prop_map(Step::Read),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Bytes leave the ring in the order they entered, no matter how the
    /// producer and consumer interleave, and occupancy never exceeds capacity.
    #[test]
    fn interleaved_steps_preserve_order(
        log2 in 1u32..6,
        start in any::<u32>(),
        steps in prop::collection::vec(step(), 1..64),
    ) {
        let capacity = 1usize << log2;
        let geometry = Geometry::new(capacity, capacity).unwrap();
        let (mut guest, mut backend) = ConsolePage::new_shared_at(geometry, start).unwrap();

        let mut sent = Vec::new();
        let mut received = Vec::new();
        for step in steps {
            match step {
                Step::Write(bytes) => {
                    let free = backend.input.free_space().unwrap() as usize;
                    let n = backend.input.write_slice(&bytes).unwrap();
                    prop_assert_eq!(n, bytes.len().min(free));
                    sent.extend_from_slice(&bytes[..n]);
                }
                Step::Read(len) => {
                    let mut buf = vec![0u8; len];
                    let n = guest.input.read_slice(&mut buf).unwrap();
                    received.extend_from_slice(&buf[..n]);
                }
            }
            let occupied = guest.input.available_to_read().unwrap() as usize;
            prop_assert!(occupied <= capacity);
            prop_assert_eq!(occupied, sent.len() - received.len());
        }
        prop_assert_eq!(&sent[..received.len()], &received[..]);
    }

    /// Every line feed reaches the backend as CR LF; nothing else changes.
    #[test]
    fn line_console_translates_only_line_feeds(text in "[a-z \n\t]{0,200}") {
        let geometry = Geometry::new(16, 16).unwrap();
        let (guest, rings) = ConsolePage::new_shared(geometry).unwrap();
        let (guest_events, backend_events) = EventChannel::pair(EventPort::new(1).unwrap());
        let transport = ConsoleTransport::with_scheduler(
            guest,
            guest_events,
            console_transport::YieldFn(|| {}),
            ConsoleConfig::default(),
        );
        let mut console = LineConsole::new(transport);
        let mut backend = ConsoleBackend::new(rings, backend_events, BackendOptions::default());
        let mut sink = CaptureSink::new();

        // Pieces of at most 7 bytes expand to at most 14, so nothing stalls.
        for piece in text.as_bytes().chunks(7) {
            let piece = std::str::from_utf8(piece).unwrap();
            console.puts(piece).unwrap();
            backend.drain_output(&mut sink).unwrap();
        }

        let expected = text.replace('\n', "\r\n");
        prop_assert_eq!(sink.contents(), expected.into_bytes());
    }
}
