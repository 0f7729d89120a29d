//! The endpoint: owns a HAL instance plus all per-channel and reassembly state, and implements
//! outbound fragmentation and inbound reassembly.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::channel::{new_channel_table, Channel, Listener, MAX_CHANNELS};
use crate::counters::Counters;
use crate::error::Error;
use crate::event::{Event, EventSink};
use crate::frame::{FrameHeader, HEADER_LEN};
use crate::hal::Hal;
use crate::reassembly::Reassembly;

/// Maximum number of endpoints that may be open at the same time.
///
/// Embedded targets size their HAL singleton (and any interrupt wiring behind it) for a known,
/// small number of instances; this bound turns [`Error::NoInstance`] into a reachable condition
/// instead of a dead enum variant. The exact value is not mandated by the wire protocol, only the
/// existence of a cap.
const MAX_INSTANCES: usize = 4;

static OPEN_INSTANCES: AtomicUsize = AtomicUsize::new(0);

fn acquire_slot() -> Result<(), Error> {
    let mut current = OPEN_INSTANCES.load(Ordering::Relaxed);
    loop {
        if current >= MAX_INSTANCES {
            return Err(Error::NoInstance);
        }
        match OPEN_INSTANCES.compare_exchange_weak(
            current,
            current + 1,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return Ok(()),
            Err(actual) => current = actual,
        }
    }
}

fn release_slot() {
    OPEN_INSTANCES.fetch_sub(1, Ordering::AcqRel);
}

/// An open SHTP endpoint.
///
/// Generic over the HAL implementation `H` and three buffer sizes that must match `H`'s own
/// associated constants (checked with `debug_assert_eq!` in [`open`](Endpoint::open); see the
/// module documentation for why these can't simply be derived from `H` on stable Rust):
///
/// * `TX_BUF` — outbound staging buffer, must equal `H::MAX_TRANSFER_OUT`.
/// * `RX_BUF` — inbound transfer buffer, must equal `H::MAX_TRANSFER_IN`.
/// * `PAYLOAD_BUF` — reassembly buffer, must equal `H::MAX_PAYLOAD_IN`.
pub struct Endpoint<'a, H, const TX_BUF: usize, const RX_BUF: usize, const PAYLOAD_BUF: usize>
where
    H: Hal,
{
    hal: H,
    channels: [Channel<'a>; MAX_CHANNELS],
    event_sink: Option<&'a mut dyn EventSink>,
    tx_buf: [u8; TX_BUF],
    rx_buf: [u8; RX_BUF],
    reassembly: Reassembly<PAYLOAD_BUF>,
    counters: Counters,
}

impl<'a, H, const TX_BUF: usize, const RX_BUF: usize, const PAYLOAD_BUF: usize>
    Endpoint<'a, H, TX_BUF, RX_BUF, PAYLOAD_BUF>
where
    H: Hal,
{
    /// Opens an endpoint on top of `hal`, bringing the bus up.
    ///
    /// Fails with [`Error::NoInstance`] if [`MAX_INSTANCES`] endpoints are already open, or with
    /// [`Error::HalOpenFailed`] if `hal.open()` returns `Err`.
    pub fn open(mut hal: H) -> Result<Self, Error> {
        debug_assert_eq!(TX_BUF, H::MAX_TRANSFER_OUT, "TX_BUF must match Hal::MAX_TRANSFER_OUT");
        debug_assert_eq!(RX_BUF, H::MAX_TRANSFER_IN, "RX_BUF must match Hal::MAX_TRANSFER_IN");
        debug_assert_eq!(PAYLOAD_BUF, H::MAX_PAYLOAD_IN, "PAYLOAD_BUF must match Hal::MAX_PAYLOAD_IN");
        debug_assert!(RX_BUF > HEADER_LEN, "RX_BUF must hold at least one header");
        debug_assert!(TX_BUF > HEADER_LEN, "TX_BUF must hold at least one header");

        acquire_slot()?;

        if hal.open().is_err() {
            release_slot();
            error!("HAL open failed");
            return Err(Error::HalOpenFailed);
        }

        Ok(Endpoint {
            hal,
            channels: new_channel_table(),
            event_sink: None,
            tx_buf: [0; TX_BUF],
            rx_buf: [0; RX_BUF],
            reassembly: Reassembly::new(),
            counters: Counters::default(),
        })
    }

    /// Closes the endpoint, releasing the bus and its instance slot.
    pub fn close(mut self) {
        self.hal.close();
        release_slot();
    }

    /// Registers the sink that receives [`Event`]s reported by this endpoint.
    pub fn set_event_callback(&mut self, sink: &'a mut dyn EventSink) {
        self.event_sink = Some(sink);
    }

    fn emit(&mut self, event: Event) {
        warn!("shtp: {}", event);
        if let Some(sink) = self.event_sink.as_deref_mut() {
            sink.on_event(event);
        }
    }

    /// Registers `listener` to receive reassembled payloads delivered on `channel`.
    ///
    /// Fails with [`Error::BadParam`] for channel 0 (reserved) or any channel `>= MAX_CHANNELS`.
    pub fn listen(&mut self, channel: u8, listener: &'a mut dyn Listener) -> Result<(), Error> {
        if channel == 0 || usize::from(channel) >= MAX_CHANNELS {
            return Err(Error::BadParam);
        }
        self.channels[usize::from(channel)].listener = Some(listener);
        Ok(())
    }

    /// The diagnostic counters accumulated since this endpoint was opened.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Fragments and transmits `payload` on `channel`.
    ///
    /// Blocks only on a busy HAL: each time [`Hal::write`] reports the transport is busy (returns
    /// `0`), this pumps [`service`](Endpoint::service) once before retrying the same frame, giving
    /// an inbound transfer a chance to drain and free up the bus.
    pub fn send(&mut self, channel: u8, payload: &[u8]) -> Result<(), Error> {
        if usize::from(channel) >= MAX_CHANNELS {
            self.counters.tx_bad_chan += 1;
            self.emit(Event::BadTxChannel);
            return Err(Error::BadParam);
        }
        if payload.len() > H::MAX_PAYLOAD_OUT {
            self.counters.tx_too_large_payloads += 1;
            return Err(Error::BadParam);
        }

        let ch = usize::from(channel);
        let max_chunk = TX_BUF - HEADER_LEN;
        let mut cursor = 0;
        let mut continuation = false;

        while cursor < payload.len() {
            let chunk = core::cmp::min(payload.len() - cursor, max_chunk);
            let frame_len = chunk + HEADER_LEN;
            let seq = self.channels[ch].next_out_seq;

            FrameHeader {
                length: frame_len as u16,
                continuation,
                channel,
                sequence: seq,
            }
            .write(&mut self.tx_buf[..HEADER_LEN]);
            self.tx_buf[HEADER_LEN..frame_len].copy_from_slice(&payload[cursor..cursor + chunk]);
            self.channels[ch].next_out_seq = seq.wrapping_add(1);

            loop {
                let status = self.hal.write(&self.tx_buf[..frame_len]);
                if status > 0 {
                    break;
                } else if status == 0 {
                    self.service();
                } else {
                    self.counters.tx_discards += 1;
                    self.emit(Event::TxDiscard);
                    return Err(Error::Hal(status));
                }
            }

            cursor += chunk;
            continuation = true;
        }

        Ok(())
    }

    /// Pumps the HAL once: reads at most one transfer and, if one was available, runs it through
    /// reassembly.
    ///
    /// Call this periodically (or let [`send`](Endpoint::send) pump it while waiting on a busy
    /// HAL) so inbound data doesn't back up behind a stalled bus.
    pub fn service(&mut self) {
        let (len, timestamp_us) = self.hal.read(&mut self.rx_buf);
        if len <= 0 {
            return;
        }
        self.rx_assemble(len as usize, timestamp_us);
    }

    /// Runs one received transfer through header parsing, sequence tracking, and reassembly.
    fn rx_assemble(&mut self, len: usize, timestamp_us: u64) {
        if len < HEADER_LEN {
            self.counters.rx_short_fragments += 1;
            self.emit(Event::ShortFragment);
            return;
        }

        let hdr = FrameHeader::parse(&self.rx_buf[..HEADER_LEN]);

        if usize::from(hdr.channel) >= MAX_CHANNELS {
            self.counters.rx_bad_chan += 1;
            self.emit(Event::BadRxChannel);
            return;
        }
        let ch = usize::from(hdr.channel);

        if hdr.sequence != self.channels[ch].next_in_seq {
            self.emit(Event::BadSequence);
        }

        let payload_len = usize::from(hdr.length);
        if payload_len < HEADER_LEN {
            self.counters.rx_short_fragments += 1;
            self.emit(Event::ShortFragment);
            return;
        }
        let chunk = payload_len - HEADER_LEN;

        if self.reassembly.in_progress() {
            let fits = usize::from(self.reassembly.cursor()) + chunk <= PAYLOAD_BUF;
            let compatible = hdr.continuation
                && hdr.channel == self.reassembly.channel()
                && hdr.sequence == self.channels[ch].next_in_seq
                && fits;
            if !compatible {
                self.emit(Event::BadFragment);
                self.reassembly.abandon();
                self.counters.rx_interrupted_payloads += 1;
                self.emit(Event::InterruptedPayload);
            }
        }

        self.channels[ch].next_in_seq = hdr.sequence.wrapping_add(1);

        if !self.reassembly.in_progress() {
            if hdr.continuation {
                // A continuation with nothing to attach to; drop it rather than starting a bogus
                // assembly from a mid-cargo fragment.
                self.emit(Event::BadFragment);
                return;
            }
            if payload_len > H::MAX_PAYLOAD_IN {
                self.counters.rx_too_large_payloads += 1;
                self.emit(Event::TooLargePayloads);
                return;
            }
            self.reassembly.start(hdr.channel, timestamp_us);
        }

        let clamped_len = core::cmp::min(len, payload_len);
        let body = &self.rx_buf[HEADER_LEN..clamped_len];
        // A fragment that didn't fill a complete transfer is the last one of its cargo; one that
        // did might be followed by more (see `Reassembly`'s doc comment).
        let more_expected = chunk >= RX_BUF - HEADER_LEN;
        let new_remaining: u16 = if more_expected { chunk as u16 } else { 0 };
        self.reassembly.append(body, new_remaining);

        if !self.reassembly.in_progress() {
            let (payload, ts) = self.reassembly.finished_payload();
            if let Some(listener) = self.channels[ch].listener.as_deref_mut() {
                listener.on_payload(hdr.channel, payload, ts);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::vec::Vec;

    struct LoopbackHal {
        inbox: VecDeque<(Vec<u8>, u64)>,
        outbox: Vec<Vec<u8>>,
        busy_writes_remaining: u32,
        next_write_error: Option<i32>,
    }

    impl LoopbackHal {
        fn new() -> Self {
            LoopbackHal {
                inbox: VecDeque::new(),
                outbox: Vec::new(),
                busy_writes_remaining: 0,
                next_write_error: None,
            }
        }

        fn push_inbound(&mut self, bytes: &[u8], timestamp_us: u64) {
            self.inbox.push_back((bytes.to_vec(), timestamp_us));
        }
    }

    impl Hal for LoopbackHal {
        const MAX_TRANSFER_OUT: usize = 64;
        const MAX_TRANSFER_IN: usize = 64;
        const MAX_PAYLOAD_OUT: usize = 256;
        const MAX_PAYLOAD_IN: usize = 256;

        fn open(&mut self) -> Result<(), Error> {
            Ok(())
        }

        fn close(&mut self) {}

        fn write(&mut self, frame: &[u8]) -> i32 {
            if self.busy_writes_remaining > 0 {
                self.busy_writes_remaining -= 1;
                return 0;
            }
            if let Some(status) = self.next_write_error.take() {
                return status;
            }
            self.outbox.push(frame.to_vec());
            frame.len() as i32
        }

        fn read(&mut self, buf: &mut [u8]) -> (i32, u64) {
            match self.inbox.pop_front() {
                Some((bytes, ts)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    (bytes.len() as i32, ts)
                }
                None => (0, 0),
            }
        }
    }

    type TestEndpoint<'a> = Endpoint<'a, LoopbackHal, 64, 64, 256>;

    fn reset_instance_counter() {
        OPEN_INSTANCES.store(0, Ordering::SeqCst);
    }

    #[test]
    fn s1_single_fragment_send() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        ep.send(2, &[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(ep.hal.outbox, vec![vec![0x07, 0x00, 0x02, 0x00, 0x01, 0x02, 0x03]]);
    }

    #[test]
    fn s2_two_fragment_send() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        let payload: Vec<u8> = (0..80u32).map(|b| b as u8).collect();
        ep.send(3, &payload).unwrap();

        assert_eq!(ep.hal.outbox.len(), 2);
        assert_eq!(&ep.hal.outbox[0][..4], &[0x40, 0x00, 0x03, 0x00]);
        assert_eq!(&ep.hal.outbox[0][4..], &payload[0..60]);
        assert_eq!(&ep.hal.outbox[1][..4], &[0x18, 0x80, 0x03, 0x01]);
        assert_eq!(&ep.hal.outbox[1][4..], &payload[60..80]);
    }

    #[test]
    fn s3_reassembles_split_payload() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();

        let payload: Vec<u8> = (0..80u32).map(|b| b as u8).collect();
        let mut frame1 = vec![0x40, 0x00, 0x03, 0x00];
        frame1.extend_from_slice(&payload[0..60]);
        let mut frame2 = vec![0x18, 0x80, 0x03, 0x01];
        frame2.extend_from_slice(&payload[60..80]);

        ep.hal.push_inbound(&frame1, 1000);
        ep.hal.push_inbound(&frame2, 1001);

        let mut delivered: Option<(u8, Vec<u8>, u64)> = None;
        let mut listener = |channel: u8, data: &[u8], ts: u64| {
            delivered = Some((channel, data.to_vec(), ts));
        };
        ep.listen(3, &mut listener).unwrap();

        ep.service();
        assert!(delivered.is_none(), "must not deliver after only the first fragment");
        ep.service();

        let (channel, data, ts) = delivered.expect("payload should have been delivered");
        assert_eq!(channel, 3);
        assert_eq!(data, payload);
        assert_eq!(ts, 1000, "timestamp is that of the first fragment");
    }

    #[test]
    fn s4_short_fragment_is_counted_and_ignored() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        ep.hal.push_inbound(&[0x02, 0x00, 0x01], 5);

        let mut called = false;
        let mut listener = |_: u8, _: &[u8], _: u64| called = true;
        ep.listen(1, &mut listener).unwrap();

        ep.service();
        assert!(!called);
        assert_eq!(ep.counters().rx_short_fragments, 1);
    }

    #[test]
    fn s5_oversized_declared_payload_is_rejected() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        // length field (masked) = 300, well past MAX_PAYLOAD_IN = 256.
        let mut frame = vec![0x2C, 0x01, 0x02, 0x00];
        frame.extend_from_slice(&[0u8; 10]);
        ep.hal.push_inbound(&frame, 7);

        ep.service();
        assert!(!ep.reassembly.in_progress());
        assert_eq!(ep.counters().rx_too_large_payloads, 1);
    }

    #[test]
    fn s6_incompatible_continuation_interrupts_and_restarts() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();

        // Frame A: channel 3, seq 0, non-continuation, 60-byte chunk (fills a full transfer).
        let mut frame_a = vec![0x40, 0x00, 0x03, 0x00];
        frame_a.extend_from_slice(&[0xAA; 60]);
        // Frame B: channel 3, seq 1, non-continuation (breaks compatibility), 50-byte chunk.
        let mut frame_b = vec![0x36, 0x00, 0x03, 0x01];
        frame_b.extend_from_slice(&[0xBB; 50]);

        ep.hal.push_inbound(&frame_a, 10);
        ep.hal.push_inbound(&frame_b, 11);

        let mut deliveries = 0u32;
        let mut last: Vec<u8> = Vec::new();
        let mut listener = |_: u8, data: &[u8], _: u64| {
            deliveries += 1;
            last = data.to_vec();
        };
        ep.listen(3, &mut listener).unwrap();

        ep.service();
        ep.service();

        assert_eq!(deliveries, 1);
        assert_eq!(last, vec![0xBB; 50]);
        assert_eq!(ep.counters().rx_interrupted_payloads, 1);
    }

    #[test]
    fn s7_busy_write_pumps_service_then_retries() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        ep.hal.busy_writes_remaining = 1;
        ep.hal.push_inbound(&[0x05, 0x00, 0x04, 0x00, 0x09], 3);

        let mut received = None;
        let mut listener = |channel: u8, data: &[u8], _: u64| {
            received = Some((channel, data.to_vec()));
        };
        ep.listen(4, &mut listener).unwrap();

        ep.send(2, &[0x01]).unwrap();

        assert_eq!(received, Some((4, vec![0x09])));
        assert_eq!(ep.hal.outbox.len(), 1);
    }

    #[test]
    fn back_to_back_sends_deliver_in_call_order() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        ep.send(5, &[0x01]).unwrap();
        ep.send(5, &[0x02]).unwrap();

        let mut delivered: Vec<Vec<u8>> = Vec::new();
        let mut listener = |_: u8, data: &[u8], _: u64| delivered.push(data.to_vec());
        ep.listen(5, &mut listener).unwrap();

        for frame in ep.hal.outbox.clone() {
            let ts = frame[3] as u64;
            ep.hal.push_inbound(&frame, ts);
        }
        ep.service();
        ep.service();

        assert_eq!(delivered, vec![vec![0x01], vec![0x02]]);
    }

    #[test]
    fn bad_rx_channel_is_counted_and_diagnosed() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        // channel byte = 200, well past MAX_CHANNELS.
        ep.hal.push_inbound(&[0x05, 0x00, 200, 0x00, 0x09], 1);

        let mut events = Vec::new();
        let mut sink = |event: Event| events.push(event);
        ep.set_event_callback(&mut sink);

        ep.service();

        assert_eq!(ep.counters().rx_bad_chan, 1);
        assert!(events.contains(&Event::BadRxChannel));
    }

    #[test]
    fn bad_tx_channel_is_rejected() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        let err = ep.send(200, &[1, 2, 3]).unwrap_err();
        assert_eq!(err, Error::BadParam);
        assert_eq!(ep.counters().tx_bad_chan, 1);
    }

    #[test]
    fn oversized_outbound_payload_is_rejected() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        let payload = [0u8; 257];
        let err = ep.send(1, &payload).unwrap_err();
        assert_eq!(err, Error::BadParam);
        assert_eq!(ep.counters().tx_too_large_payloads, 1);
    }

    #[test]
    fn listen_rejects_channel_zero_and_out_of_range() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        let mut listener = |_: u8, _: &[u8], _: u64| {};
        assert_eq!(ep.listen(0, &mut listener).unwrap_err(), Error::BadParam);
        assert_eq!(ep.listen(200, &mut listener).unwrap_err(), Error::BadParam);
    }

    #[test]
    fn permissive_sequence_tracking_still_delivers_and_diagnoses() {
        reset_instance_counter();
        let mut ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        // seq field is 5 instead of the expected 0; still processed and next_in_seq follows it.
        ep.hal.push_inbound(&[0x07, 0x00, 0x02, 0x05, 1, 2, 3], 1);

        let mut received = None;
        let mut listener = |channel: u8, data: &[u8], _: u64| {
            received = Some((channel, data.to_vec()));
        };
        ep.listen(2, &mut listener).unwrap();

        let mut events = Vec::new();
        let mut sink = |event: Event| events.push(event);
        ep.set_event_callback(&mut sink);

        ep.service();

        assert_eq!(received, Some((2, vec![1, 2, 3])));
        assert_eq!(ep.channels[2].next_in_seq, 6);
        assert!(events.contains(&Event::BadSequence));
    }

    #[test]
    fn endpoint_instance_cap_is_enforced() {
        reset_instance_counter();
        let mut held = Vec::new();
        for _ in 0..MAX_INSTANCES {
            held.push(Endpoint::<LoopbackHal, 64, 64, 256>::open(LoopbackHal::new()).unwrap());
        }
        let err = Endpoint::<LoopbackHal, 64, 64, 256>::open(LoopbackHal::new()).unwrap_err();
        assert_eq!(err, Error::NoInstance);

        for ep in held {
            ep.close();
        }
        let ep: TestEndpoint = Endpoint::open(LoopbackHal::new()).unwrap();
        ep.close();
    }
}
