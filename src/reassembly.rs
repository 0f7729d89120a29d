//! Inbound reassembly state: the single in-flight payload an [`Endpoint`](crate::Endpoint) may be
//! assembling at any time.

/// State for the one in-flight inbound payload an endpoint may be assembling.
///
/// `in_remaining == 0` iff no assembly is in progress. A fragment's own declared length never
/// reveals the eventual total cargo size (only the sender's own chunk), so `in_remaining` is not a
/// precise wire-declared countdown; the caller (`Endpoint::rx_assemble`) derives it from whether
/// the just-appended fragment filled a complete transfer, and it is non-zero for exactly as long as
/// more fragments may still be coming.
pub(crate) struct Reassembly<const PAYLOAD_BUF: usize> {
    /// Non-zero while more fragments may still be expected, zero once the assembly is complete or
    /// idle.
    in_remaining: u16,
    /// Channel the in-flight payload arrived on.
    in_channel: u8,
    /// Bytes accumulated so far.
    in_cursor: u16,
    /// HAL timestamp of the first fragment of the in-flight payload.
    in_timestamp: u64,
    /// Accumulated payload bytes.
    in_payload: [u8; PAYLOAD_BUF],
}

impl<const PAYLOAD_BUF: usize> Reassembly<PAYLOAD_BUF> {
    pub const fn new() -> Self {
        Reassembly {
            in_remaining: 0,
            in_channel: 0,
            in_cursor: 0,
            in_timestamp: 0,
            in_payload: [0; PAYLOAD_BUF],
        }
    }

    /// Whether an assembly is currently in progress.
    pub fn in_progress(&self) -> bool {
        self.in_remaining > 0
    }

    /// The channel of the in-flight assembly. Only meaningful while `in_progress()`.
    pub fn channel(&self) -> u8 {
        self.in_channel
    }

    /// Bytes still expected before the payload is complete.
    pub fn remaining(&self) -> u16 {
        self.in_remaining
    }

    /// Bytes accumulated so far in the in-flight assembly.
    pub fn cursor(&self) -> u16 {
        self.in_cursor
    }

    /// Starts a fresh assembly on `channel`, timestamped with `timestamp_us`.
    pub fn start(&mut self, channel: u8, timestamp_us: u64) {
        self.in_channel = channel;
        self.in_timestamp = timestamp_us;
        self.in_cursor = 0;
    }

    /// Appends `data` to the in-flight payload and updates the remaining indicator.
    ///
    /// `new_remaining` is non-zero iff the caller determined more fragments may still follow this
    /// one (see the type-level doc comment).
    pub fn append(&mut self, data: &[u8], new_remaining: u16) {
        let start = usize::from(self.in_cursor);
        self.in_payload[start..start + data.len()].copy_from_slice(data);
        self.in_cursor += data.len() as u16;
        self.in_remaining = new_remaining;
    }

    /// Abandons the in-progress assembly, resetting to idle.
    pub fn abandon(&mut self) {
        self.in_remaining = 0;
        self.in_cursor = 0;
    }

    /// The accumulated payload bytes and the timestamp of the first fragment, once complete.
    ///
    /// Only meaningful once `remaining() == 0` after a call to `append`.
    pub fn finished_payload(&self) -> (&[u8], u64) {
        (&self.in_payload[..usize::from(self.in_cursor)], self.in_timestamp)
    }

}
