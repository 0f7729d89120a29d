/// The hardware abstraction layer (HAL) the SHTP core sits on top of.
///
/// A platform integration implements this trait once per target bus (SPI, I²C, UART, ...). The
/// core only ever calls `open`, `close`, `write`, and `read` — it does not know anything about the
/// underlying transport.
///
/// # Contract
///
/// * [`open`](Hal::open) brings the bus up. Returning `Err` aborts
///   [`Endpoint::open`](crate::Endpoint::open) before any endpoint state is created.
/// * [`close`](Hal::close) releases the bus. Called exactly once, from
///   [`Endpoint::close`](crate::Endpoint::close).
/// * [`write`](Hal::write) attempts to transmit one complete frame (header + payload chunk,
///   never more than `MAX_TRANSFER_OUT` bytes). It must be all-or-nothing at the frame boundary:
///   implementations must not report partial acceptance of a frame. It returns the number of
///   bytes accepted (`> 0`) on success, `0` if the transport is currently busy (the caller will
///   retry the identical frame after pumping [`Endpoint::service`](crate::Endpoint::service)
///   once), or a negative status on a fatal transport error.
/// * [`read`](Hal::read) is non-blocking: it returns `(0, _)` immediately when no frame is
///   currently available, or `(len, timestamp)` with `len > 0` when transport data (a frame, or a
///   short/oversized prefix of one) is available. `timestamp` is a monotonic, implementation
///   defined microsecond clock reading taken when the data became available.
pub trait Hal {
    /// Maximum number of bytes (including the 4-byte header) this HAL can write in one `write`
    /// call.
    const MAX_TRANSFER_OUT: usize;

    /// Maximum number of bytes (including the 4-byte header) this HAL can return from one `read`
    /// call.
    const MAX_TRANSFER_IN: usize;

    /// Maximum payload size (excluding headers) this HAL supports on outbound cargoes.
    const MAX_PAYLOAD_OUT: usize;

    /// Maximum payload size (excluding headers) this HAL supports on inbound cargoes.
    const MAX_PAYLOAD_IN: usize;

    /// Brings the underlying bus up.
    fn open(&mut self) -> Result<(), crate::Error>;

    /// Releases the underlying bus. Infallible: integrations that can fail to close should log and
    /// otherwise treat it as best-effort.
    fn close(&mut self);

    /// Attempts to transmit `frame`, a complete SHTP frame no longer than `MAX_TRANSFER_OUT`.
    ///
    /// Returns the number of bytes accepted on success, `0` if busy, or a negative status on
    /// error.
    fn write(&mut self, frame: &[u8]) -> i32;

    /// Non-blocking read of one transfer into `buf`.
    ///
    /// Returns `(0, _)` when nothing is available. Returns `(len, timestamp_us)` with `len > 0`
    /// when `len` bytes of `buf` were filled; `timestamp_us` is the monotonic microsecond reading
    /// taken when the data arrived.
    fn read(&mut self, buf: &mut [u8]) -> (i32, u64);
}
