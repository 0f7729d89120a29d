/// Diagnostic counters maintained by an [`Endpoint`](crate::Endpoint).
///
/// These are not part of the wire protocol; they exist purely so a host application can observe
/// how often each protocol anomaly has occurred, read through
/// [`Endpoint::counters`](crate::Endpoint::counters).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    /// Inbound frames addressed to an out-of-range channel.
    pub rx_bad_chan: u32,
    /// Inbound transfers shorter than the frame header.
    pub rx_short_fragments: u32,
    /// Inbound payloads that declared a size larger than the reassembly buffer.
    pub rx_too_large_payloads: u32,
    /// In-progress assemblies abandoned due to an incompatible fragment.
    pub rx_interrupted_payloads: u32,
    /// `send` calls rejected for targeting an out-of-range channel.
    pub tx_bad_chan: u32,
    /// Cargoes aborted mid-transmission by a HAL write error.
    pub tx_discards: u32,
    /// `send` calls rejected for exceeding the maximum outbound payload size.
    pub tx_too_large_payloads: u32,
}
