/// Maximum number of channels a single [`Endpoint`](crate::Endpoint) multiplexes.
///
/// Channel 0 is reserved for protocol control: the endpoint processes its frames (sequence
/// tracking, reassembly) like any other channel but refuses to register a listener on it.
pub const MAX_CHANNELS: usize = 8;

/// Receives reassembled payloads delivered on a channel.
///
/// A blanket implementation is provided for any `FnMut(u8, &[u8], u64)`, so a plain closure
/// capturing whatever state is needed can be registered directly with
/// [`Endpoint::listen`](crate::Endpoint::listen) — there is no separate cookie parameter, the
/// closure's captures play that role.
pub trait Listener {
    /// Called synchronously from `service` once a full payload has been reassembled.
    ///
    /// `channel` is the channel the payload arrived on, `payload` is the concatenation of every
    /// fragment starting with the non-continuation frame that began the assembly, and
    /// `timestamp_us` is the HAL-reported timestamp of that first fragment.
    fn on_payload(&mut self, channel: u8, payload: &[u8], timestamp_us: u64);
}

impl<F> Listener for F
where
    F: FnMut(u8, &[u8], u64),
{
    fn on_payload(&mut self, channel: u8, payload: &[u8], timestamp_us: u64) {
        self(channel, payload, timestamp_us)
    }
}

/// Per-channel state: sequence counters and an optional listener.
pub(crate) struct Channel<'a> {
    /// Monotonic modulo-256 counter, incremented after each outbound fragment sent on this
    /// channel.
    pub next_out_seq: u8,
    /// Expected inbound sequence number for the next fragment on this channel.
    pub next_in_seq: u8,
    /// The registered listener, if any. `None` for an unregistered channel and always `None` for
    /// channel 0.
    pub listener: Option<&'a mut dyn Listener>,
}

impl<'a> Channel<'a> {
    pub const fn new() -> Self {
        Channel {
            next_out_seq: 0,
            next_in_seq: 0,
            listener: None,
        }
    }
}

/// Creates the fixed-size channel table with every slot zero-initialized.
///
/// Array-of-`const fn` initialization (`[Channel::new(); N]`) isn't available here since
/// `Channel` holds a non-`Copy` `Option<&mut dyn Listener>`; this helper sidesteps that with
/// `core::array::from_fn`.
pub(crate) fn new_channel_table<'a>() -> [Channel<'a>; MAX_CHANNELS] {
    core::array::from_fn(|_| Channel::new())
}
