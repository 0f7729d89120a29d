use core::fmt;

/// An asynchronous, non-fatal protocol anomaly reported while assembling or transmitting frames.
///
/// Events never fail a call; they are reported to whatever [`EventSink`] is currently registered
/// via [`Endpoint::set_event_callback`](crate::Endpoint::set_event_callback), purely for
/// diagnostics, and bump the matching [`Counters`](crate::Counters) field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Event {
    /// A received transfer was shorter than the 4-byte frame header.
    ShortFragment,

    /// A non-continuation frame declared a payload larger than the reassembly buffer.
    TooLargePayloads,

    /// A received frame addressed a channel outside `[0, MAX_CHANNELS)`.
    BadRxChannel,

    /// `send` was called with a channel outside `[0, MAX_CHANNELS)`.
    BadTxChannel,

    /// A received frame was structurally incompatible with the in-progress assembly (or, with no
    /// assembly in progress, was itself a continuation frame).
    BadFragment,

    /// A received frame's sequence number did not match the channel's expected next value.
    ///
    /// This is diagnostic only: the frame is still processed, and `next_in_seq` follows the
    /// sender's value.
    BadSequence,

    /// An in-progress assembly was abandoned because an incompatible frame arrived before it
    /// completed.
    InterruptedPayload,

    /// A cargo was aborted mid-transmission because the HAL reported a write error.
    TxDiscard,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Event::ShortFragment => "fragment shorter than the frame header",
            Event::TooLargePayloads => "payload exceeds the reassembly buffer",
            Event::BadRxChannel => "inbound frame addressed an out-of-range channel",
            Event::BadTxChannel => "send() targeted an out-of-range channel",
            Event::BadFragment => "fragment incompatible with in-progress assembly",
            Event::BadSequence => "fragment sequence number did not match the expected value",
            Event::InterruptedPayload => "in-progress assembly abandoned by an incompatible frame",
            Event::TxDiscard => "cargo aborted mid-transmission by a HAL write error",
        })
    }
}

/// Receives [`Event`]s reported by an [`Endpoint`](crate::Endpoint).
///
/// A blanket implementation is provided for any `FnMut(Event)`, so a plain closure capturing
/// whatever state is needed can be registered directly with
/// [`Endpoint::set_event_callback`](crate::Endpoint::set_event_callback) — there is no separate
/// cookie parameter, the closure's captures play that role.
pub trait EventSink {
    /// Called synchronously from `send` or `service` when a protocol anomaly is detected.
    fn on_event(&mut self, event: Event);
}

impl<F> EventSink for F
where
    F: FnMut(Event),
{
    fn on_event(&mut self, event: Event) {
        self(event)
    }
}
