//! The Sensor Hub Transport Protocol (SHTP) core.
//!
//! SHTP is a fragmenting, multi-channel, sequence-numbered framing layer that carries
//! variable-length application payloads over a byte-oriented hardware transport (SPI, I²C, or
//! UART) between a host and a motion-sensor hub.
//!
//! This crate is runtime and hardware-agnostic: it does not talk to any bus directly. Instead, a
//! platform integration provides an implementation of [`Hal`], the small trait this crate uses for
//! byte-level I/O and timestamps. The only part that interacts with the outside world is
//! [`Endpoint`], which owns the HAL along with all framing and reassembly state.
//!
//! [`Hal`]: trait.Hal.html
//! [`Endpoint`]: struct.Endpoint.html

#![no_std]

#[macro_use]
mod log;

mod channel;
mod counters;
mod endpoint;
mod error;
mod event;
mod frame;
mod hal;
mod reassembly;

pub use self::channel::{Listener, MAX_CHANNELS};
pub use self::counters::Counters;
pub use self::endpoint::Endpoint;
pub use self::error::Error;
pub use self::event::{Event, EventSink};
pub use self::hal::Hal;
