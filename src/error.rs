use core::fmt;

/// Errors returned synchronously by the SHTP core.
///
/// Inbound protocol anomalies never produce an `Error` — they are reported asynchronously via
/// [`Event`](crate::Event) instead. `Error` only covers things a caller did wrong, or a HAL
/// failure that aborts the call in progress.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A channel index was out of range, or a payload exceeded the maximum size the HAL or the
    /// reassembly buffer can hold.
    BadParam,

    /// The HAL's `write` returned a negative status, aborting the in-progress cargo.
    ///
    /// The wrapped value is the raw status the HAL reported.
    Hal(i32),

    /// `Endpoint::open` could not acquire a free instance slot.
    NoInstance,

    /// The HAL's `open` call failed.
    HalOpenFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadParam => f.write_str("invalid channel or oversized payload"),
            Error::Hal(status) => write!(f, "HAL write failed with status {}", status),
            Error::NoInstance => f.write_str("no free endpoint instance slot"),
            Error::HalOpenFailed => f.write_str("HAL open failed"),
        }
    }
}
