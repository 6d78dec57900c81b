//! Error types for the OpenFlow engine.

use thiserror::Error;

/// Errors raised while framing or decoding wire data.
///
/// Any of these is fatal to the connection that produced the bytes; no
/// partially decoded message is ever surfaced alongside one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended before the expected structure was complete.
    #[error("truncated input: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum bytes required.
        expected: usize,
        /// Actual bytes available.
        actual: usize,
    },

    /// A frame header declared a length smaller than the header itself.
    #[error("declared frame length {0} is smaller than the header")]
    LengthTooSmall(u16),

    /// A frame header declared a length above the configured maximum.
    #[error("declared frame length {declared} exceeds the maximum {max}")]
    FrameTooLarge {
        /// Length declared by the peer.
        declared: u16,
        /// Configured ceiling.
        max: u16,
    },

    /// The header version byte names no supported protocol version.
    #[error("unsupported protocol version 0x{0:02x}")]
    UnsupportedVersion(u8),

    /// The header version differs from the version negotiated for the
    /// connection.
    #[error("version mismatch: negotiated 0x{negotiated:02x}, header carries 0x{header:02x}")]
    VersionMismatch {
        /// Version agreed during hello negotiation.
        negotiated: u8,
        /// Version found in the frame header.
        header: u8,
    },

    /// The type byte is not a legal message type for the version.
    #[error("unknown message type 0x{0:02x}")]
    UnknownType(u8),

    /// A new connection's first frame was not a hello.
    #[error("expected a hello frame, got message type 0x{0:02x}")]
    ExpectedHello(u8),

    /// A message body did not parse as its type requires.
    #[error("malformed {0} body")]
    MalformedBody(&'static str),
}

/// Why hello negotiation could not agree on a version.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationFailure {
    /// The peer's version bitmap shares no version with the local set.
    #[error("no version in the peer bitmap is locally supported")]
    NoBitmapOverlap,

    /// Header-version fallback produced a version outside the local set.
    #[error("peer header version 0x{0:02x} has no locally supported counterpart")]
    UnsupportedHeaderVersion(u8),
}

/// Errors from the engine runtime.
#[cfg(feature = "runtime")]
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to bind the listener.
    #[error("bind failed: {0}")]
    BindFailed(String),

    /// The configured supported-version set is empty or all-unknown.
    #[error("no usable protocol version configured")]
    NoUsableVersion,

    /// Engine is shut down.
    #[error("engine shut down")]
    Shutdown,

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
