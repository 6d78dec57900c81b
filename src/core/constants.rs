//! Protocol constants shared by every OpenFlow version.
//!
//! These values are fixed by the wire protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// WIRE HEADER
// =============================================================================

/// Size of the fixed OpenFlow header (version + type + length + xid).
pub const HEADER_SIZE: usize = 8;

/// Byte offset of the big-endian u16 length field within the header.
pub const LENGTH_FIELD_OFFSET: usize = 2;

/// Minimum buffered bytes required before the length field can be read.
pub const LENGTH_FIELD_END: usize = 4;

// =============================================================================
// HELLO ELEMENTS
// =============================================================================

/// Hello element type carrying a version bitmap.
pub const HELLO_ELEM_VERSIONBITMAP: u16 = 1;

/// Size of a hello element TLV header (type + length).
pub const HELLO_ELEM_HEADER_SIZE: usize = 4;

// =============================================================================
// ENGINE DEFAULTS
// =============================================================================

/// Default TCP port switches connect to.
pub const DEFAULT_LISTEN_PORT: u16 = 6653;

/// Default keepalive / polling period.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Default cap on frames deferred during handshake.
pub const DEFAULT_SETUP_QUEUE_LIMIT: usize = 32;

/// Default maximum accepted frame length (the u16 length-field ceiling).
pub const DEFAULT_MAX_FRAME_LENGTH: u16 = u16::MAX;
