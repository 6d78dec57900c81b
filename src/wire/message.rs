//! The typed message model.
//!
//! A [`Message`] is one decoded protocol unit: the common [`Header`] plus a
//! [`Body`]. The body is typed for every message the engine itself builds or
//! interprets; all other legal traffic is carried opaquely in
//! [`Body::Other`] and handed to consumers as-is.

use crate::core::{PortDescriptor, SwitchDescriptor};

use super::header::Header;
use super::hello::HelloBody;

/// Body of a protocol error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    /// Error category.
    pub error_type: u16,
    /// Reason code within the category.
    pub code: u16,
    /// Offending data echoed back, if any.
    pub data: Vec<u8>,
}

/// Body of a set-config message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetConfigBody {
    /// Fragmentation handling flags.
    pub flags: u16,
    /// Bytes of each missed packet sent to the controller.
    pub miss_send_len: u16,
}

/// A decoded message body.
///
/// Typed variants cover the control plane the engine drives itself; the
/// rest of the catalog flows through [`Body::Other`] untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Version negotiation greeting.
    Hello(HelloBody),
    /// Protocol error report.
    Error(ErrorBody),
    /// Liveness probe carrying an opaque payload.
    EchoRequest(Vec<u8>),
    /// Liveness probe answer echoing the request payload.
    EchoReply(Vec<u8>),
    /// Request for switch identity and capabilities.
    FeaturesRequest,
    /// Switch identity and capabilities.
    FeaturesReply(SwitchDescriptor),
    /// Switch configuration update.
    SetConfig(SetConfigBody),
    /// Request for the switch's port descriptions.
    PortDescRequest,
    /// Port descriptions.
    PortDescReply(Vec<PortDescriptor>),
    /// Periodic flow statistics poll.
    FlowStatsRequest,
    /// Any other legal message, body kept as raw bytes.
    Other(Vec<u8>),
}

/// One decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The common header as found (or to be written) on the wire.
    pub header: Header,
    /// The decoded body.
    pub body: Body,
}

impl Message {
    /// Create a message from its parts.
    pub fn new(header: Header, body: Body) -> Self {
        Self { header, body }
    }

    /// The header version byte.
    pub fn version(&self) -> u8 {
        self.header.version
    }

    /// The header message type byte.
    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    /// The transaction id.
    pub fn xid(&self) -> u32 {
        self.header.xid
    }
}
