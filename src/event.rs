//! Published events and their stable names.
//!
//! Every message the engine decodes or transmits surfaces to consumers as a
//! named event. The naming scheme is a compatibility contract — flow
//! managers, topology discovery, and statistics collectors all subscribe by
//! these exact strings:
//!
//! ```text
//! ofcore.v0x01.messages.in.ofpt_packet_in
//! ofcore.v0x04.messages.out.ofpt_flow_mod
//! ofcore.hello_failed
//! ```

use std::fmt;

use crate::core::{ConnectionId, DatapathId, ProtocolVersion};
use crate::handshake::CloseReason;
use crate::wire::Message;

/// Prefix of every event the engine publishes.
pub const EVENT_PREFIX: &str = "ofcore";

/// Name of the version-agnostic hello-failure lifecycle event.
pub const HELLO_FAILED_EVENT: &str = "ofcore.hello_failed";

/// Direction of a message event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received from a switch.
    In,
    /// Transmitted to a switch.
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::In => "in",
            Self::Out => "out",
        })
    }
}

/// Compose the event name for one message.
pub fn message_event_name(
    version: ProtocolVersion,
    direction: Direction,
    type_name: &str,
) -> String {
    format!("{EVENT_PREFIX}.v{version}.messages.{direction}.{type_name}")
}

/// An event published through the gateway.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A message arrived on an established (or establishing) connection.
    MessageIn {
        /// Source connection.
        connection: ConnectionId,
        /// Stable event name.
        name: String,
        /// The decoded message.
        message: Message,
    },

    /// A message was written to a connection's transport.
    MessageOut {
        /// Destination connection.
        connection: ConnectionId,
        /// Stable event name.
        name: String,
        /// The message as transmitted.
        message: Message,
    },

    /// Hello negotiation failed; the connection is closing.
    HelloFailed {
        /// The affected connection.
        connection: ConnectionId,
    },

    /// The handshake completed and the switch is usable.
    HandshakeComplete {
        /// The established connection.
        connection: ConnectionId,
        /// Identity of the switch behind it.
        dpid: DatapathId,
    },

    /// A connection was closed; no further events follow for it.
    ConnectionClosed {
        /// The closed connection.
        connection: ConnectionId,
        /// Why it closed.
        reason: CloseReason,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_event_names_match_the_contract() {
        assert_eq!(
            message_event_name(ProtocolVersion::OF10, Direction::In, "ofpt_packet_in"),
            "ofcore.v0x01.messages.in.ofpt_packet_in"
        );
        assert_eq!(
            message_event_name(ProtocolVersion::OF13, Direction::Out, "ofpt_features_request"),
            "ofcore.v0x04.messages.out.ofpt_features_request"
        );
    }
}
