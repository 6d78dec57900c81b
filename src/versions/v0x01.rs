//! OpenFlow 1.0 message bodies.

use crate::core::{DatapathId, DecodeError, PortDescriptor, SwitchDescriptor};
use crate::wire::{Body, ErrorBody, HelloBody, SetConfigBody};

/// Opaque payload carried in this version's echo requests.
pub const ECHO_PAYLOAD: &[u8] = b"ofcore_10";

/// Message type identifiers.
pub mod types {
    /// Version negotiation greeting.
    pub const HELLO: u8 = 0;
    /// Protocol error report.
    pub const ERROR: u8 = 1;
    /// Liveness probe.
    pub const ECHO_REQUEST: u8 = 2;
    /// Liveness probe answer.
    pub const ECHO_REPLY: u8 = 3;
    /// Vendor extension.
    pub const VENDOR: u8 = 4;
    /// Request for switch identity.
    pub const FEATURES_REQUEST: u8 = 5;
    /// Switch identity and capabilities.
    pub const FEATURES_REPLY: u8 = 6;
    /// Configuration query.
    pub const GET_CONFIG_REQUEST: u8 = 7;
    /// Configuration query answer.
    pub const GET_CONFIG_REPLY: u8 = 8;
    /// Configuration update.
    pub const SET_CONFIG: u8 = 9;
    /// Packet delivered to the controller.
    pub const PACKET_IN: u8 = 10;
    /// Flow removal notification.
    pub const FLOW_REMOVED: u8 = 11;
    /// Port state change notification.
    pub const PORT_STATUS: u8 = 12;
    /// Packet injected by the controller.
    pub const PACKET_OUT: u8 = 13;
    /// Flow table modification.
    pub const FLOW_MOD: u8 = 14;
    /// Port modification.
    pub const PORT_MOD: u8 = 15;
    /// Statistics query.
    pub const STATS_REQUEST: u8 = 16;
    /// Statistics answer.
    pub const STATS_REPLY: u8 = 17;
    /// Barrier request.
    pub const BARRIER_REQUEST: u8 = 18;
    /// Barrier answer.
    pub const BARRIER_REPLY: u8 = 19;
    /// Queue configuration query.
    pub const QUEUE_GET_CONFIG_REQUEST: u8 = 20;
    /// Queue configuration answer.
    pub const QUEUE_GET_CONFIG_REPLY: u8 = 21;
}

/// Statistics type for flow stats within a stats request/reply.
pub const STATS_TYPE_FLOW: u16 = 1;

const FEATURES_REPLY_FIXED: usize = 24;
const PORT_BLOCK: usize = 48;
const MATCH_SIZE: usize = 40;

/// All-fields-wildcarded match, used by the periodic flow poll.
const WILDCARD_ALL: u32 = 0x003f_ffff;

/// "Any table" selector.
const TABLE_ALL: u8 = 0xff;

/// "No output-port constraint" selector.
const PORT_NONE: u16 = 0xffff;

/// Lowercase message type name, used in published event names.
pub fn type_name(message_type: u8) -> Option<&'static str> {
    Some(match message_type {
        types::HELLO => "ofpt_hello",
        types::ERROR => "ofpt_error",
        types::ECHO_REQUEST => "ofpt_echo_request",
        types::ECHO_REPLY => "ofpt_echo_reply",
        types::VENDOR => "ofpt_vendor",
        types::FEATURES_REQUEST => "ofpt_features_request",
        types::FEATURES_REPLY => "ofpt_features_reply",
        types::GET_CONFIG_REQUEST => "ofpt_get_config_request",
        types::GET_CONFIG_REPLY => "ofpt_get_config_reply",
        types::SET_CONFIG => "ofpt_set_config",
        types::PACKET_IN => "ofpt_packet_in",
        types::FLOW_REMOVED => "ofpt_flow_removed",
        types::PORT_STATUS => "ofpt_port_status",
        types::PACKET_OUT => "ofpt_packet_out",
        types::FLOW_MOD => "ofpt_flow_mod",
        types::PORT_MOD => "ofpt_port_mod",
        types::STATS_REQUEST => "ofpt_stats_request",
        types::STATS_REPLY => "ofpt_stats_reply",
        types::BARRIER_REQUEST => "ofpt_barrier_request",
        types::BARRIER_REPLY => "ofpt_barrier_reply",
        types::QUEUE_GET_CONFIG_REQUEST => "ofpt_queue_get_config_request",
        types::QUEUE_GET_CONFIG_REPLY => "ofpt_queue_get_config_reply",
        _ => return None,
    })
}

/// Decode a message body for this version.
pub fn decode_body(message_type: u8, body: &[u8]) -> Result<Body, DecodeError> {
    match message_type {
        types::HELLO => Ok(Body::Hello(HelloBody::decode(body)?)),
        types::ERROR => decode_error(body),
        types::ECHO_REQUEST => Ok(Body::EchoRequest(body.to_vec())),
        types::ECHO_REPLY => Ok(Body::EchoReply(body.to_vec())),
        types::FEATURES_REQUEST => Ok(Body::FeaturesRequest),
        types::FEATURES_REPLY => decode_features_reply(body),
        types::SET_CONFIG => decode_set_config(body),
        _ if type_name(message_type).is_some() => Ok(Body::Other(body.to_vec())),
        _ => Err(DecodeError::UnknownType(message_type)),
    }
}

/// Encode a message body for this version.
pub fn encode_body(body: &Body) -> Result<Vec<u8>, DecodeError> {
    match body {
        Body::Hello(hello) => Ok(hello.encode()),
        Body::Error(error) => Ok(encode_error(error)),
        Body::EchoRequest(data) | Body::EchoReply(data) => Ok(data.clone()),
        Body::FeaturesRequest => Ok(Vec::new()),
        Body::FeaturesReply(descriptor) => Ok(encode_features_reply(descriptor)),
        Body::SetConfig(config) => {
            let mut buf = Vec::with_capacity(4);
            buf.extend_from_slice(&config.flags.to_be_bytes());
            buf.extend_from_slice(&config.miss_send_len.to_be_bytes());
            Ok(buf)
        }
        Body::FlowStatsRequest => Ok(flow_stats_request_body()),
        Body::PortDescRequest | Body::PortDescReply(_) => {
            Err(DecodeError::MalformedBody("port description"))
        }
        Body::Other(data) => Ok(data.clone()),
    }
}

fn decode_error(body: &[u8]) -> Result<Body, DecodeError> {
    if body.len() < 4 {
        return Err(DecodeError::Truncated {
            expected: 4,
            actual: body.len(),
        });
    }
    Ok(Body::Error(ErrorBody {
        error_type: u16::from_be_bytes([body[0], body[1]]),
        code: u16::from_be_bytes([body[2], body[3]]),
        data: body[4..].to_vec(),
    }))
}

fn encode_error(error: &ErrorBody) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + error.data.len());
    buf.extend_from_slice(&error.error_type.to_be_bytes());
    buf.extend_from_slice(&error.code.to_be_bytes());
    buf.extend_from_slice(&error.data);
    buf
}

fn decode_set_config(body: &[u8]) -> Result<Body, DecodeError> {
    if body.len() < 4 {
        return Err(DecodeError::Truncated {
            expected: 4,
            actual: body.len(),
        });
    }
    Ok(Body::SetConfig(SetConfigBody {
        flags: u16::from_be_bytes([body[0], body[1]]),
        miss_send_len: u16::from_be_bytes([body[2], body[3]]),
    }))
}

/// Features reply: fixed identity block, then 48-byte physical port blocks.
fn decode_features_reply(body: &[u8]) -> Result<Body, DecodeError> {
    if body.len() < FEATURES_REPLY_FIXED {
        return Err(DecodeError::Truncated {
            expected: FEATURES_REPLY_FIXED,
            actual: body.len(),
        });
    }
    let ports_bytes = &body[FEATURES_REPLY_FIXED..];
    if ports_bytes.len() % PORT_BLOCK != 0 {
        return Err(DecodeError::MalformedBody("features reply"));
    }

    let mut dpid = [0u8; 8];
    dpid.copy_from_slice(&body[0..8]);

    let mut ports = Vec::with_capacity(ports_bytes.len() / PORT_BLOCK);
    for block in ports_bytes.chunks_exact(PORT_BLOCK) {
        ports.push(decode_port(block));
    }

    Ok(Body::FeaturesReply(SwitchDescriptor {
        dpid: DatapathId::from_bytes(dpid),
        n_buffers: u32::from_be_bytes([body[8], body[9], body[10], body[11]]),
        n_tables: body[12],
        capabilities: u32::from_be_bytes([body[16], body[17], body[18], body[19]]),
        ports,
    }))
}

fn encode_features_reply(descriptor: &SwitchDescriptor) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FEATURES_REPLY_FIXED + descriptor.ports.len() * PORT_BLOCK);
    buf.extend_from_slice(&descriptor.dpid.as_u64().to_be_bytes());
    buf.extend_from_slice(&descriptor.n_buffers.to_be_bytes());
    buf.push(descriptor.n_tables);
    buf.extend_from_slice(&[0u8; 3]);
    buf.extend_from_slice(&descriptor.capabilities.to_be_bytes());
    buf.extend_from_slice(&[0u8; 4]); // supported actions, not interpreted
    for port in &descriptor.ports {
        encode_port(&mut buf, port);
    }
    buf
}

/// One 48-byte physical port block.
fn decode_port(block: &[u8]) -> PortDescriptor {
    let mut hw_addr = [0u8; 6];
    hw_addr.copy_from_slice(&block[2..8]);
    PortDescriptor {
        port_no: u16::from_be_bytes([block[0], block[1]]) as u32,
        hw_addr,
        name: port_name(&block[8..24]),
        config: u32::from_be_bytes([block[24], block[25], block[26], block[27]]),
        state: u32::from_be_bytes([block[28], block[29], block[30], block[31]]),
        curr: u32::from_be_bytes([block[32], block[33], block[34], block[35]]),
    }
}

fn encode_port(buf: &mut Vec<u8>, port: &PortDescriptor) {
    buf.extend_from_slice(&(port.port_no as u16).to_be_bytes());
    buf.extend_from_slice(&port.hw_addr);
    buf.extend_from_slice(&padded_name(&port.name));
    buf.extend_from_slice(&port.config.to_be_bytes());
    buf.extend_from_slice(&port.state.to_be_bytes());
    buf.extend_from_slice(&port.curr.to_be_bytes());
    buf.extend_from_slice(&[0u8; 12]); // advertised, supported, peer
}

pub(super) fn port_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

pub(super) fn padded_name(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = name.as_bytes();
    let len = bytes.len().min(15);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// Body of the periodic flow-stats poll: a stats request for every flow in
/// every table, no port constraint.
fn flow_stats_request_body() -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + MATCH_SIZE + 4);
    buf.extend_from_slice(&STATS_TYPE_FLOW.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // flags

    buf.extend_from_slice(&WILDCARD_ALL.to_be_bytes());
    buf.resize(buf.len() + (MATCH_SIZE - 4), 0);

    buf.push(TABLE_ALL);
    buf.push(0); // pad
    buf.extend_from_slice(&PORT_NONE.to_be_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_reply_with_ports() {
        let mut body = Vec::new();
        body.extend_from_slice(&0x00000000_00000042u64.to_be_bytes());
        body.extend_from_slice(&256u32.to_be_bytes());
        body.push(2);
        body.extend_from_slice(&[0u8; 3]);
        body.extend_from_slice(&0x00000087u32.to_be_bytes());
        body.extend_from_slice(&[0u8; 4]);

        // One port: number 1, name "eth0".
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        body.extend_from_slice(&padded_name("eth0"));
        body.extend_from_slice(&[0u8; 24]);

        let decoded = decode_body(types::FEATURES_REPLY, &body).unwrap();
        let Body::FeaturesReply(descriptor) = decoded else {
            panic!("expected a features reply");
        };

        assert_eq!(descriptor.dpid, DatapathId::new(0x42));
        assert_eq!(descriptor.n_buffers, 256);
        assert_eq!(descriptor.n_tables, 2);
        assert_eq!(descriptor.capabilities, 0x87);
        assert_eq!(descriptor.ports.len(), 1);
        assert_eq!(descriptor.ports[0].port_no, 1);
        assert_eq!(descriptor.ports[0].name, "eth0");
    }

    #[test]
    fn test_features_reply_ragged_ports_rejected() {
        let body = vec![0u8; FEATURES_REPLY_FIXED + 10];
        assert_eq!(
            decode_body(types::FEATURES_REPLY, &body),
            Err(DecodeError::MalformedBody("features reply"))
        );
    }

    #[test]
    fn test_truncated_features_reply_rejected() {
        let body = vec![0u8; 10];
        assert!(matches!(
            decode_body(types::FEATURES_REPLY, &body),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert_eq!(
            decode_body(0x60, &[]),
            Err(DecodeError::UnknownType(0x60))
        );
    }

    #[test]
    fn test_uninterpreted_types_stay_raw() {
        let body = b"\x01\x02\x03".to_vec();
        assert_eq!(
            decode_body(types::PACKET_IN, &body).unwrap(),
            Body::Other(body)
        );
    }

    #[test]
    fn test_flow_stats_request_layout() {
        let body = flow_stats_request_body();
        assert_eq!(body.len(), 48);
        assert_eq!(&body[0..2], &STATS_TYPE_FLOW.to_be_bytes());
        // Wildcard-all match, any table, no port constraint.
        assert_eq!(&body[4..8], &WILDCARD_ALL.to_be_bytes());
        assert_eq!(body[44], TABLE_ALL);
        assert_eq!(&body[46..48], &PORT_NONE.to_be_bytes());
    }

    #[test]
    fn test_port_name_trimming() {
        assert_eq!(port_name(b"eth0\0\0\0\0"), "eth0");
        assert_eq!(port_name(b"\0"), "");
    }
}
