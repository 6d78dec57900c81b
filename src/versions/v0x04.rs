//! OpenFlow 1.3 message bodies.

use crate::core::{DatapathId, DecodeError, PortDescriptor, SwitchDescriptor};
use crate::wire::{Body, ErrorBody, HelloBody, SetConfigBody};

use super::v0x01::{padded_name, port_name};

/// Opaque payload carried in this version's echo requests.
pub const ECHO_PAYLOAD: &[u8] = b"ofcore_13";

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
    /// Experimenter extension.
    pub const EXPERIMENTER: u8 = 4;
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
    /// Group table modification.
    pub const GROUP_MOD: u8 = 15;
    /// Port modification.
    pub const PORT_MOD: u8 = 16;
    /// Table modification.
    pub const TABLE_MOD: u8 = 17;
    /// Multipart query.
    pub const MULTIPART_REQUEST: u8 = 18;
    /// Multipart answer.
    pub const MULTIPART_REPLY: u8 = 19;
    /// Barrier request.
    pub const BARRIER_REQUEST: u8 = 20;
    /// Barrier answer.
    pub const BARRIER_REPLY: u8 = 21;
    /// Queue configuration query.
    pub const QUEUE_GET_CONFIG_REQUEST: u8 = 22;
    /// Queue configuration answer.
    pub const QUEUE_GET_CONFIG_REPLY: u8 = 23;
    /// Controller role query.
    pub const ROLE_REQUEST: u8 = 24;
    /// Controller role answer.
    pub const ROLE_REPLY: u8 = 25;
    /// Asynchronous-message filter query.
    pub const GET_ASYNC_REQUEST: u8 = 26;
    /// Asynchronous-message filter answer.
    pub const GET_ASYNC_REPLY: u8 = 27;
    /// Asynchronous-message filter update.
    pub const SET_ASYNC: u8 = 28;
    /// Meter modification.
    pub const METER_MOD: u8 = 29;
}

/// Multipart type for flow statistics.
pub const MULTIPART_TYPE_FLOW: u16 = 1;

/// Multipart type for port descriptions.
pub const MULTIPART_TYPE_PORT_DESC: u16 = 13;

const FEATURES_REPLY_FIXED: usize = 24;
const MULTIPART_HEADER: usize = 8;
const PORT_BLOCK: usize = 64;

/// "Any table" selector.
const TABLE_ALL: u8 = 0xff;

/// "Any port" selector.
const PORT_ANY: u32 = 0xffff_ffff;

/// "Any group" selector.
const GROUP_ANY: u32 = 0xffff_ffff;

/// OXM match header matching every packet (type, length 4, padded to 8).
const MATCH_ANY: [u8; 8] = [0x00, 0x01, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00];

/// Lowercase message type name, used in published event names.
pub fn type_name(message_type: u8) -> Option<&'static str> {
    Some(match message_type {
        types::HELLO => "ofpt_hello",
        types::ERROR => "ofpt_error",
        types::ECHO_REQUEST => "ofpt_echo_request",
        types::ECHO_REPLY => "ofpt_echo_reply",
        types::EXPERIMENTER => "ofpt_experimenter",
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
        types::GROUP_MOD => "ofpt_group_mod",
        types::PORT_MOD => "ofpt_port_mod",
        types::TABLE_MOD => "ofpt_table_mod",
        types::MULTIPART_REQUEST => "ofpt_multipart_request",
        types::MULTIPART_REPLY => "ofpt_multipart_reply",
        types::BARRIER_REQUEST => "ofpt_barrier_request",
        types::BARRIER_REPLY => "ofpt_barrier_reply",
        types::QUEUE_GET_CONFIG_REQUEST => "ofpt_queue_get_config_request",
        types::QUEUE_GET_CONFIG_REPLY => "ofpt_queue_get_config_reply",
        types::ROLE_REQUEST => "ofpt_role_request",
        types::ROLE_REPLY => "ofpt_role_reply",
        types::GET_ASYNC_REQUEST => "ofpt_get_async_request",
        types::GET_ASYNC_REPLY => "ofpt_get_async_reply",
        types::SET_ASYNC => "ofpt_set_async",
        types::METER_MOD => "ofpt_meter_mod",
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
        types::MULTIPART_REQUEST => decode_multipart_request(body),
        types::MULTIPART_REPLY => decode_multipart_reply(body),
        _ if type_name(message_type).is_some() => Ok(Body::Other(body.to_vec())),
        _ => Err(DecodeError::UnknownType(message_type)),
    }
}

/// Encode a message body for this version.
pub fn encode_body(body: &Body) -> Result<Vec<u8>, DecodeError> {
    match body {
        Body::Hello(hello) => Ok(hello.encode()),
        Body::Error(error) => {
            let mut buf = Vec::with_capacity(4 + error.data.len());
            buf.extend_from_slice(&error.error_type.to_be_bytes());
            buf.extend_from_slice(&error.code.to_be_bytes());
            buf.extend_from_slice(&error.data);
            Ok(buf)
        }
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
        Body::PortDescRequest => Ok(multipart_header(MULTIPART_TYPE_PORT_DESC)),
        Body::PortDescReply(ports) => {
            let mut buf = multipart_header(MULTIPART_TYPE_PORT_DESC);
            for port in ports {
                encode_port(&mut buf, port);
            }
            Ok(buf)
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

/// Features reply: identity block only; ports arrive in a port-description
/// multipart reply instead.
fn decode_features_reply(body: &[u8]) -> Result<Body, DecodeError> {
    if body.len() < FEATURES_REPLY_FIXED {
        return Err(DecodeError::Truncated {
            expected: FEATURES_REPLY_FIXED,
            actual: body.len(),
        });
    }

    let mut dpid = [0u8; 8];
    dpid.copy_from_slice(&body[0..8]);

    Ok(Body::FeaturesReply(SwitchDescriptor {
        dpid: DatapathId::from_bytes(dpid),
        n_buffers: u32::from_be_bytes([body[8], body[9], body[10], body[11]]),
        n_tables: body[12],
        capabilities: u32::from_be_bytes([body[16], body[17], body[18], body[19]]),
        ports: Vec::new(),
    }))
}

fn encode_features_reply(descriptor: &SwitchDescriptor) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FEATURES_REPLY_FIXED);
    buf.extend_from_slice(&descriptor.dpid.as_u64().to_be_bytes());
    buf.extend_from_slice(&descriptor.n_buffers.to_be_bytes());
    buf.push(descriptor.n_tables);
    buf.extend_from_slice(&[0u8; 3]); // auxiliary id + pad
    buf.extend_from_slice(&descriptor.capabilities.to_be_bytes());
    buf.extend_from_slice(&[0u8; 4]); // reserved
    buf
}

fn multipart_type(body: &[u8]) -> Result<u16, DecodeError> {
    if body.len() < MULTIPART_HEADER {
        return Err(DecodeError::Truncated {
            expected: MULTIPART_HEADER,
            actual: body.len(),
        });
    }
    Ok(u16::from_be_bytes([body[0], body[1]]))
}

fn decode_multipart_request(body: &[u8]) -> Result<Body, DecodeError> {
    match multipart_type(body)? {
        MULTIPART_TYPE_PORT_DESC => Ok(Body::PortDescRequest),
        _ => Ok(Body::Other(body.to_vec())),
    }
}

fn decode_multipart_reply(body: &[u8]) -> Result<Body, DecodeError> {
    if multipart_type(body)? != MULTIPART_TYPE_PORT_DESC {
        return Ok(Body::Other(body.to_vec()));
    }

    let ports_bytes = &body[MULTIPART_HEADER..];
    if ports_bytes.len() % PORT_BLOCK != 0 {
        return Err(DecodeError::MalformedBody("port description reply"));
    }

    let mut ports = Vec::with_capacity(ports_bytes.len() / PORT_BLOCK);
    for block in ports_bytes.chunks_exact(PORT_BLOCK) {
        let mut hw_addr = [0u8; 6];
        hw_addr.copy_from_slice(&block[8..14]);
        ports.push(PortDescriptor {
            port_no: u32::from_be_bytes([block[0], block[1], block[2], block[3]]),
            hw_addr,
            name: port_name(&block[16..32]),
            config: u32::from_be_bytes([block[32], block[33], block[34], block[35]]),
            state: u32::from_be_bytes([block[36], block[37], block[38], block[39]]),
            curr: u32::from_be_bytes([block[40], block[41], block[42], block[43]]),
        });
    }
    Ok(Body::PortDescReply(ports))
}

fn encode_port(buf: &mut Vec<u8>, port: &PortDescriptor) {
    buf.extend_from_slice(&port.port_no.to_be_bytes());
    buf.extend_from_slice(&[0u8; 4]); // pad
    buf.extend_from_slice(&port.hw_addr);
    buf.extend_from_slice(&[0u8; 2]); // pad
    buf.extend_from_slice(&padded_name(&port.name));
    buf.extend_from_slice(&port.config.to_be_bytes());
    buf.extend_from_slice(&port.state.to_be_bytes());
    buf.extend_from_slice(&port.curr.to_be_bytes());
    buf.extend_from_slice(&[0u8; 20]); // advertised, supported, peer, speeds
}

fn multipart_header(mp_type: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MULTIPART_HEADER);
    buf.extend_from_slice(&mp_type.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // flags
    buf.extend_from_slice(&[0u8; 4]); // pad
    buf
}

/// Body of the periodic flow-stats poll: a flow multipart request covering
/// every table, port, and group, matching all packets.
fn flow_stats_request_body() -> Vec<u8> {
    let mut buf = multipart_header(MULTIPART_TYPE_FLOW);
    buf.push(TABLE_ALL);
    buf.extend_from_slice(&[0u8; 3]); // pad
    buf.extend_from_slice(&PORT_ANY.to_be_bytes());
    buf.extend_from_slice(&GROUP_ANY.to_be_bytes());
    buf.extend_from_slice(&[0u8; 4]); // pad
    buf.extend_from_slice(&0u64.to_be_bytes()); // cookie
    buf.extend_from_slice(&0u64.to_be_bytes()); // cookie mask
    buf.extend_from_slice(&MATCH_ANY);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_reply_reports_no_ports() {
        let mut body = Vec::new();
        body.extend_from_slice(&0x99u64.to_be_bytes());
        body.extend_from_slice(&64u32.to_be_bytes());
        body.push(254);
        body.push(0);
        body.extend_from_slice(&[0u8; 2]);
        body.extend_from_slice(&0x4fu32.to_be_bytes());
        body.extend_from_slice(&[0u8; 4]);

        let Body::FeaturesReply(descriptor) = decode_body(types::FEATURES_REPLY, &body).unwrap()
        else {
            panic!("expected a features reply");
        };

        assert_eq!(descriptor.dpid, DatapathId::new(0x99));
        assert_eq!(descriptor.n_tables, 254);
        assert!(descriptor.ports.is_empty());
    }

    #[test]
    fn test_port_desc_reply_roundtrip() {
        let ports = vec![
            PortDescriptor {
                port_no: 1,
                hw_addr: [1, 2, 3, 4, 5, 6],
                name: "s1-eth1".into(),
                config: 0,
                state: 4,
                curr: 0x840,
            },
            PortDescriptor {
                port_no: 0xfffffffe,
                hw_addr: [6, 5, 4, 3, 2, 1],
                name: "s1".into(),
                config: 1,
                state: 1,
                curr: 0,
            },
        ];

        let encoded = encode_body(&Body::PortDescReply(ports.clone())).unwrap();
        assert_eq!(encoded.len(), MULTIPART_HEADER + 2 * PORT_BLOCK);

        let decoded = decode_body(types::MULTIPART_REPLY, &encoded).unwrap();
        assert_eq!(decoded, Body::PortDescReply(ports));
    }

    #[test]
    fn test_ragged_port_desc_reply_rejected() {
        let mut body = multipart_header(MULTIPART_TYPE_PORT_DESC);
        body.extend_from_slice(&[0u8; 63]);
        assert_eq!(
            decode_body(types::MULTIPART_REPLY, &body),
            Err(DecodeError::MalformedBody("port description reply"))
        );
    }

    #[test]
    fn test_non_port_desc_multipart_stays_raw() {
        let mut body = multipart_header(MULTIPART_TYPE_FLOW);
        body.extend_from_slice(&[0xab; 16]);
        assert_eq!(
            decode_body(types::MULTIPART_REPLY, &body).unwrap(),
            Body::Other(body)
        );
    }

    #[test]
    fn test_flow_stats_request_layout() {
        let body = flow_stats_request_body();
        assert_eq!(body.len(), MULTIPART_HEADER + 32 + MATCH_ANY.len());
        assert_eq!(&body[0..2], &MULTIPART_TYPE_FLOW.to_be_bytes());
        assert_eq!(body[8], TABLE_ALL);
        assert_eq!(&body[12..16], &PORT_ANY.to_be_bytes());
        assert_eq!(&body[40..48], &MATCH_ANY);
    }

    #[test]
    fn test_port_desc_request_is_typed() {
        let encoded = encode_body(&Body::PortDescRequest).unwrap();
        assert_eq!(
            decode_body(types::MULTIPART_REQUEST, &encoded).unwrap(),
            Body::PortDescRequest
        );
    }
}
