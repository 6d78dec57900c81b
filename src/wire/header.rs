//! The fixed OpenFlow header, identical across all protocol versions.

use crate::core::{DecodeError, HEADER_SIZE};

/// The 8-byte header carried by every OpenFlow message.
///
/// Wire format:
/// ```text
/// +---------+---------+------------------+--------------------+
/// | Version | Type    | Length           | Transaction id     |
/// | 1 byte  | 1 byte  | 2 bytes (BE16)   | 4 bytes (BE32)     |
/// +---------+---------+------------------+--------------------+
/// ```
///
/// `length` is the total frame length including these 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version byte.
    pub version: u8,
    /// Message type byte (version-specific numbering).
    pub message_type: u8,
    /// Total frame length including the header.
    pub length: u16,
    /// Transaction id, echoed in responses.
    pub xid: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(version: u8, message_type: u8, length: u16, xid: u32) -> Self {
        Self {
            version,
            message_type,
            length,
            xid,
        }
    }

    /// Serialize to the 8 wire bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.version;
        buf[1] = self.message_type;
        buf[2..4].copy_from_slice(&self.length.to_be_bytes());
        buf[4..8].copy_from_slice(&self.xid.to_be_bytes());
        buf
    }

    /// Parse from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            version: bytes[0],
            message_type: bytes[1],
            length: u16::from_be_bytes([bytes[2], bytes[3]]),
            xid: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }
}
