//! Version-agnostic hello codec.
//!
//! The hello is the one message that must be readable before any version is
//! negotiated: a common header plus zero or more TLV elements. Element type
//! 1 carries a version bitmap; legacy peers send no elements at all and are
//! negotiated from the header version alone.

use crate::core::{
    DecodeError, ProtocolVersion, HELLO_ELEM_HEADER_SIZE, HELLO_ELEM_VERSIONBITMAP, HEADER_SIZE,
};

use super::header::Header;
use super::slicer::Frame;

/// Message type shared by the hello in every OpenFlow version.
pub const HELLO_TYPE: u8 = 0;

/// One hello TLV element.
///
/// Wire format:
/// ```text
/// +0   Element Type (2 bytes BE16)
/// +2   Element Length (2 bytes BE16, includes these 4 bytes)
/// +4   Value (length - 4 bytes)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloElement {
    /// Element type identifier.
    pub elem_type: u16,
    /// Element value.
    pub data: Vec<u8>,
}

impl HelloElement {
    /// Create an element.
    pub fn new(elem_type: u16, data: Vec<u8>) -> Self {
        Self { elem_type, data }
    }

    /// Build a version-bitmap element for the given supported set.
    pub fn version_bitmap(versions: &[ProtocolVersion]) -> Self {
        let words = match versions.iter().map(|v| v.as_u8() as usize / 32).max() {
            Some(max_word) => max_word + 1,
            None => 1,
        };
        let mut bitmaps = vec![0u32; words];
        for version in versions {
            let value = version.as_u8() as usize;
            bitmaps[value / 32] |= 1 << (value % 32);
        }

        let mut data = Vec::with_capacity(words * 4);
        for word in bitmaps {
            data.extend_from_slice(&word.to_be_bytes());
        }
        Self::new(HELLO_ELEM_VERSIONBITMAP, data)
    }

    /// Total wire size including the TLV header.
    pub fn wire_size(&self) -> usize {
        HELLO_ELEM_HEADER_SIZE + self.data.len()
    }

    /// Decode the versions in a bitmap element.
    ///
    /// Returns `None` for non-bitmap elements; a bitmap whose value is not
    /// a whole number of 32-bit words is malformed.
    pub fn versions(&self) -> Option<Result<Vec<ProtocolVersion>, DecodeError>> {
        if self.elem_type != HELLO_ELEM_VERSIONBITMAP {
            return None;
        }
        if self.data.len() % 4 != 0 {
            return Some(Err(DecodeError::MalformedBody("version bitmap")));
        }

        let mut versions = Vec::new();
        for (word_index, word) in self.data.chunks_exact(4).enumerate() {
            let bits = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
            for bit in 0..32 {
                if bits & (1 << bit) != 0 {
                    versions.push(ProtocolVersion::new((word_index * 32 + bit) as u8));
                }
            }
        }
        Some(Ok(versions))
    }
}

/// The decoded body of a hello message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelloBody {
    /// TLV elements, in wire order. Empty for legacy peers.
    pub elements: Vec<HelloElement>,
}

impl HelloBody {
    /// A hello with no elements (legacy form).
    pub fn empty() -> Self {
        Self::default()
    }

    /// A hello advertising the given supported versions in a bitmap.
    pub fn with_versions(versions: &[ProtocolVersion]) -> Self {
        Self {
            elements: vec![HelloElement::version_bitmap(versions)],
        }
    }

    /// The peer's advertised version set, if a bitmap element is present.
    pub fn versions(&self) -> Result<Option<Vec<ProtocolVersion>>, DecodeError> {
        for element in &self.elements {
            if let Some(parsed) = element.versions() {
                return parsed.map(Some);
            }
        }
        Ok(None)
    }

    /// Decode hello body bytes (everything after the common header).
    pub fn decode(mut data: &[u8]) -> Result<Self, DecodeError> {
        let mut elements = Vec::new();
        while !data.is_empty() {
            if data.len() < HELLO_ELEM_HEADER_SIZE {
                return Err(DecodeError::Truncated {
                    expected: HELLO_ELEM_HEADER_SIZE,
                    actual: data.len(),
                });
            }
            let elem_type = u16::from_be_bytes([data[0], data[1]]);
            let elem_length = u16::from_be_bytes([data[2], data[3]]) as usize;
            if elem_length < HELLO_ELEM_HEADER_SIZE {
                return Err(DecodeError::MalformedBody("hello element"));
            }
            if data.len() < elem_length {
                return Err(DecodeError::Truncated {
                    expected: elem_length,
                    actual: data.len(),
                });
            }

            elements.push(HelloElement::new(
                elem_type,
                data[HELLO_ELEM_HEADER_SIZE..elem_length].to_vec(),
            ));
            data = &data[elem_length..];
        }

        Ok(Self { elements })
    }

    /// Encode the body bytes (everything after the common header).
    pub fn encode(&self) -> Vec<u8> {
        let size: usize = self.elements.iter().map(HelloElement::wire_size).sum();
        let mut buf = Vec::with_capacity(size);
        for element in &self.elements {
            buf.extend_from_slice(&element.elem_type.to_be_bytes());
            buf.extend_from_slice(&(element.wire_size() as u16).to_be_bytes());
            buf.extend_from_slice(&element.data);
        }
        buf
    }
}

/// Parse a frame as a hello without knowing any protocol version.
///
/// Used exactly once per connection, on the first frame; every later frame
/// goes through the negotiated version's codec instead.
pub fn decode_hello_frame(frame: &Frame) -> Result<(Header, HelloBody), DecodeError> {
    let bytes = frame.as_bytes();
    let header = Header::from_bytes(bytes)?;
    if header.message_type != HELLO_TYPE {
        return Err(DecodeError::ExpectedHello(header.message_type));
    }

    let body = HelloBody::decode(&bytes[HEADER_SIZE..])?;
    Ok((header, body))
}
