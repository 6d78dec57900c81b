//! # ofcore
//!
//! An OpenFlow protocol engine: the layer that turns a raw, unbounded TCP
//! byte stream from a switch into typed, versioned protocol events, and
//! drives every connection through version negotiation and feature
//! discovery before any application logic may use it. It provides:
//!
//! - **Framing**: length-field slicing of the byte stream into frames
//! - **Codecs**: the common header, the version-agnostic hello, and typed
//!   per-version message bodies
//! - **Negotiation**: highest-common-version agreement from hello bitmaps,
//!   with a legacy header-version fallback
//! - **Handshake**: a per-connection state machine sequencing hello,
//!   features discovery, and per-version follow-ups
//! - **Keepalive**: periodic echo and statistics polling
//! - **Events**: a stable, named event stream consumers subscribe to
//!
//! Flow management, topology discovery, statistics storage, and REST
//! surfaces are consumers of this engine, not part of it.
//!
//! ## Feature Flags
//!
//! - `runtime` (default): the tokio-based engine (listener, per-connection
//!   tasks, gateway, keepalive). Without it the crate is the pure protocol
//!   layer: framing, codecs, negotiation, and the handshake state machine.
//!
//! ## Modules
//!
//! - [`core`]: constants, errors, configuration, identities, registry seam
//! - [`wire`]: framing and codecs
//! - [`versions`]: per-version message construction and interpretation
//! - [`handshake`]: negotiation and the connection state machine
//! - [`event`]: published event model and naming
//! - [`gateway`], [`keepalive`], [`engine`]: the runtime (requires `runtime`)
//!
//! ## Example
//!
//! ```rust
//! use ofcore::prelude::*;
//!
//! # fn main() -> Result<(), DecodeError> {
//! // Cut a delivery into frames.
//! let mut slicer = FrameSlicer::new(u16::MAX);
//! let delivery = [0x04, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01];
//! let frames = slicer.push(&delivery)?;
//! assert_eq!(frames.len(), 1);
//!
//! // Negotiate a protocol version from the peer's hello.
//! let (header, hello) = decode_hello_frame(&frames[0])?;
//! let local = [ProtocolVersion::OF10, ProtocolVersion::OF13];
//! assert_eq!(
//!     negotiate(&local, &hello, header.version),
//!     Negotiation::Agreed(ProtocolVersion::OF13)
//! );
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Wire layer (always included)
pub mod wire;

// Version adapters (always included)
pub mod versions;

// Handshake layer (always included)
pub mod handshake;

// Event model (always included)
pub mod event;

// Event gateway (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod gateway;

// Keepalive scheduler (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod keepalive;

// Engine runtime (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod engine;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;
    pub use crate::event::*;
    pub use crate::handshake::*;
    pub use crate::versions::*;
    pub use crate::wire::*;

    #[cfg(feature = "runtime")]
    pub use crate::engine::OfEngine;
    #[cfg(feature = "runtime")]
    pub use crate::gateway::{Command, EventGateway};
}

// Re-export commonly used items at crate root
pub use crate::core::{
    ConnectionId, DatapathId, DecodeError, EngineConfig, EngineConfigBuilder, MemoryRegistry,
    NegotiationFailure, ProtocolVersion, SwitchRegistry,
};
pub use crate::event::EngineEvent;
pub use crate::handshake::{
    Action, CloseReason, ConnectionMachine, ConnectionPhase, HandshakePhase, Negotiation,
};
pub use crate::wire::{Body, Frame, FrameSlicer, Header, HelloBody, Message};

#[cfg(feature = "runtime")]
pub use crate::engine::OfEngine;
#[cfg(feature = "runtime")]
pub use crate::gateway::EventGateway;
