//! Wire layer: framing and codecs.
//!
//! This module turns raw bytes into protocol structures and back:
//!
//! - **Header codec**: [`Header`], the fixed 8-byte OpenFlow header
//! - **Frame slicing**: [`FrameSlicer`], which cuts an unbounded byte
//!   stream into self-delimited [`Frame`]s
//! - **Hello codec**: [`HelloBody`], the version-agnostic hello TLVs
//! - **Message model**: [`Message`] and [`Body`], the typed unit the rest
//!   of the engine works with
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Handshake / Gateway              │
//! ├─────────────────────────────────────────┤
//! │           Wire Layer                    │  ← This module
//! │   header, slicer, hello, message        │
//! ├─────────────────────────────────────────┤
//! │              TCP                        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Everything here is pure computation over already-delivered bytes; no
//! I/O happens in this layer.

mod header;
mod hello;
mod message;
mod slicer;

pub use header::*;
pub use hello::*;
pub use message::*;
pub use slicer::*;
