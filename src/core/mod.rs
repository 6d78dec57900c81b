//! Core types, constants, and collaborator traits.
//!
//! This module provides the foundational pieces every other layer builds on:
//! protocol constants, the error taxonomy, engine configuration, identity
//! types, and the narrow [`SwitchRegistry`] seam through which discovered
//! switches are handed to the surrounding controller.

mod config;
mod constants;
mod error;
mod registry;
mod types;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use registry::*;
pub use types::*;
