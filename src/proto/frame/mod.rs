//! RESP frame types.
//!
//! This module defines the frame types used in the Redis protocol:
//! the RESP2 types plus the RESP3 map, boolean, double and null types.

/// Frame type definitions.
pub mod types;

pub use types::Frame;
