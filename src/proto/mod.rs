//! # Valet Proto
//!
//! RESP (Redis Serialization Protocol) codec used by every transport.
//! Requests are always RESP2 multi-bulk arrays; replies may use any RESP2 or
//! RESP3 type and are decoded regardless of the negotiated protocol.
//!
//! ## Modules
//!
//! - [`codec`] - Encoder and decoder for RESP protocol
//! - [`error`] - Error types shared by the whole crate
//! - [`frame`] - Frame types representing RESP data structures

#![warn(missing_docs)]

pub mod codec;
/// Error types.
pub mod error;
pub mod frame;
