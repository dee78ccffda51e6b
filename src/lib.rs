//! # Valet
//!
//! Pooled async client for Valkey (and Redis-compatible servers) with a
//! cuckoo filter command facade and an in-memory fake server for tests.
//!
//! ## Features
//!
//! - `serde` - `Serialize`/`Deserialize` for [`ClientConfig`] and [`CfInfo`]
//!
//! ## Example
//!
//! ```no_run
//! use valet::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client: Client = Client::connect("localhost", 6379).await?;
//!     client.cf().create("cuckoo", 1000).await?;
//!     let added = client.cf().add("cuckoo", "filter").await?;
//!     assert!(added);
//!     Ok(())
//! }
//! ```
//!
//! The same code runs against the fake server by swapping the connector:
//!
//! ```
//! use valet::{Client, FakeConnector};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> valet::Result<()> {
//! let client = Client::<FakeConnector>::connect("localhost", 6000).await?;
//! assert_eq!(client.ping().await?, "PONG");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod core;
pub mod fake;
pub mod proto;

#[cfg(test)]
mod stress;

// Re-export high-level client types for convenience
pub use crate::core::builder::{ClientBuilder, ClientConfig};
pub use crate::core::command::Cmd;
pub use crate::core::connection::TcpConnector;
pub use crate::core::cuckoo::{CfInfo, CfInsertOptions, CfReserveOptions, CuckooFilter};
pub use crate::core::pool::PoolStatus;
pub use crate::core::transport::{Connector, Transport};
pub use crate::core::{Client, Error, Result};
pub use crate::fake::{FakeClient, FakeConnector, FakeServerState};
pub use crate::proto::frame::Frame;
