//! # Valet Core
//!
//! Connection handling, pooling and command dispatch.
//!
//! ## Modules
//!
//! - [`connection`] - Single TCP connection with read/write deadlines
//! - [`transport`] - The seam the fake server plugs into
//! - [`pool`] - Bounded connection pool
//! - [`command`] - Command builders and reply decoders
//! - [`cuckoo`] - Cuckoo filter commands
//! - [`builder`] - Client configuration

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::instrument;

pub use crate::proto::error::{Error, Result};

/// Client builder configuration.
pub mod builder;
/// Command construction helpers.
pub mod command;
/// Low-level connection management.
pub mod connection;
pub mod cuckoo;
pub mod pool;
pub mod transport;

use self::builder::ClientConfig;
use self::command::Cmd;
use self::connection::TcpConnector;
use self::cuckoo::CuckooFilter;
use self::pool::{Pool, PoolStatus};
use self::transport::Connector;
use crate::proto::frame::Frame;

/// High-level client dispatching commands over a pool of connections.
///
/// The connector type decides what the client talks to: plain TCP by
/// default, or the in-memory [`FakeConnector`](crate::FakeConnector). Code written against
/// `Client<C>` runs unchanged on both.
///
/// Cloning is cheap and clones share the pool.
///
/// # Example
///
/// ```no_run
/// use valet::Client;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client: Client = Client::connect("localhost", 6379).await?;
///     client.set("key", "value").await?;
///     let value = client.get("key").await?;
///     assert_eq!(value.as_deref(), Some(&b"value"[..]));
///     Ok(())
/// }
/// ```
pub struct Client<C: Connector = TcpConnector> {
    pool: Arc<Pool<C>>,
}

impl<C: Connector> Client<C> {
    /// Connects to `host:port` with default settings.
    ///
    /// # Errors
    ///
    /// Returns the connection error if the first connection cannot be opened.
    pub async fn connect(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::from_config(ClientConfig::new(host, port)).await
    }

    /// Connects using a full configuration.
    pub async fn from_config(config: ClientConfig) -> Result<Self> {
        let connector = C::from_config(&config);
        Self::with_connector(connector, config).await
    }

    /// Connects through an explicit connector.
    ///
    /// One connection is opened eagerly so that an unreachable server is
    /// reported here rather than on the first command.
    pub async fn with_connector(connector: C, config: ClientConfig) -> Result<Self> {
        let pool = Pool::new(connector, config)?;
        drop(pool.acquire().await?);
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Sends a command and returns the raw reply.
    ///
    /// # Errors
    ///
    /// [`Error::Encode`] before anything is sent, [`Error::Server`] for
    /// error replies, or the transport/pool error.
    #[instrument(skip(self, cmd), fields(command = %cmd.name()), level = "debug")]
    pub async fn execute(&self, cmd: Cmd) -> Result<Frame> {
        let payload = cmd.encode()?;
        let mut connection = self.pool.acquire().await?;
        let frame = connection.call(&payload).await?;
        command::parse_frame_response(frame)
    }

    /// Returns the cuckoo filter command group.
    pub fn cf(&self) -> CuckooFilter<'_, C> {
        CuckooFilter::new(self)
    }

    /// Returns current pool occupancy.
    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Returns the configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        self.pool.config()
    }

    pub(crate) fn connector(&self) -> &C {
        self.pool.connector()
    }

    /// Closes idle connections. Leased connections close when returned
    /// broken, otherwise they return to the pool.
    pub async fn close(&self) {
        self.pool.close_idle().await;
    }

    /// Sends a PING command to the server.
    ///
    /// # Returns
    ///
    /// Returns `PONG` as bytes if successful.
    pub async fn ping(&self) -> Result<Bytes> {
        let frame = self.execute(command::ping()).await?;
        Ok(command::frame_to_bytes(frame)?.unwrap_or_default())
    }

    /// Echoes the provided message back from the server.
    pub async fn echo(&self, msg: impl Into<Bytes>) -> Result<Bytes> {
        let frame = self.execute(command::echo(msg)).await?;
        Ok(command::frame_to_bytes(frame)?.unwrap_or_default())
    }

    /// Gets the value associated with the specified key.
    ///
    /// # Returns
    ///
    /// Returns `Some(Bytes)` if the key exists, or `None` if it does not.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let frame = self.execute(command::get(key.to_string())).await?;
        command::frame_to_bytes(frame)
    }

    /// Sets the string value of a key.
    pub async fn set(&self, key: &str, value: impl Into<Bytes>) -> Result<()> {
        let frame = self.execute(command::set(key.to_string(), value)).await?;
        command::frame_to_ok(frame)?;
        Ok(())
    }

    /// Removes the specified key.
    ///
    /// # Returns
    ///
    /// `true` if the key was removed, `false` if the key did not exist.
    pub async fn del(&self, key: &str) -> Result<bool> {
        let frame = self.execute(command::del(key.to_string())).await?;
        Ok(command::frame_to_int(frame)? > 0)
    }

    /// Returns whether the key exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let frame = self.execute(command::exists(key.to_string())).await?;
        Ok(command::frame_to_int(frame)? > 0)
    }

    /// Increments the number stored at key by one.
    ///
    /// # Returns
    ///
    /// The value of the key after the increment.
    pub async fn incr(&self, key: &str) -> Result<i64> {
        let frame = self.execute(command::incr(key.to_string())).await?;
        command::frame_to_int(frame)
    }

    /// Increments the number stored at key by the specified amount.
    pub async fn incr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let frame = self.execute(command::incr_by(key.to_string(), amount)).await?;
        command::frame_to_int(frame)
    }

    /// Returns the type name of the value at key (`"none"` if missing).
    pub async fn key_type(&self, key: &str) -> Result<String> {
        let frame = self.execute(command::key_type(key.to_string())).await?;
        command::frame_to_string(frame)
    }

    /// Removes every key from the selected database.
    pub async fn flushdb(&self) -> Result<()> {
        let frame = self.execute(command::flushdb()).await?;
        command::frame_to_ok(frame)?;
        Ok(())
    }
}

impl<C: Connector> Clone for Client<C> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<C: Connector> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("pool", &self.pool.status())
            .finish()
    }
}
