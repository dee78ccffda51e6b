//! The seam between the dispatcher and whatever carries bytes to a server.
//!
//! [`Connector`] opens transports, [`Transport`] moves one request and one
//! reply at a time. The TCP [`Connection`](crate::core::connection::Connection)
//! and the in-memory [`FakeTransport`](crate::fake::FakeTransport) both
//! implement it, and the pool and client only ever see the traits.

use async_trait::async_trait;
use tracing::debug;

use crate::core::builder::ClientConfig;
use crate::core::command::{self, Cmd};
use crate::proto::frame::Frame;
use crate::{Error, Result};

/// One bidirectional request/response channel to a server.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Writes an encoded request in full.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Waits for the next complete reply frame.
    async fn receive(&mut self) -> Result<Frame>;

    /// Closes the transport. Further use fails with [`Error::ConnectionClosed`].
    async fn close(&mut self) -> Result<()>;

    /// Returns false once the transport is broken or closed and must not be reused.
    fn is_healthy(&self) -> bool;
}

/// Opens new [`Transport`]s for a connection pool.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport type this connector produces.
    type Transport: Transport;

    /// Builds a connector for the host and port named in `config`.
    ///
    /// Construction never performs I/O; reachability is checked by [`open`](Connector::open).
    fn from_config(config: &ClientConfig) -> Self
    where
        Self: Sized;

    /// Opens and initializes a new transport (authentication, protocol
    /// negotiation, database selection).
    async fn open(&self, config: &ClientConfig) -> Result<Self::Transport>;
}

/// Sends one encoded request and reads its reply.
pub(crate) async fn round_trip<T>(transport: &mut T, payload: &[u8]) -> Result<Frame>
where
    T: Transport + ?Sized,
{
    transport.send(payload).await?;
    transport.receive().await
}

/// Runs the connection setup commands implied by `config`.
pub(crate) async fn handshake<T>(transport: &mut T, config: &ClientConfig) -> Result<()>
where
    T: Transport + ?Sized,
{
    if let Some(password) = &config.password {
        let cmd = match &config.username {
            Some(username) => command::auth_with_username(username.clone(), password.clone()),
            None => command::auth(password.clone()),
        };
        if let Frame::Error(e) = round_trip(transport, &cmd.encode()?).await? {
            return Err(Error::Auth {
                message: String::from_utf8_lossy(&e).into_owned(),
            });
        }
    }

    if config.resp3 {
        expect_success(transport, command::hello(3)).await?;
    }

    if let Some(db) = config.database {
        expect_success(transport, command::select(db)).await?;
    }

    if let Some(name) = &config.client_name {
        expect_success(transport, command::client_setname(name.clone())).await?;
    }

    debug!("connection handshake complete");
    Ok(())
}

async fn expect_success<T>(transport: &mut T, cmd: Cmd) -> Result<()>
where
    T: Transport + ?Sized,
{
    let frame = round_trip(transport, &cmd.encode()?).await?;
    command::parse_frame_response(frame)?;
    Ok(())
}
