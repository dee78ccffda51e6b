//! # In-memory fake server
//!
//! [`FakeConnector`] plugs into [`Client`] in place of TCP. Every request is
//! still encoded and decoded by the real codec on both sides, so a test
//! against [`FakeClient`] exercises the same bytes a server would see.
//!
//! Commands the fake does not emulate fail with
//! [`Error::NotImplemented`], never with a server error.
//!
//! ```
//! use valet::FakeClient;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> valet::Result<()> {
//! let client = FakeClient::connect("localhost", 6000).await?;
//! assert!(client.cf().create("cuckoo", 1000).await?);
//! assert!(client.cf().add("cuckoo", "filter").await?);
//! assert!(client.fake_state().lock().contains_key("cuckoo"));
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::core::builder::ClientConfig;
use crate::core::transport::{handshake, Connector, Transport};
use crate::proto::codec::{Decoder, Encoder};
use crate::proto::frame::Frame;
use crate::{Client, Error, Result};

mod commands;
mod state;

use commands::{CommandError, Session};
pub use state::{
    AddOutcome, Cuckoo, CuckooParams, FakeServerState, Keyspace, StoreError, Value, DATABASES,
};

/// Keyspace shared by every transport of one connector.
pub type SharedState = Arc<Mutex<FakeServerState>>;

/// A [`Client`] talking to an in-memory fake server.
pub type FakeClient = Client<FakeConnector>;

/// Opens [`FakeTransport`]s over one shared [`FakeServerState`].
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    state: SharedState,
}

impl FakeConnector {
    /// Creates a connector with a fresh, empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector over existing state.
    pub fn with_state(state: SharedState) -> Self {
        Self { state }
    }

    /// Mirrors the TCP constructor; the address is ignored.
    ///
    /// A password in `config` becomes the fake server's password, so the
    /// client authenticates the way it would against a protected server.
    pub fn from_address(_host: &str, _port: u16, config: &ClientConfig) -> Self {
        let connector = Self::new();
        if let Some(password) = &config.password {
            connector
                .state
                .lock()
                .require_auth(config.username.as_deref(), password);
        }
        connector
    }

    /// Returns the shared keyspace.
    pub fn state(&self) -> &SharedState {
        &self.state
    }
}

impl Client<FakeConnector> {
    /// Creates a fake client over existing state, so several clients can
    /// observe the same keyspace.
    pub async fn with_fake_state(state: SharedState) -> Result<Self> {
        Self::with_connector(FakeConnector::with_state(state), ClientConfig::default()).await
    }

    /// Returns the in-memory state behind this client.
    pub fn fake_state(&self) -> &SharedState {
        self.connector().state()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Transport = FakeTransport;

    fn from_config(config: &ClientConfig) -> Self {
        Self::from_address(&config.host, config.port, config)
    }

    #[instrument(skip(self, config), level = "debug")]
    async fn open(&self, config: &ClientConfig) -> Result<Self::Transport> {
        let mut transport = FakeTransport::new(Arc::clone(&self.state), config.max_frame_size);
        handshake(&mut transport, config).await?;
        Ok(transport)
    }
}

enum Reply {
    Encoded,
    NotImplemented(String),
}

/// One fake connection.
///
/// `send` runs the server side synchronously: it decodes the request,
/// interprets it and queues the encoded reply. `receive` decodes the next
/// queued reply with a client-side decoder.
pub struct FakeTransport {
    state: SharedState,
    session: Session,
    requests: Decoder,
    replies: Decoder,
    encoder: Encoder,
    pending: VecDeque<Reply>,
    open: bool,
}

impl FakeTransport {
    fn new(state: SharedState, max_frame_size: usize) -> Self {
        Self {
            state,
            session: Session::default(),
            requests: Decoder::with_max_frame_size(max_frame_size),
            replies: Decoder::with_max_frame_size(max_frame_size),
            encoder: Encoder::new(),
            pending: VecDeque::new(),
            open: true,
        }
    }

    /// Protocol version negotiated by `HELLO` (2 until then).
    pub fn protocol(&self) -> u8 {
        self.session.protocol
    }

    fn serve(&mut self, request: Frame) {
        let outcome = commands::frame_to_argv(request).and_then(|argv| {
            let mut state = self.state.lock();
            commands::dispatch(&argv, &mut state, &mut self.session)
        });
        let reply = match outcome {
            Ok(frame) => frame,
            Err(CommandError::NotImplemented(command)) => {
                debug!(%command, "command not emulated");
                self.pending.push_back(Reply::NotImplemented(command));
                return;
            }
            Err(e) => e.to_frame(),
        };
        self.encoder.encode(&reply);
        let bytes = self.encoder.take();
        self.replies.append(&bytes);
        self.pending.push_back(Reply::Encoded);
    }
}

impl fmt::Debug for FakeTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeTransport")
            .field("session", &self.session)
            .field("pending", &self.pending.len())
            .field("open", &self.open)
            .finish()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.open {
            return Err(Error::ConnectionClosed);
        }
        self.requests.append(data);
        loop {
            match self.requests.decode() {
                Ok(Some(request)) => self.serve(request),
                Ok(None) => return Ok(()),
                Err(message) => {
                    warn!(%message, "fake server closing connection after bad request");
                    self.open = false;
                    return Err(Error::Protocol { message });
                }
            }
        }
    }

    async fn receive(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(Error::ConnectionClosed);
        }
        match self.pending.pop_front() {
            Some(Reply::Encoded) => match self.replies.decode() {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => Err(Error::protocol("incomplete reply")),
                Err(message) => Err(Error::Protocol { message }),
            },
            Some(Reply::NotImplemented(command)) => Err(Error::NotImplemented { command }),
            None => Err(Error::protocol("no request awaiting a reply")),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.open
    }
}
