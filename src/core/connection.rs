use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, error, instrument};

use crate::core::builder::ClientConfig;
use crate::core::transport::{handshake, Connector, Transport};
use crate::proto::codec::Decoder;
use crate::proto::frame::Frame;
use crate::{Error, Result};

const READ_CHUNK_SIZE: usize = 4096;

/// Lifecycle of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Usable.
    Open,
    /// An I/O, protocol or timeout failure left the stream in an unknown position.
    Broken,
    /// Closed by [`Connection::close`].
    Closed,
}

/// A connection to a Valkey server.
///
/// This struct wraps an underlying stream (TCP, or any in-memory duplex in
/// tests) and handles RESP frame decoding plus read/write deadlines.
///
/// # Example
///
/// ```no_run
/// use valet::core::connection::Connection;
/// use tokio::net::TcpStream;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let stream = TcpStream::connect("127.0.0.1:6379").await?;
///     let mut conn = Connection::new(stream);
///
///     conn.send(b"*1\r\n$4\r\nPING\r\n").await?;
///     let resp = conn.receive().await?;
///     println!("{:?}", resp);
///
///     Ok(())
/// }
/// ```
pub struct Connection<S> {
    stream: S,
    decoder: Decoder,
    read_buf: BytesMut,
    state: ConnectionState,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection with the given stream.
    ///
    /// Initializes a connection with no timeouts configured.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: Decoder::new(),
            read_buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            state: ConnectionState::Open,
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Configures read and write timeouts for this connection.
    ///
    /// # Arguments
    ///
    /// * `read_timeout` - Deadline for receiving one complete frame
    /// * `write_timeout` - Deadline for writing one request
    pub fn with_timeouts(
        mut self,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Self {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        self
    }

    /// Replaces the decoder's frame size limit.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.decoder = Decoder::with_max_frame_size(max_frame_size);
        self
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Writes an encoded request to the connection.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] if the peer went away or the connection is
    /// no longer open, [`Error::Timeout`] if the write deadline elapsed. Any
    /// failure marks the connection broken.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;

        let deadline = self.write_timeout.map(|t| Instant::now() + t);
        let stream = &mut self.stream;
        let result = until(deadline, async move {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await;

        if result.is_err() {
            self.state = ConnectionState::Broken;
        }
        result
    }

    /// Reads a frame from the connection.
    ///
    /// Handles partial reads internally and keeps reading until a complete
    /// frame is decoded or the read deadline elapses.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] on EOF, [`Error::Timeout`] on deadline,
    /// [`Error::Protocol`] on malformed data. Any failure marks the
    /// connection broken.
    pub async fn receive(&mut self) -> Result<Frame> {
        self.ensure_open()?;
        let result = self.read_frame().await;
        if result.is_err() {
            self.state = ConnectionState::Broken;
        }
        result
    }

    /// Shuts down the write half and marks the connection closed.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        self.stream.shutdown().await.map_err(io_error)
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        let deadline = self.read_timeout.map(|t| Instant::now() + t);
        loop {
            match self.decoder.decode() {
                Ok(Some(frame)) => {
                    debug!(?frame, "received frame");
                    return Ok(frame);
                }
                Ok(None) => {}
                Err(message) => return Err(Error::Protocol { message }),
            }

            self.read_buf.reserve(READ_CHUNK_SIZE);
            let stream = &mut self.stream;
            let read_buf = &mut self.read_buf;
            let n = until(deadline, async move { stream.read_buf(read_buf).await }).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            self.decoder.append(&self.read_buf);
            self.read_buf.clear();
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Broken | ConnectionState::Closed => Err(Error::ConnectionClosed),
        }
    }
}

impl<S> fmt::Debug for Connection<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("stream", &self.stream)
            .field("state", &self.state)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

#[async_trait]
impl<S> Transport for Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        Connection::send(self, data).await
    }

    async fn receive(&mut self) -> Result<Frame> {
        Connection::receive(self).await
    }

    async fn close(&mut self) -> Result<()> {
        Connection::close(self).await
    }

    fn is_healthy(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

/// Opens plain TCP connections to one server address.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    /// Returns the `host:port` this connector dials.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Transport = Connection<TcpStream>;

    fn from_config(config: &ClientConfig) -> Self {
        Self {
            address: format!("{}:{}", config.host, config.port),
        }
    }

    #[instrument(skip(self, config), fields(address = %self.address), level = "debug")]
    async fn open(&self, config: &ClientConfig) -> Result<Self::Transport> {
        let stream = tokio::time::timeout(
            config.connection_timeout,
            TcpStream::connect(&self.address),
        )
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|e| {
            error!(error = %e, "failed to connect");
            Error::Io { source: e }
        })?;
        stream.set_nodelay(true)?;

        let mut connection = Connection::new(stream)
            .with_timeouts(config.read_timeout, config.write_timeout)
            .with_max_frame_size(config.max_frame_size);
        handshake(&mut connection, config).await?;
        Ok(connection)
    }
}

/// Runs `fut` against an optional deadline and maps I/O failures.
async fn until<F, T>(deadline: Option<Instant>, fut: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    let result = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| Error::Timeout)?,
        None => fut.await,
    };
    result.map_err(io_error)
}

fn io_error(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected => Error::ConnectionClosed,
        _ => Error::Io { source: e },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_connection_ping_pong() {
        let (client, mut server) = duplex(1024);
        let mut conn = Connection::new(client);

        conn.send(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let mut buf = [0u8; 14];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"*1\r\n$4\r\nPING\r\n");

        server.write_all(b"+PONG\r\n").await.unwrap();
        let frame = conn.receive().await.unwrap();
        assert_eq!(frame, Frame::SimpleString(b"PONG".to_vec()));
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_receive_frame_split_across_reads() {
        let (client, mut server) = duplex(1024);
        let mut conn = Connection::new(client);

        let reader = tokio::spawn(async move { conn.receive().await });
        server.write_all(b"*2\r\n:1\r\n").await.unwrap();
        tokio::task::yield_now().await;
        server.write_all(b":0\r\n").await.unwrap();

        let frame = reader.await.unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Array(vec![Frame::Integer(1), Frame::Integer(0)])
        );
    }

    #[tokio::test]
    async fn test_receive_eof_marks_broken() {
        let (client, server) = duplex(64);
        let mut conn = Connection::new(client);
        drop(server);

        let err = conn.receive().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert_eq!(conn.state(), ConnectionState::Broken);
        assert!(!Transport::is_healthy(&conn));
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_timeout_marks_broken() {
        let (client, _server) = duplex(64);
        let mut conn = Connection::new(client).with_timeouts(Some(Duration::from_millis(50)), None);

        let err = conn.receive().await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(conn.state(), ConnectionState::Broken);

        let err = conn.send(b"*1\r\n$4\r\nPING\r\n").await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_receive_malformed_frame() {
        let (client, mut server) = duplex(64);
        let mut conn = Connection::new(client);
        server.write_all(b"?oops\r\n").await.unwrap();

        let err = conn.receive().await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert_eq!(conn.state(), ConnectionState::Broken);
    }

    #[tokio::test]
    async fn test_closed_connection_is_not_reusable() {
        let (client, _server) = duplex(64);
        let mut conn = Connection::new(client);
        conn.close().await.unwrap();

        assert_eq!(conn.state(), ConnectionState::Closed);
        let err = conn.send(b"*1\r\n$4\r\nPING\r\n").await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_tcp_connector_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ClientConfig::new("127.0.0.1", port);
        let connector = TcpConnector::from_config(&config);
        assert_eq!(connector.address(), format!("127.0.0.1:{port}"));

        let err = connector.open(&config).await.unwrap_err();
        assert!(err.is_connection_error());
    }
}
