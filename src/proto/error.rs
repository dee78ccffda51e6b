use std::io;

use thiserror::Error;

/// Result type alias for valet operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a Valkey server (or the fake one).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IO error occurred.
    #[error("IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// The peer closed the connection, or the connection was already closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// No complete frame arrived (or could be written) before the deadline.
    #[error("operation timed out")]
    Timeout,

    /// No connection became available within the acquire timeout.
    #[error("connection pool exhausted ({max} connections in use)")]
    PoolExhausted {
        /// Configured pool capacity.
        max: usize,
    },

    /// A reply frame could not be parsed, or had an unexpected shape.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the error.
        message: String,
    },

    /// The server returned an error reply.
    #[error("server error: {message}")]
    Server {
        /// Error message from server, verbatim.
        message: String,
    },

    /// The fake server was asked to run a command it does not emulate.
    #[error("command not implemented by fake server: {command}")]
    NotImplemented {
        /// Upper-cased command name.
        command: String,
    },

    /// Authentication failed.
    #[error("authentication failed: {message}")]
    Auth {
        /// Error message from server.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of invalid argument.
        message: String,
    },

    /// Encoding failed before any bytes were produced.
    #[error("encode error: {source}")]
    Encode {
        /// Underlying encode error.
        #[from]
        source: EncodeError,
    },
}

impl Error {
    /// Returns true for failures of the underlying connection (as opposed to
    /// replies or local validation).
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Io { .. } | Error::ConnectionClosed | Error::Timeout
        )
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    pub(crate) fn server(message: &[u8]) -> Self {
        Error::Server {
            message: String::from_utf8_lossy(message).into_owned(),
        }
    }
}

/// Error returned when a command cannot be encoded.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EncodeError {
    message: String,
}

impl EncodeError {
    /// Creates a new encode error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
