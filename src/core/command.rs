use std::borrow::Cow;

use bytes::Bytes;

use crate::proto::codec::Encoder;
use crate::proto::error::EncodeError;
use crate::proto::frame::Frame;

/// A command ready to be sent to the server.
///
/// Commands are built using the builder pattern and encoded into a
/// multi-bulk request right before they are written to a transport.
///
/// # Example
///
/// ```
/// use valet::core::command::{Cmd, get, set};
///
/// let cmd = Cmd::new("SET").arg("key").arg("value");
/// let get_cmd = get("key");
/// let set_cmd = set("key", "new_value");
/// assert_eq!(cmd.encode().unwrap(), set("key", "value").encode().unwrap());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Cmd {
    args: Vec<Bytes>,
}

impl Cmd {
    /// Creates a new command with the given name.
    ///
    /// # Arguments
    ///
    /// * `name` - The command name (e.g., "GET", "CF.ADD")
    #[inline]
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Appends an argument to the command.
    #[inline]
    pub fn arg<T: Into<Bytes>>(mut self, arg: T) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a borrowed binary argument, copying it.
    #[inline]
    pub fn arg_slice(mut self, arg: &[u8]) -> Self {
        self.args.push(Bytes::copy_from_slice(arg));
        self
    }

    /// Returns the command name.
    pub fn name(&self) -> Cow<'_, str> {
        self.args
            .first()
            .map(|name| String::from_utf8_lossy(name))
            .unwrap_or(Cow::Borrowed(""))
    }

    /// Returns the name followed by all arguments.
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Encodes the command as a multi-bulk request.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] if the command name is empty.
    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        let mut encoder = Encoder::new();
        encoder.encode_command(&self.args)?;
        Ok(encoder.take().freeze())
    }

    /// Converts the command to a RESP Array frame.
    #[inline]
    pub fn into_frame(self) -> Frame {
        Frame::Array(
            self.args
                .into_iter()
                .map(|b| Frame::BulkString(Some(b)))
                .collect(),
        )
    }
}

/// Creates a PING command.
#[inline]
pub fn ping() -> Cmd {
    Cmd::new("PING")
}

/// Creates an ECHO command.
#[inline]
pub fn echo(msg: impl Into<Bytes>) -> Cmd {
    Cmd::new("ECHO").arg(msg)
}

/// Creates a GET command.
#[inline]
pub fn get(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("GET").arg(key)
}

/// Creates a SET command.
#[inline]
pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Cmd {
    Cmd::new("SET").arg(key).arg(value)
}

/// Creates a DEL command.
#[inline]
pub fn del(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("DEL").arg(key)
}

/// Creates an EXISTS command for a single key.
#[inline]
pub fn exists(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("EXISTS").arg(key)
}

/// Creates an INCR command.
#[inline]
pub fn incr(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("INCR").arg(key)
}

/// Creates an INCRBY command.
#[inline]
pub fn incr_by(key: impl Into<Bytes>, amount: i64) -> Cmd {
    Cmd::new("INCRBY").arg(key).arg(amount.to_string())
}

/// Creates a TYPE command.
#[inline]
pub fn key_type(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("TYPE").arg(key)
}

/// Creates a FLUSHDB command.
#[inline]
pub fn flushdb() -> Cmd {
    Cmd::new("FLUSHDB")
}

/// Creates an AUTH command with password only.
#[inline]
pub fn auth(password: impl Into<Bytes>) -> Cmd {
    Cmd::new("AUTH").arg(password)
}

/// Creates an AUTH command with username and password (ACL style).
#[inline]
pub fn auth_with_username(username: impl Into<Bytes>, password: impl Into<Bytes>) -> Cmd {
    Cmd::new("AUTH").arg(username).arg(password)
}

/// Creates a HELLO command negotiating the given protocol version.
#[inline]
pub fn hello(protocol: u8) -> Cmd {
    Cmd::new("HELLO").arg(protocol.to_string())
}

/// Creates a SELECT command.
#[inline]
pub fn select(db: u8) -> Cmd {
    Cmd::new("SELECT").arg(db.to_string())
}

/// Creates a CLIENT SETNAME command.
#[inline]
pub fn client_setname(name: impl Into<Bytes>) -> Cmd {
    Cmd::new("CLIENT").arg("SETNAME").arg(name)
}

fn server_error(e: Vec<u8>) -> crate::Error {
    crate::Error::server(&e)
}

fn unexpected(expected: &str, frame: &Frame) -> crate::Error {
    crate::Error::protocol(format!("expected {expected}, got {frame:?}"))
}

/// Parses a frame as a server response, turning error replies into [`crate::Error::Server`].
#[inline]
pub fn parse_frame_response(frame: Frame) -> Result<Frame, crate::Error> {
    match frame {
        Frame::Error(e) => Err(server_error(e)),
        _ => Ok(frame),
    }
}

/// Converts a frame to bytes.
#[inline]
pub fn frame_to_bytes(frame: Frame) -> Result<Option<Bytes>, crate::Error> {
    match frame {
        Frame::BulkString(b) => Ok(b),
        Frame::SimpleString(s) => Ok(Some(Bytes::from(s))),
        Frame::Null => Ok(None),
        Frame::Error(e) => Err(server_error(e)),
        other => Err(unexpected("bulk string", &other)),
    }
}

/// Converts a frame to an integer.
#[inline]
pub fn frame_to_int(frame: Frame) -> Result<i64, crate::Error> {
    match frame {
        Frame::Integer(i) => Ok(i),
        Frame::BulkString(Some(b)) => std::str::from_utf8(&b)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| crate::Error::Protocol {
                message: "invalid integer".to_string(),
            }),
        Frame::Error(e) => Err(server_error(e)),
        other => Err(unexpected("integer", &other)),
    }
}

/// Converts a frame to a boolean. Accepts integer 0/1 and RESP3 booleans.
#[inline]
pub fn frame_to_bool(frame: Frame) -> Result<bool, crate::Error> {
    match frame {
        Frame::Integer(i) => Ok(i != 0),
        Frame::Boolean(b) => Ok(b),
        Frame::Error(e) => Err(server_error(e)),
        other => Err(unexpected("integer or boolean", &other)),
    }
}

/// Converts a simple `OK` status reply to `true`.
#[inline]
pub fn frame_to_ok(frame: Frame) -> Result<bool, crate::Error> {
    match frame {
        Frame::SimpleString(s) if s == b"OK" => Ok(true),
        Frame::Boolean(b) => Ok(b),
        Frame::Error(e) => Err(server_error(e)),
        other => Err(unexpected("OK", &other)),
    }
}

/// Converts a frame array to a vector of integers.
#[inline]
pub fn frame_to_vec_int(frame: Frame) -> Result<Vec<i64>, crate::Error> {
    match frame {
        Frame::Array(arr) => arr.into_iter().map(frame_to_int).collect(),
        Frame::Error(e) => Err(server_error(e)),
        other => Err(unexpected("array", &other)),
    }
}

/// Converts a frame array to a vector of booleans.
#[inline]
pub fn frame_to_vec_bool(frame: Frame) -> Result<Vec<bool>, crate::Error> {
    match frame {
        Frame::Array(arr) => arr.into_iter().map(frame_to_bool).collect(),
        Frame::Error(e) => Err(server_error(e)),
        other => Err(unexpected("array", &other)),
    }
}

/// Converts a frame to a string.
#[inline]
pub fn frame_to_string(frame: Frame) -> Result<String, crate::Error> {
    match frame {
        Frame::SimpleString(s) => Ok(String::from_utf8_lossy(&s).into_owned()),
        Frame::BulkString(Some(b)) => Ok(String::from_utf8_lossy(&b).into_owned()),
        Frame::BulkString(None) | Frame::Null => Ok(String::new()),
        Frame::Integer(i) => Ok(i.to_string()),
        Frame::Error(e) => Err(server_error(e)),
        other => Err(unexpected("string", &other)),
    }
}

/// Flattens a RESP2 `[k1, v1, k2, v2, ...]` array or a RESP3 map into pairs.
#[inline]
pub fn frame_to_pairs(frame: Frame) -> Result<Vec<(String, Frame)>, crate::Error> {
    match frame {
        Frame::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| Ok((frame_to_string(k)?, v)))
            .collect(),
        Frame::Array(arr) => {
            if arr.len() % 2 != 0 {
                return Err(crate::Error::Protocol {
                    message: "key/value reply must have an even number of elements".to_string(),
                });
            }
            let mut pairs = Vec::with_capacity(arr.len() / 2);
            let mut iter = arr.into_iter();
            while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                pairs.push((frame_to_string(key)?, value));
            }
            Ok(pairs)
        }
        Frame::Error(e) => Err(server_error(e)),
        other => Err(unexpected("map or array", &other)),
    }
}
