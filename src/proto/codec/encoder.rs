use bytes::{BufMut, Bytes, BytesMut};

use crate::proto::error::EncodeError;
use crate::proto::frame::Frame;

/// A RESP encoder that converts [`Frame`] types and commands to bytes.
///
/// The encoder accumulates data in an internal buffer and can be used
/// to encode multiple frames sequentially.
///
/// # Example
///
/// ```
/// use valet::proto::codec::Encoder;
/// use valet::proto::frame::Frame;
///
/// let mut encoder = Encoder::new();
/// encoder.encode(&Frame::SimpleString(b"OK".to_vec()));
/// let data = encoder.take();
/// assert_eq!(&data[..], b"+OK\r\n");
/// ```
#[derive(Debug)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates a new encoder with an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Encodes a frame into the internal buffer using RESP protocol.
    ///
    /// # Arguments
    ///
    /// * `frame` - The frame to encode
    pub fn encode(&mut self, frame: &Frame) {
        match frame {
            Frame::SimpleString(s) => {
                self.buf.put_u8(b'+');
                self.buf.extend_from_slice(s);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::Error(e) => {
                self.buf.put_u8(b'-');
                self.buf.extend_from_slice(e);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::Integer(n) => {
                self.buf.put_u8(b':');
                self.put_decimal(*n);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::BulkString(Some(data)) => self.put_bulk(data),
            Frame::BulkString(None) => {
                self.buf.extend_from_slice(b"$-1\r\n");
            }
            Frame::Null => {
                self.buf.extend_from_slice(b"_\r\n");
            }
            Frame::Array(a) => {
                self.put_header(b'*', a.len());
                for item in a {
                    self.encode(item);
                }
            }
            Frame::Map(entries) => {
                self.put_header(b'%', entries.len());
                for (key, value) in entries {
                    self.encode(key);
                    self.encode(value);
                }
            }
            Frame::Boolean(b) => {
                self.buf
                    .extend_from_slice(if *b { b"#t\r\n" } else { b"#f\r\n" });
            }
            Frame::Double(d) => {
                self.buf.put_u8(b',');
                if d.is_nan() {
                    self.buf.extend_from_slice(b"nan");
                } else {
                    self.buf.extend_from_slice(d.to_string().as_bytes());
                }
                self.buf.extend_from_slice(b"\r\n");
            }
        }
    }

    /// Encodes a command as a multi-bulk request.
    ///
    /// The first element is the command name. Arguments are written as raw
    /// bytes, without escaping. On error the buffer is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when the command name is missing or empty.
    pub fn encode_command(&mut self, args: &[Bytes]) -> Result<(), EncodeError> {
        match args.first() {
            None => return Err(EncodeError::new("command has no name")),
            Some(name) if name.is_empty() => {
                return Err(EncodeError::new("command name is empty"))
            }
            Some(_) => {}
        }

        self.put_header(b'*', args.len());
        for arg in args {
            self.put_bulk(arg);
        }
        Ok(())
    }

    /// Takes the encoded data from the buffer, leaving it empty.
    ///
    /// # Returns
    ///
    /// The accumulated bytes
    pub fn take(&mut self) -> BytesMut {
        self.buf.split()
    }

    fn put_header(&mut self, sigil: u8, len: usize) {
        self.buf.put_u8(sigil);
        self.buf.extend_from_slice(len.to_string().as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }

    fn put_bulk(&mut self, data: &[u8]) {
        self.put_header(b'$', data.len());
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
    }

    fn put_decimal(&mut self, n: i64) {
        self.buf.extend_from_slice(n.to_string().as_bytes());
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
