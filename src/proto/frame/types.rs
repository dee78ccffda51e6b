use bytes::Bytes;

/// A RESP (Redis Serialization Protocol) frame.
///
/// This enum represents the reply type lattice of the server:
/// - SimpleString: Status responses like "OK"
/// - Error: Error responses from the server
/// - Integer: Numeric responses
/// - BulkString: Binary-safe string data
/// - Array: Command arguments and array responses
/// - Null: NULL value
/// - Map, Boolean, Double: RESP3 additions, decodable on any connection
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string (+OK).
    SimpleString(Vec<u8>),
    /// Error (-ERR).
    Error(Vec<u8>),
    /// Integer (:1000).
    Integer(i64),
    /// Bulk string ($6\r\nfoobar).
    BulkString(Option<Bytes>),
    /// Array (*2\r\n...).
    Array(Vec<Frame>),
    /// Null ($-1, *-1 or _).
    Null,
    /// Map (%1\r\n...), kept in wire order.
    Map(Vec<(Frame, Frame)>),
    /// Boolean (#t / #f).
    Boolean(bool),
    /// Double (,3.14).
    Double(f64),
}

impl Frame {
    /// Builds a bulk string frame from anything convertible to [`Bytes`].
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Frame::BulkString(Some(data.into()))
    }

    /// Builds a simple string frame.
    pub fn simple(s: &str) -> Self {
        Frame::SimpleString(s.as_bytes().to_vec())
    }

    /// Builds an error frame.
    pub fn error(message: impl Into<String>) -> Self {
        Frame::Error(message.into().into_bytes())
    }

    /// Returns the raw payload of a string-like frame.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Frame::SimpleString(s) => Some(s),
            Frame::BulkString(Some(b)) => Some(b),
            _ => None,
        }
    }

    /// Attempts to extract an integer from this frame.
    ///
    /// # Returns
    ///
    /// Some(i64) if this is an Integer, None otherwise
    pub fn to_int(&self) -> Option<i64> {
        match self {
            Frame::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns true if this frame is Null (or a null bulk string).
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null | Frame::BulkString(None))
    }

    /// Returns true if this frame is an error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }
}
