use bytes::Buf;
use bytes::{Bytes, BytesMut};

use crate::proto::frame::Frame;

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024; // 512 MB default

/// Deepest aggregate nesting accepted in one frame.
pub const MAX_DEPTH: usize = 512;

type Parsed = Option<(Frame, usize)>;

/// A RESP decoder that converts bytes to [`Frame`] types.
///
/// The decoder handles streaming input and can decode frames incrementally.
/// Call [`append`](Decoder::append) to add data, then [`decode`](Decoder::decode)
/// to parse frames. Returns `Ok(None)` when more data is needed; in that case
/// no bytes are consumed, so a frame split across reads is never lost.
///
/// Incomplete input is scanned once: the decoder remembers how far the
/// pending frame has been walked and resumes there on the next call, and
/// only builds the [`Frame`] once every byte of it has arrived.
///
/// # Example
///
/// ```
/// use valet::proto::codec::Decoder;
/// use valet::proto::frame::Frame;
///
/// let mut decoder = Decoder::new();
/// decoder.append(b"+OK\r\n");
/// let frame = decoder.decode().unwrap().unwrap();
/// assert_eq!(frame, Frame::SimpleString(b"OK".to_vec()));
/// ```
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    max_frame_size: usize,
    /// Bytes of the pending frame already walked.
    scanned: usize,
    /// Children still expected by each open aggregate, innermost last.
    open: Vec<usize>,
}

impl Decoder {
    /// Creates a new decoder with an empty buffer.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a new decoder with a custom maximum frame size.
    ///
    /// # Arguments
    ///
    /// * `max_frame_size` - Maximum size in bytes for a single frame
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_size,
            scanned: 0,
            open: Vec::new(),
        }
    }

    /// Appends raw bytes to the internal buffer.
    ///
    /// Call this method when new data arrives from the network.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes buffered but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Attempts to decode a frame from the buffer.
    ///
    /// Returns `Ok(Some(Frame))` if a complete frame was decoded.
    /// Returns `Ok(None)` if more data is needed.
    /// Returns `Err(...)` if the data is malformed.
    pub fn decode(&mut self) -> Result<Option<Frame>, String> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        if self.buf.len() > self.max_frame_size {
            return Err("Buffer size exceeded maximum frame size".to_string());
        }

        let Some(len) = self.scan()? else {
            return Ok(None);
        };
        match self.parse(&self.buf[..len])? {
            Some((frame, consumed)) => {
                self.buf.advance(consumed);
                Ok(Some(frame))
            }
            None => Err("frame ended early".to_string()),
        }
    }

    /// Walks the pending frame from where the last call stopped. Returns its
    /// total length once complete.
    fn scan(&mut self) -> Result<Option<usize>, String> {
        loop {
            let rest = &self.buf[self.scanned..];
            let Some(&sigil) = rest.first() else {
                return Ok(None);
            };
            let children = match sigil {
                b'+' | b'-' | b':' | b'_' | b'#' | b',' => {
                    let Some((_, used)) = line(rest) else {
                        return Ok(None);
                    };
                    self.scanned += used;
                    0
                }
                b'$' => {
                    let Some((header, header_len)) = line(rest) else {
                        return Ok(None);
                    };
                    let len = parse_int(header)?;
                    let total = match usize::try_from(len) {
                        Ok(len) if len > self.max_frame_size => {
                            return Err(
                                "Bulk string length exceeds maximum frame size".to_string()
                            );
                        }
                        Ok(len) => header_len + len + 2,
                        Err(_) => header_len,
                    };
                    if rest.len() < total {
                        return Ok(None);
                    }
                    self.scanned += total;
                    0
                }
                b'*' | b'~' | b'%' => {
                    let Some((count, header_len)) = self.aggregate_header(rest)? else {
                        return Ok(None);
                    };
                    self.scanned += header_len;
                    let per_entry = if sigil == b'%' { 2 } else { 1 };
                    count.unwrap_or(0) * per_entry
                }
                other => return Err(format!("unknown frame type: {}", other as char)),
            };

            if children > 0 {
                if self.open.len() >= MAX_DEPTH {
                    return Err(format!("frame nesting exceeds {MAX_DEPTH} levels"));
                }
                self.open.push(children);
                continue;
            }

            // One element finished; close every aggregate it completes.
            loop {
                match self.open.last_mut() {
                    None => {
                        let end = self.scanned;
                        self.scanned = 0;
                        return Ok(Some(end));
                    }
                    Some(remaining) => {
                        *remaining -= 1;
                        if *remaining > 0 {
                            break;
                        }
                        self.open.pop();
                    }
                }
            }
        }
    }

    fn parse(&self, buf: &[u8]) -> Result<Parsed, String> {
        let Some(&sigil) = buf.first() else {
            return Ok(None);
        };

        match sigil {
            b'+' => Ok(line(buf).map(|(data, used)| (Frame::SimpleString(data.to_vec()), used))),
            b'-' => Ok(line(buf).map(|(data, used)| (Frame::Error(data.to_vec()), used))),
            b':' => match line(buf) {
                Some((data, used)) => Ok(Some((Frame::Integer(parse_int(data)?), used))),
                None => Ok(None),
            },
            b'$' => self.parse_bulk_string(buf),
            b'*' | b'~' => self.parse_array(buf),
            b'%' => self.parse_map(buf),
            b'_' => match line(buf) {
                Some((data, used)) if data.is_empty() => Ok(Some((Frame::Null, used))),
                Some(_) => Err("invalid null frame".to_string()),
                None => Ok(None),
            },
            b'#' => match line(buf) {
                Some((b"t", used)) => Ok(Some((Frame::Boolean(true), used))),
                Some((b"f", used)) => Ok(Some((Frame::Boolean(false), used))),
                Some(_) => Err("invalid boolean frame".to_string()),
                None => Ok(None),
            },
            b',' => match line(buf) {
                Some((data, used)) => {
                    let value = std::str::from_utf8(data)
                        .map_err(|e| e.to_string())?
                        .parse::<f64>()
                        .map_err(|e| format!("invalid double: {e}"))?;
                    Ok(Some((Frame::Double(value), used)))
                }
                None => Ok(None),
            },
            other => Err(format!("unknown frame type: {}", other as char)),
        }
    }

    fn parse_bulk_string(&self, buf: &[u8]) -> Result<Parsed, String> {
        let Some((header, header_len)) = line(buf) else {
            return Ok(None);
        };
        let len = parse_int(header)?;

        if len == -1 {
            return Ok(Some((Frame::BulkString(None), header_len)));
        }
        if len < 0 {
            return Err(format!("invalid bulk string length: {len}"));
        }

        let len = len as usize;

        if len > self.max_frame_size {
            return Err("Bulk string length exceeds maximum frame size".to_string());
        }

        let total = header_len + len + 2;
        if buf.len() < total {
            return Ok(None);
        }
        if &buf[header_len + len..total] != b"\r\n" {
            return Err("bulk string is not terminated by CRLF".to_string());
        }

        let data = Bytes::copy_from_slice(&buf[header_len..header_len + len]);
        Ok(Some((Frame::BulkString(Some(data)), total)))
    }

    fn parse_array(&self, buf: &[u8]) -> Result<Parsed, String> {
        let Some((count, mut pos)) = self.aggregate_header(buf)? else {
            return Ok(None);
        };
        let Some(count) = count else {
            return Ok(Some((Frame::Null, pos)));
        };

        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            match self.parse(&buf[pos..])? {
                Some((frame, used)) => {
                    items.push(frame);
                    pos += used;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((Frame::Array(items), pos)))
    }

    fn parse_map(&self, buf: &[u8]) -> Result<Parsed, String> {
        let Some((count, mut pos)) = self.aggregate_header(buf)? else {
            return Ok(None);
        };
        let Some(count) = count else {
            return Ok(Some((Frame::Null, pos)));
        };

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let Some((key, used)) = self.parse(&buf[pos..])? else {
                return Ok(None);
            };
            pos += used;
            let Some((value, used)) = self.parse(&buf[pos..])? else {
                return Ok(None);
            };
            pos += used;
            entries.push((key, value));
        }

        Ok(Some((Frame::Map(entries), pos)))
    }

    /// Parses `*<n>\r\n` style headers. `Some(None)` count means a null aggregate.
    fn aggregate_header(&self, buf: &[u8]) -> Result<Option<(Option<usize>, usize)>, String> {
        let Some((header, header_len)) = line(buf) else {
            return Ok(None);
        };
        let len = parse_int(header)?;

        if len == -1 {
            return Ok(Some((None, header_len)));
        }
        if len < 0 {
            return Err(format!("invalid aggregate length: {len}"));
        }

        let len = len as usize;

        // Assume minimum 16 bytes per item
        if len > self.max_frame_size / 16 {
            return Err("Array length exceeds reasonable maximum".to_string());
        }

        Ok(Some((Some(len), header_len)))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the bytes between the sigil and the next CRLF, and the number of
/// bytes consumed including the CRLF.
fn line(buf: &[u8]) -> Option<(&[u8], usize)> {
    let end = find_crlf(buf)?;
    Some((&buf[1..end], end + 2))
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2)
        .skip(1)
        .position(|w| w == b"\r\n")
        .map(|i| i + 1)
}

fn parse_int(data: &[u8]) -> Result<i64, String> {
    std::str::from_utf8(data)
        .map_err(|e| e.to_string())?
        .parse::<i64>()
        .map_err(|e| e.to_string())
}
