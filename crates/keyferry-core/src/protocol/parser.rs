//! RESP protocol parser
//!
//! This module implements a streaming parser for RESP replies. A frame is
//! only consumed from the buffer once it has arrived completely.

use std::io::Cursor;

use bytes::{Buf, Bytes, BytesMut};

use super::Frame;

/// Protocol parser limits to bound memory use on hostile or broken peers.
///
/// Lengths are checked against these limits before anything is allocated.
#[derive(Debug, Clone)]
pub struct ParserLimits {
    /// Maximum bulk string size in bytes (default: 512MB, matches Redis)
    pub max_bulk_string_size: usize,
    /// Maximum number of elements in an array (default: 1,048,576)
    pub max_array_elements: usize,
    /// Maximum nesting depth for arrays (default: 64)
    pub max_nesting_depth: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_bulk_string_size: 512 * 1024 * 1024,
            max_array_elements: 1_048_576,
            max_nesting_depth: 64,
        }
    }
}

/// Parse error types
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Not enough data to parse a complete frame
    Incomplete,

    /// Invalid protocol format
    Invalid(String),

    /// Invalid UTF-8 where a number was expected
    InvalidUtf8,

    /// Frame exceeds configured size limits
    FrameTooLarge(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Incomplete => write!(f, "incomplete data"),
            ParseError::Invalid(msg) => write!(f, "invalid protocol: {}", msg),
            ParseError::InvalidUtf8 => write!(f, "invalid UTF-8"),
            ParseError::FrameTooLarge(msg) => write!(f, "frame too large: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for crate::error::KeyferryError {
    fn from(e: ParseError) -> Self {
        crate::error::KeyferryError::Protocol(e.to_string())
    }
}

#[cold]
#[inline(never)]
fn invalid_byte_error(byte: u8) -> ParseError {
    ParseError::Invalid(format!("unexpected byte: {:02x}", byte))
}

#[cold]
#[inline(never)]
fn invalid_integer_error(s: &str) -> ParseError {
    ParseError::Invalid(format!("invalid integer: {}", s))
}

#[cold]
#[inline(never)]
fn expected_crlf_error() -> ParseError {
    ParseError::Invalid("expected CRLF".to_string())
}

#[cold]
#[inline(never)]
fn too_large_error(kind: &str, size: usize, max: usize) -> ParseError {
    ParseError::FrameTooLarge(format!("{} size {} exceeds limit {}", kind, size, max))
}

/// Parse a RESP frame from the buffer
///
/// Returns Ok(Some(frame)) if a complete frame was parsed,
/// Ok(None) if more data is needed, or Err if the data is invalid.
///
/// Uses default parser limits. For custom limits, use [`parse_frame_with_limits`].
pub fn parse_frame(buf: &mut BytesMut) -> Result<Option<Frame>, ParseError> {
    parse_frame_with_limits(buf, &ParserLimits::default())
}

/// Parse a RESP frame from the buffer with configurable limits.
pub fn parse_frame_with_limits(
    buf: &mut BytesMut,
    limits: &ParserLimits,
) -> Result<Option<Frame>, ParseError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(&buf[..]);
    match parse_value(&mut cursor, limits, 0) {
        Ok(frame) => {
            let len = cursor.position() as usize;
            buf.advance(len);
            Ok(Some(frame))
        }
        Err(ParseError::Incomplete) => Ok(None),
        Err(e) => Err(e),
    }
}

fn parse_value(
    cursor: &mut Cursor<&[u8]>,
    limits: &ParserLimits,
    depth: usize,
) -> Result<Frame, ParseError> {
    if depth > limits.max_nesting_depth {
        return Err(too_large_error("nesting depth", depth, limits.max_nesting_depth));
    }

    match get_byte(cursor)? {
        b'+' => Ok(Frame::Simple(Bytes::copy_from_slice(read_line(cursor)?))),
        b'-' => Ok(Frame::Error(Bytes::copy_from_slice(read_line(cursor)?))),
        b':' => Ok(Frame::Integer(read_decimal(cursor)?)),
        b'$' => {
            let len = read_decimal(cursor)?;
            if len == -1 {
                return Ok(Frame::null());
            }
            if len < -1 {
                return Err(ParseError::Invalid("negative bulk string length".into()));
            }
            let len = len as usize;
            if len > limits.max_bulk_string_size {
                return Err(too_large_error("bulk string", len, limits.max_bulk_string_size));
            }
            let data = read_bytes(cursor, len)?;
            skip_crlf(cursor)?;
            Ok(Frame::Bulk(Some(Bytes::copy_from_slice(data))))
        }
        b'*' => {
            let count = read_decimal(cursor)?;
            if count == -1 {
                return Ok(Frame::Array(None));
            }
            if count < -1 {
                return Err(ParseError::Invalid("negative array length".into()));
            }
            let count = count as usize;
            if count > limits.max_array_elements {
                return Err(too_large_error("array", count, limits.max_array_elements));
            }
            // Cap the preallocation; the count is peer-controlled.
            let mut frames = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                frames.push(parse_value(cursor, limits, depth + 1)?);
            }
            Ok(Frame::Array(Some(frames)))
        }
        b'_' => {
            skip_crlf(cursor)?;
            Ok(Frame::Null)
        }
        byte => Err(invalid_byte_error(byte)),
    }
}

#[inline]
fn get_byte(cursor: &mut Cursor<&[u8]>) -> Result<u8, ParseError> {
    if !cursor.has_remaining() {
        return Err(ParseError::Incomplete);
    }
    Ok(cursor.get_u8())
}

/// Read a line (excluding \r\n)
#[inline]
fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], ParseError> {
    let start = cursor.position() as usize;
    let buf: &'a [u8] = cursor.get_ref();

    for i in start..buf.len().saturating_sub(1) {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            cursor.set_position((i + 2) as u64);
            return Ok(&buf[start..i]);
        }
    }

    Err(ParseError::Incomplete)
}

/// Read a decimal number (possibly negative) followed by \r\n
#[inline]
fn read_decimal(cursor: &mut Cursor<&[u8]>) -> Result<i64, ParseError> {
    let line = read_line(cursor)?;
    let s = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;
    s.parse().map_err(|_| invalid_integer_error(s))
}

/// Read exactly n bytes
#[inline]
fn read_bytes<'a>(cursor: &mut Cursor<&'a [u8]>, n: usize) -> Result<&'a [u8], ParseError> {
    let start = cursor.position() as usize;
    let buf: &'a [u8] = cursor.get_ref();

    if buf.len() - start < n {
        return Err(ParseError::Incomplete);
    }

    cursor.set_position((start + n) as u64);
    Ok(&buf[start..start + n])
}

#[inline]
fn skip_crlf(cursor: &mut Cursor<&[u8]>) -> Result<(), ParseError> {
    let pos = cursor.position() as usize;
    let buf = cursor.get_ref();

    if pos + 2 > buf.len() {
        return Err(ParseError::Incomplete);
    }
    if buf[pos] != b'\r' || buf[pos + 1] != b'\n' {
        return Err(expected_crlf_error());
    }

    cursor.advance(2);
    Ok(())
}
