//! RESP Frame types
//!
//! This module defines the Frame enum for the RESP2 values a client sends
//! and receives, plus the RESP3 null some servers emit regardless of the
//! negotiated protocol.

use bytes::Bytes;

/// RESP protocol frame types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Simple string: +OK\r\n
    Simple(Bytes),

    /// Error: -ERR message\r\n
    Error(Bytes),

    /// Integer: :1000\r\n
    Integer(i64),

    /// Bulk string: $5\r\nhello\r\n or $-1\r\n for null
    Bulk(Option<Bytes>),

    /// Array: *2\r\n... or *-1\r\n for null
    Array(Option<Vec<Frame>>),

    /// Null: _\r\n (RESP3 explicit null)
    Null,
}

impl Frame {
    /// Create a simple string frame
    #[inline]
    pub fn simple(s: impl Into<Bytes>) -> Self {
        Frame::Simple(s.into())
    }

    /// Create an error frame
    #[cold]
    #[inline]
    pub fn error(s: impl Into<Bytes>) -> Self {
        Frame::Error(s.into())
    }

    /// Create a bulk string frame
    #[inline]
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Frame::Bulk(Some(data.into()))
    }

    /// Create a null bulk string frame
    #[inline]
    pub fn null() -> Self {
        Frame::Bulk(None)
    }

    /// Create an array frame
    #[inline]
    pub fn array(frames: Vec<Frame>) -> Self {
        Frame::Array(Some(frames))
    }

    /// Build a command: an array of bulk strings, name first
    pub fn command<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        Frame::Array(Some(args.into_iter().map(Frame::bulk).collect()))
    }

    /// Check if this frame is null (bulk, array, or RESP3 Null)
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Bulk(None) | Frame::Array(None) | Frame::Null)
    }

    /// Check if this frame is an error
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }

    /// Get the string value if this is a Simple or Bulk frame
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Frame::Simple(b) => std::str::from_utf8(b).ok(),
            Frame::Bulk(Some(b)) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Convert to owned array if this is an Array frame
    pub fn into_array(self) -> Option<Vec<Frame>> {
        match self {
            Frame::Array(Some(arr)) => Some(arr),
            _ => None,
        }
    }

    /// Convert to owned bytes if this is a Bulk frame
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Frame::Bulk(Some(b)) => Some(b),
            _ => None,
        }
    }

    /// The error message as text, if this is an Error frame
    pub fn error_message(&self) -> Option<String> {
        match self {
            Frame::Error(msg) => Some(String::from_utf8_lossy(msg).into_owned()),
            _ => None,
        }
    }

    /// Short human-readable rendering used in diagnostics
    pub fn describe(&self) -> String {
        match self {
            Frame::Simple(s) => format!("+{}", String::from_utf8_lossy(s)),
            Frame::Error(s) => format!("-{}", String::from_utf8_lossy(s)),
            Frame::Integer(n) => format!(":{n}"),
            Frame::Bulk(Some(b)) => format!("${} bytes", b.len()),
            Frame::Array(Some(items)) => format!("*{} elements", items.len()),
            Frame::Bulk(None) | Frame::Array(None) | Frame::Null => "(nil)".to_string(),
        }
    }
}
