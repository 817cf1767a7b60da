//! RESP protocol implementation
//!
//! This module implements the subset of the Redis Serialization Protocol a
//! client needs: encoding command arrays and parsing replies.

mod encoder;
mod frame;
mod parser;

pub use encoder::{encode_frame, encode_to_bytes};
pub use frame::Frame;
pub use parser::{parse_frame, parse_frame_with_limits, ParseError, ParserLimits};
