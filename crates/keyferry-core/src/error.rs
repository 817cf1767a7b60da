//! Error types for keyferry
//!
//! This module defines the error type shared by the codec, the connection
//! handle and the migration coordinator. Uses `thiserror` for ergonomic
//! error definitions.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for keyferry operations
#[derive(Error, Debug)]
pub enum KeyferryError {
    /// Protocol parsing or encoding error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the connection
    #[error("Connection closed")]
    ConnectionClosed,

    /// A previous command timed out and its reply may still arrive, so the
    /// stream can no longer be trusted.
    #[error("Connection is broken after an earlier timeout")]
    ConnectionBroken,

    /// No reply arrived before the deadline. Whether the command took
    /// effect on the store is unknown.
    #[error("Timed out after {0:?} waiting for reply")]
    Timeout(Duration),

    /// A destination key already existed and REPLACE was not given.
    ///
    /// For multi-key migrations the keys that did not conflict have still
    /// been moved (and removed from the source unless COPY was given).
    #[error("{0}")]
    Conflict(String),

    /// The destination rejected the supplied credential, or required one
    /// that was not supplied.
    #[error("{0}")]
    Authentication(String),

    /// The source could not reach or talk to the destination in time.
    #[error("{0}")]
    TargetIo(String),

    /// Any other error reply from the server
    #[error("{0}")]
    Server(String),

    /// The server answered with a reply type the command never produces
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Invalid argument value or format
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration parsing or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for keyferry operations
pub type Result<T> = std::result::Result<T, KeyferryError>;

impl KeyferryError {
    /// Returns true for connection-level failures, after which the state of
    /// the in-flight command on the store is unknown.
    #[cold]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            KeyferryError::Io(_)
                | KeyferryError::ConnectionClosed
                | KeyferryError::ConnectionBroken
                | KeyferryError::Timeout(_)
                | KeyferryError::Protocol(_)
        )
    }

    /// Returns true if the connection should be dropped after this error
    #[cold]
    pub fn is_fatal(&self) -> bool {
        self.is_transport()
    }

    /// The verbatim server message for errors that came back as a reply
    pub fn server_message(&self) -> Option<&str> {
        match self {
            KeyferryError::Conflict(msg)
            | KeyferryError::Authentication(msg)
            | KeyferryError::TargetIo(msg)
            | KeyferryError::Server(msg) => Some(msg),
            _ => None,
        }
    }
}
