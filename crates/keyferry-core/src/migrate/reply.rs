//! MIGRATE reply classification
//!
//! The source answers `+OK`, `+NOKEY`, or an error reply. Error replies are
//! sorted into conflict, authentication, destination I/O and everything
//! else, always keeping the server text verbatim.

use std::fmt;

use crate::error::{KeyferryError, Result};
use crate::protocol::Frame;

/// Successful result of a MIGRATE call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateOutcome {
    /// The command completed and the existing keys were transferred
    Ok,
    /// None of the requested keys existed on the source; nothing happened
    NoKey,
}

impl MigrateOutcome {
    /// The status text the server used
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrateOutcome::Ok => "OK",
            MigrateOutcome::NoKey => "NOKEY",
        }
    }

    /// True when nothing was migrated
    pub fn is_noop(&self) -> bool {
        matches!(self, MigrateOutcome::NoKey)
    }
}

impl fmt::Display for MigrateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const AUTH_MARKERS: &[&str] = &[
    "NOAUTH",
    "WRONGPASS",
    "invalid password",
    "invalid username-password pair",
];

/// Classify a raw MIGRATE reply
pub fn interpret_reply(reply: Frame) -> Result<MigrateOutcome> {
    match reply {
        Frame::Simple(ref status) | Frame::Bulk(Some(ref status)) => match &status[..] {
            b"OK" => Ok(MigrateOutcome::Ok),
            b"NOKEY" => Ok(MigrateOutcome::NoKey),
            _ => Err(KeyferryError::UnexpectedReply(reply.describe())),
        },
        Frame::Error(msg) => Err(classify_error(String::from_utf8_lossy(&msg).into_owned())),
        other => Err(KeyferryError::UnexpectedReply(other.describe())),
    }
}

/// Map an error reply message to the matching error variant
pub fn classify_error(message: String) -> KeyferryError {
    if message.contains("BUSYKEY") {
        KeyferryError::Conflict(message)
    } else if AUTH_MARKERS.iter().any(|marker| message.contains(marker)) {
        KeyferryError::Authentication(message)
    } else if message.starts_with("IOERR") {
        KeyferryError::TargetIo(message)
    } else {
        KeyferryError::Server(message)
    }
}
