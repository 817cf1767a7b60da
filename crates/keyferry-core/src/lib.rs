//! # keyferry-core
//!
//! Client-side core of the `MIGRATE` key-migration protocol: a RESP codec, a
//! connection handle bound to one store instance and database, and the
//! coordinator that submits a migration to the source store and turns its
//! reply into a typed result.
//!
//! The source store moves the data itself. This crate builds the request,
//! waits for the verdict and reports it:
//!
//! | Reply | Result |
//! |-------|--------|
//! | `+OK` | `Ok(MigrateOutcome::Ok)` |
//! | `+NOKEY` | `Ok(MigrateOutcome::NoKey)` |
//! | `-...BUSYKEY...` | `Err(KeyferryError::Conflict)` |
//! | `-...NOAUTH/WRONGPASS...` | `Err(KeyferryError::Authentication)` |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod migrate;
pub mod protocol;

pub use connection::{CommandTransport, Connection, Endpoint};
pub use error::{KeyferryError, Result};
pub use migrate::{MigrateOutcome, MigrateParams, MigrateRequest, Migrator};
