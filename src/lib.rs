//! # keyferry
//!
//! Move keys between RESP key-value store instances with `MIGRATE`.
//!
//! This is the top-level crate; it re-exports `keyferry-core` and ships the
//! `keyferry` command-line tool.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | RESP frames, encoder and streaming parser |
//! | [`connection`] | Connection handle bound to one instance and database |
//! | [`migrate`] | MIGRATE options, request builder, reply interpreter, coordinator |
//! | [`config`] | TOML configuration |
//! | [`error`] | Error taxonomy |

pub use keyferry_core::config;
pub use keyferry_core::connection;
pub use keyferry_core::error;
pub use keyferry_core::migrate;
pub use keyferry_core::protocol;

pub use keyferry_core::{
    CommandTransport, Connection, Endpoint, KeyferryError, MigrateOutcome, MigrateParams,
    MigrateRequest, Migrator, Result,
};
