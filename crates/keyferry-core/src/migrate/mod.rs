//! Key migration between store instances
//!
//! This module implements the client side of `MIGRATE`:
//! - [`MigrateParams`] for the COPY / REPLACE / AUTH options
//! - [`MigrateRequest`] for building the command in either wire form
//! - [`interpret_reply`] for classifying the source's answer
//! - [`Migrator`] for running a request over a source connection
//!
//! ```no_run
//! use std::time::Duration;
//! use keyferry_core::connection::{Connection, Endpoint};
//! use keyferry_core::migrate::MigrateParams;
//!
//! # async fn run() -> keyferry_core::error::Result<()> {
//! let mut source = Connection::connect(&Endpoint::new("127.0.0.1", 6379)).await?;
//! let outcome = source
//!     .migrate_keys(
//!         "127.0.0.1",
//!         6380,
//!         2,
//!         Duration::from_secs(2),
//!         &MigrateParams::new().replace(),
//!         ["foo1", "foo2"],
//!     )
//!     .await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod params;
mod reply;
mod request;

pub use coordinator::{Migrator, DEFAULT_REPLY_GRACE};
pub use params::{Credential, MigrateParams};
pub use reply::{classify_error, interpret_reply, MigrateOutcome};
pub use request::{MigrateRequest, MigrateRequestBuilder, WireForm};
