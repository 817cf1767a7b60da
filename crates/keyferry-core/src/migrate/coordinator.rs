//! MIGRATE execution
//!
//! The [`Migrator`] sends a request over the source connection and
//! classifies the reply. The source store performs the transfer itself; no
//! data passes through the client. Nothing is retried: after a transport
//! failure the store-side state is unknown and only the caller can decide
//! whether re-checking the keys and trying again is safe.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::params::MigrateParams;
use super::reply::{interpret_reply, MigrateOutcome};
use super::request::MigrateRequest;
use crate::config::MigrateConfig;
use crate::connection::{CommandTransport, Connection, Endpoint};
use crate::error::{KeyferryError, Result};

/// Default extra time the client waits beyond the request timeout (1 second)
pub const DEFAULT_REPLY_GRACE: Duration = Duration::from_millis(1000);

/// Executes MIGRATE requests against a source transport
#[derive(Debug, Clone)]
pub struct Migrator {
    reply_grace: Duration,
}

impl Default for Migrator {
    fn default() -> Self {
        Self {
            reply_grace: DEFAULT_REPLY_GRACE,
        }
    }
}

impl Migrator {
    /// Migrator with the default reply grace
    pub fn new() -> Self {
        Self::default()
    }

    /// Migrator configured from the `[migrate]` section
    pub fn from_config(config: &MigrateConfig) -> Self {
        Self {
            reply_grace: Duration::from_millis(config.reply_grace_ms),
        }
    }

    /// Set how long to wait for the reply beyond the request timeout
    pub fn with_reply_grace(mut self, grace: Duration) -> Self {
        self.reply_grace = grace;
        self
    }

    /// Extra wait beyond the request timeout
    pub fn reply_grace(&self) -> Duration {
        self.reply_grace
    }

    /// How long the client waits for the reply to `request`.
    ///
    /// The source spends up to the request timeout on the destination, so
    /// the client deadline must outlast it.
    pub fn deadline_for(&self, request: &MigrateRequest) -> Duration {
        request.timeout().saturating_add(self.reply_grace)
    }

    /// Run `request` over `source`.
    ///
    /// Returns [`MigrateOutcome::NoKey`] when no requested key existed.
    /// A [`KeyferryError::Conflict`] from a multi-key request still leaves
    /// the non-conflicting keys migrated.
    pub async fn migrate<T>(&self, source: &mut T, request: &MigrateRequest) -> Result<MigrateOutcome>
    where
        T: CommandTransport + ?Sized,
    {
        let params = request.params();
        let destination = request.destination();
        let deadline = self.deadline_for(request);
        let started = Instant::now();

        debug!(
            %destination,
            db = request.db(),
            keys = request.keys().len(),
            copy = params.is_copy(),
            replace = params.is_replace(),
            auth = params.credential().is_some(),
            ?deadline,
            "sending MIGRATE"
        );

        let reply = match source.round_trip(&request.to_frame(), deadline).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(%destination, error = %e, "MIGRATE transport failure, store-side state unknown");
                return Err(e);
            }
        };

        match interpret_reply(reply) {
            Ok(outcome) => {
                info!(
                    %destination,
                    db = request.db(),
                    keys = request.keys().len(),
                    %outcome,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "MIGRATE completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                match &e {
                    KeyferryError::Conflict(_) => warn!(
                        %destination,
                        keys = request.keys().len(),
                        "MIGRATE hit existing destination keys; non-conflicting keys were moved"
                    ),
                    KeyferryError::Authentication(_) => {
                        warn!(%destination, "destination rejected MIGRATE credential")
                    }
                    _ => warn!(%destination, error = %e, "MIGRATE failed"),
                }
                Err(e)
            }
        }
    }
}

impl Connection {
    /// Move one key to `host:port`, database `db`, using the single-key form
    pub async fn migrate(
        &mut self,
        host: &str,
        port: u16,
        key: impl Into<Bytes>,
        db: u32,
        timeout: Duration,
    ) -> Result<MigrateOutcome> {
        let destination = Endpoint::new(host, port).with_timeout(timeout);
        let request = MigrateRequest::single(destination, key, db, timeout);
        Migrator::new().migrate(self, &request).await
    }

    /// Move `keys` to `host:port`, database `db`, using the `KEYS` form
    pub async fn migrate_keys<I, K>(
        &mut self,
        host: &str,
        port: u16,
        db: u32,
        timeout: Duration,
        params: &MigrateParams,
        keys: I,
    ) -> Result<MigrateOutcome>
    where
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        let destination = Endpoint::new(host, port).with_timeout(timeout);
        let request = MigrateRequest::builder(destination)
            .db(db)
            .timeout(timeout)
            .params(params.clone())
            .keys(keys)
            .build()?;
        Migrator::new().migrate(self, &request).await
    }
}
