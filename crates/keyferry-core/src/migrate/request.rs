//! MIGRATE request construction
//!
//! A [`MigrateRequest`] is built fresh for every call and encodes to one of
//! the two equivalent wire forms:
//!
//! ```text
//! MIGRATE host port key db timeout-ms [COPY] [REPLACE] [AUTH pw | AUTH2 user pw]
//! MIGRATE host port "" db timeout-ms [COPY] [REPLACE] [AUTH pw | AUTH2 user pw] KEYS key [key ...]
//! ```

use std::time::Duration;

use bytes::Bytes;

use super::params::MigrateParams;
use crate::connection::Endpoint;
use crate::error::{KeyferryError, Result};
use crate::protocol::Frame;

/// Which of the two equivalent command layouts to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireForm {
    /// Key in the third argument; exactly one key
    SingleKey,
    /// Empty third argument followed by `KEYS k1 k2 ...`
    Keys,
}

/// One MIGRATE invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateRequest {
    destination: Endpoint,
    db: u32,
    timeout: Duration,
    params: MigrateParams,
    keys: Vec<Bytes>,
    form: WireForm,
}

impl MigrateRequest {
    /// Single-key shorthand with no options
    pub fn single(destination: Endpoint, key: impl Into<Bytes>, db: u32, timeout: Duration) -> Self {
        Self {
            destination,
            db,
            timeout,
            params: MigrateParams::default(),
            keys: vec![key.into()],
            form: WireForm::SingleKey,
        }
    }

    /// Start building a request that uses the `KEYS` form
    pub fn builder(destination: Endpoint) -> MigrateRequestBuilder {
        MigrateRequestBuilder::new(destination)
    }

    /// Destination endpoint
    pub fn destination(&self) -> &Endpoint {
        &self.destination
    }

    /// Destination database index
    pub fn db(&self) -> u32 {
        self.db
    }

    /// Timeout the source applies to its exchange with the destination
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Option flags
    pub fn params(&self) -> &MigrateParams {
        &self.params
    }

    /// Keys to migrate, in request order
    pub fn keys(&self) -> &[Bytes] {
        &self.keys
    }

    /// Wire layout this request encodes to
    pub fn form(&self) -> WireForm {
        self.form
    }

    /// Command arguments, command name first
    pub fn to_args(&self) -> Vec<Bytes> {
        let mut args = Vec::with_capacity(8 + self.keys.len());
        args.push(Bytes::from_static(b"MIGRATE"));
        args.push(Bytes::copy_from_slice(self.destination.host.as_bytes()));
        args.push(Bytes::from(self.destination.port.to_string()));

        match self.form {
            WireForm::SingleKey => args.push(self.keys[0].clone()),
            WireForm::Keys => args.push(Bytes::new()),
        }

        args.push(Bytes::from(self.db.to_string()));
        args.push(Bytes::from(self.timeout.as_millis().to_string()));
        self.params.append_args(&mut args);

        if self.form == WireForm::Keys {
            args.push(Bytes::from_static(b"KEYS"));
            args.extend(self.keys.iter().cloned());
        }
        args
    }

    /// Encode as a RESP command array
    pub fn to_frame(&self) -> Frame {
        Frame::command(self.to_args())
    }
}

/// Incremental builder for [`MigrateRequest`]
#[derive(Debug, Clone)]
pub struct MigrateRequestBuilder {
    destination: Endpoint,
    db: u32,
    timeout: Option<Duration>,
    params: MigrateParams,
    keys: Vec<Bytes>,
}

impl MigrateRequestBuilder {
    /// Builder targeting `destination`, database 0
    pub fn new(destination: Endpoint) -> Self {
        Self {
            destination,
            db: 0,
            timeout: None,
            params: MigrateParams::default(),
            keys: Vec::new(),
        }
    }

    /// Destination database index
    pub fn db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }

    /// Override the timeout; defaults to the destination endpoint's timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Option flags
    pub fn params(mut self, params: MigrateParams) -> Self {
        self.params = params;
        self
    }

    /// Add one key
    pub fn key(mut self, key: impl Into<Bytes>) -> Self {
        self.keys.push(key.into());
        self
    }

    /// Add several keys, keeping their order. Duplicates are passed through.
    pub fn keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Bytes>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Freeze the request. Fails only when no key was given.
    pub fn build(self) -> Result<MigrateRequest> {
        if self.keys.is_empty() {
            return Err(KeyferryError::InvalidArgument(
                "MIGRATE needs at least one key".to_string(),
            ));
        }

        let timeout = self.timeout.unwrap_or(self.destination.timeout);
        Ok(MigrateRequest {
            destination: self.destination,
            db: self.db,
            timeout,
            params: self.params,
            keys: self.keys,
            form: WireForm::Keys,
        })
    }
}
