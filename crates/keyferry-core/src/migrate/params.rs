//! MIGRATE option flags

use std::fmt;

use bytes::Bytes;

/// Credential the source presents to the destination
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// `AUTH <password>`
    Password(String),
    /// `AUTH2 <username> <password>`
    UserPassword {
        /// ACL user name
        username: String,
        /// Password for `username`
        password: String,
    },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::UserPassword { username, .. } => f
                .debug_struct("UserPassword")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Options of a MIGRATE call: `COPY`, `REPLACE` and an optional credential.
///
/// Built by chaining:
///
/// ```
/// use keyferry_core::migrate::MigrateParams;
///
/// let params = MigrateParams::new().copy().replace().auth("foobared");
/// assert!(params.is_copy() && params.is_replace());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrateParams {
    copy: bool,
    replace: bool,
    credential: Option<Credential>,
}

impl MigrateParams {
    /// No options: move the keys, fail on existing destination keys
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the keys on the source
    pub fn copy(mut self) -> Self {
        self.copy = true;
        self
    }

    /// Overwrite keys that already exist on the destination
    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Authenticate to the destination with a password
    pub fn auth(mut self, password: impl Into<String>) -> Self {
        self.credential = Some(Credential::Password(password.into()));
        self
    }

    /// Authenticate to the destination as an ACL user
    pub fn auth2(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credential = Some(Credential::UserPassword {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Whether `COPY` is set
    pub fn is_copy(&self) -> bool {
        self.copy
    }

    /// Whether `REPLACE` is set
    pub fn is_replace(&self) -> bool {
        self.replace
    }

    /// The destination credential, if any
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// True when no option is set
    pub fn is_empty(&self) -> bool {
        !self.copy && !self.replace && self.credential.is_none()
    }

    /// Append the option tokens in the order the server expects them
    pub(crate) fn append_args(&self, args: &mut Vec<Bytes>) {
        if self.copy {
            args.push(Bytes::from_static(b"COPY"));
        }
        if self.replace {
            args.push(Bytes::from_static(b"REPLACE"));
        }
        match &self.credential {
            Some(Credential::Password(password)) => {
                args.push(Bytes::from_static(b"AUTH"));
                args.push(Bytes::copy_from_slice(password.as_bytes()));
            }
            Some(Credential::UserPassword { username, password }) => {
                args.push(Bytes::from_static(b"AUTH2"));
                args.push(Bytes::copy_from_slice(username.as_bytes()));
                args.push(Bytes::copy_from_slice(password.as_bytes()));
            }
            None => {}
        }
    }
}
