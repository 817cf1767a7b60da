//! Configuration module for keyferry
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all optional values.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::{Connection, Endpoint, DEFAULT_PORT, DEFAULT_TIMEOUT};
use crate::error::{KeyferryError, Result};
use crate::migrate::DEFAULT_REPLY_GRACE;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source instance the MIGRATE command is sent to
    pub source: SourceConfig,

    /// Migration defaults
    pub migrate: MigrateConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            KeyferryError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| KeyferryError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| KeyferryError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.source.host.is_empty() {
            return Err(KeyferryError::Config("Source host cannot be empty".to_string()));
        }

        if self.source.port == 0 {
            return Err(KeyferryError::Config("Source port cannot be 0".to_string()));
        }

        if self.source.timeout_ms == 0 {
            return Err(KeyferryError::Config(
                "Source timeout cannot be 0".to_string(),
            ));
        }

        if self.source.username.is_some() && self.source.password.is_none() {
            return Err(KeyferryError::Config(
                "Source username given without a password".to_string(),
            ));
        }

        if self.migrate.timeout_ms == 0 {
            return Err(KeyferryError::Config(
                "Migrate timeout cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Write configuration to a TOML file
    ///
    /// Uses atomic write (temp file + rename) to prevent corruption.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let toml_str = self.to_toml()?;

        let temp_path = path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_str).map_err(|e| {
            KeyferryError::Config(format!("Failed to write temp config file: {}", e))
        })?;

        std::fs::rename(&temp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            KeyferryError::Config(format!("Failed to rename config file: {}", e))
        })?;

        Ok(())
    }
}

/// Source connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Host of the source instance
    pub host: String,

    /// Port of the source instance
    pub port: u16,

    /// ACL user name (None for the default user)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password (None when the source has no auth)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database the source connection selects
    pub db: u32,

    /// Connect and command timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            db: 0,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl SourceConfig {
    /// Endpoint of the source instance
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
            .with_timeout(Duration::from_millis(self.timeout_ms))
    }

    /// Connect, authenticate if a password is configured, and select `db`
    pub async fn connect(&self) -> Result<Connection> {
        let mut conn = Connection::connect(&self.endpoint()).await?;
        if let Some(password) = &self.password {
            conn.authenticate(self.username.as_deref(), password).await?;
        }
        if self.db != 0 {
            conn.select(self.db).await?;
        }
        Ok(conn)
    }
}

/// Migration defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Timeout passed to MIGRATE, in milliseconds
    pub timeout_ms: u64,

    /// Extra client wait beyond `timeout_ms`, in milliseconds
    pub reply_grace_ms: u64,

    /// Pass COPY by default
    pub copy: bool,

    /// Pass REPLACE by default
    pub replace: bool,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            reply_grace_ms: DEFAULT_REPLY_GRACE.as_millis() as u64,
            copy: false,
            replace: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,

    /// JSON format
    Json,
}
