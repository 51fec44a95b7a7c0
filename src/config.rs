//! Run and server configuration, resolved once at startup and passed down.

use crate::model::parse_iso_utc;
use crate::transport::Backend;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("cannot load settings from {path}: {reason}")]
    Settings { path: PathBuf, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Historical,
    Live,
}

impl Mode {
    /// Exactly one of the two mode flags must be set.
    pub fn from_flags(historical: bool, live: bool) -> Result<Self, ConfigError> {
        match (historical, live) {
            (true, false) => Ok(Mode::Historical),
            (false, true) => Ok(Mode::Live),
            (true, true) => Err(ConfigError::InvalidParameter {
                name: "mode",
                reason: "--historical and --live are mutually exclusive".into(),
            }),
            (false, false) => Err(ConfigError::MissingParameter("--historical or --live")),
        }
    }
}

/// Per-event delivery policy handed to every worker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeliveryOptions {
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

/// ISO-8601 timestamp. Values without an offset are read as UTC, and a bare
/// date means midnight.
pub fn parse_timestamp(name: &'static str, raw: &str) -> Result<DateTime<Utc>, ConfigError> {
    parse_iso_utc(raw).ok_or_else(|| ConfigError::InvalidParameter {
        name,
        reason: format!("'{}' is not an ISO-8601 datetime", raw.trim()),
    })
}

pub fn parse_optional_timestamp(
    name: &'static str,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ConfigError> {
    raw.map(|r| parse_timestamp(name, r)).transpose()
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub backend: Backend,
    pub bootstrap_servers: String,
    pub topic: String,
    pub producer_opts: BTreeMap<String, String>,
    pub flush_timeout_ms: u64,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Kafka,
            bootstrap_servers: "localhost:9092".into(),
            topic: "song-plays".into(),
            producer_opts: BTreeMap::new(),
            flush_timeout_ms: 5_000,
        }
    }
}

/// Ingestion server settings. Missing keys take their defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub log: LogSettings,
}

impl Settings {
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Defaults, overlaid with `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Settings {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&raw).map_err(|e| ConfigError::Settings {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
