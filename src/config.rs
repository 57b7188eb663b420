//! Configuration using Figment
//!
//! Configuration is layered from:
//! 1. Built-in defaults
//! 2. A TOML file (optional)
//! 3. Environment variables prefixed with `AVMATRIX_` (nested keys separated by `__`)
//!
//! # Example
//! ```toml
//! mock = false
//!
//! [http]
//! timeout = "10s"
//!
//! [addressing]
//! subnet_prefix = 24
//! enforce_shared_subnet = false
//! flag_reserved_channels = true
//!
//! [drift]
//! workers = 4
//! queue_depth = 64
//!
//! [hosts]
//! rx-lobby = "10.0.5.10"
//! tx-stage = "10.0.5.42"
//! ```
//!
//! `AVMATRIX_HTTP__TIMEOUT=2s` overrides the request timeout.

use crate::addressing::{AddressingScheme, SHARED_PREFIX_LEN};
use crate::error::ConfigError;
use crate::protocol::DEFAULT_TIMEOUT;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "AVMATRIX_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Use a simulated device network instead of HTTP
    #[serde(default)]
    pub mock: bool,
    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Address/channel mapping policy
    #[serde(default)]
    pub addressing: AddressingConfig,
    /// Background drift check pool
    #[serde(default)]
    pub drift: DriftConfig,
    /// Static host name table, consulted before DNS
    #[serde(default)]
    pub hosts: HashMap<String, Ipv4Addr>,
}

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bound on each request/response exchange
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// Address/channel mapping policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressingConfig {
    /// Prefix length shared by receivers and transmitters (only 24 is supported)
    #[serde(default = "default_subnet_prefix")]
    pub subnet_prefix: u8,
    /// Refuse routes whose transmitter is outside the receiver's subnet
    #[serde(default)]
    pub enforce_shared_subnet: bool,
    /// Warn when a derived channel is 0 or 255
    #[serde(default = "default_true")]
    pub flag_reserved_channels: bool,
}

/// Background drift check pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Maximum concurrent checks
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum queued checks before new ones are dropped
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

// Default value functions
fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_subnet_prefix() -> u8 {
    SHARED_PREFIX_LEN
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    4
}

fn default_queue_depth() -> usize {
    64
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            subnet_prefix: default_subnet_prefix(),
            enforce_shared_subnet: false,
            flag_reserved_channels: true,
        }
    }
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            mock: false,
            http: HttpConfig::default(),
            addressing: AddressingConfig::default(),
            drift: DriftConfig::default(),
            hosts: HashMap::new(),
        }
    }
}

impl MatrixConfig {
    /// Defaults overridden by environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Defaults, then `path`, then environment variables.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        tracing::debug!("Loading configuration from: {}", path.display());
        Self::from_figment(
            Figment::from(Serialized::defaults(MatrixConfig::default()))
                .merge(Toml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(MatrixConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: MatrixConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addressing.subnet_prefix != SHARED_PREFIX_LEN {
            return Err(ConfigError::Validation(format!(
                "addressing.subnet_prefix must be {} (channels are the fourth octet), got {}",
                SHARED_PREFIX_LEN, self.addressing.subnet_prefix
            )));
        }

        if self.http.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "http.timeout must be greater than zero".to_string(),
            ));
        }

        if self.drift.workers == 0 {
            return Err(ConfigError::Validation(
                "drift.workers must be at least 1".to_string(),
            ));
        }

        if self.drift.queue_depth == 0 {
            return Err(ConfigError::Validation(
                "drift.queue_depth must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Addressing scheme described by this configuration.
    pub fn scheme(&self) -> AddressingScheme {
        AddressingScheme::new(
            self.addressing.enforce_shared_subnet,
            self.addressing.flag_reserved_channels,
        )
    }
}
