//! Router configuration.
//!
//! Loaded from a TOML file, optionally completed from the command line.
//!
//! ```toml
//! name = "eu-router-1"
//! listen = "0.0.0.0:1700"
//!
//! [timeouts]
//! dispatch_ms = 2000
//!
//! [[brokers]]
//! name = "broker-0"
//! address = "10.0.0.10:1800"
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::router::Timeouts;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Router name (for identification).
    #[serde(default = "default_router_name")]
    pub name: String,

    /// Gateway-facing UDP address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// CSV file receiving every traffic meter mark.
    #[serde(default)]
    pub meter_log: Option<PathBuf>,

    /// Traffic report interval (seconds, 0 to disable).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// JSON snapshot of the address index to load at startup.
    #[serde(default)]
    pub address_index: Option<PathBuf>,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub duty_cycle: DutyCycleConfig,

    /// Broker roster. A broker's index in the address index is its position here.
    #[serde(default)]
    pub brokers: Vec<BrokerConfig>,
}

fn default_router_name() -> String {
    "lora-router".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 1700))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stats_interval() -> u64 {
    60
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name: default_router_name(),
            listen: default_listen(),
            log_level: default_log_level(),
            meter_log: None,
            stats_interval_secs: default_stats_interval(),
            address_index: None,
            timeouts: TimeoutConfig::default(),
            duty_cycle: DutyCycleConfig::default(),
            brokers: Vec::new(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Example configuration written by `gen-config`.
    pub fn example() -> Self {
        Self {
            brokers: vec![
                BrokerConfig::new("broker-0", SocketAddr::from(([127, 0, 0, 1], 1800))),
                BrokerConfig::new("broker-1", SocketAddr::from(([127, 0, 0, 1], 1801))),
            ],
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.brokers.is_empty() {
            return Err(ConfigError::Invalid("No brokers configured".into()));
        }

        let mut names = HashSet::new();
        for (i, broker) in self.brokers.iter().enumerate() {
            if broker.name.is_empty() {
                return Err(ConfigError::Invalid(format!("Broker {} has an empty name", i)));
            }
            if !names.insert(broker.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate broker name {:?}",
                    broker.name
                )));
            }
        }

        let t = &self.timeouts;
        if t.lookup_ms == 0 || t.duty_ms == 0 || t.dispatch_ms == 0 || t.request_ms == 0 {
            return Err(ConfigError::Invalid("Timeouts must be non-zero".into()));
        }
        if t.request_ms < t.stages_ms() {
            return Err(ConfigError::Invalid(format!(
                "request_ms ({}) must cover the stage deadlines ({} ms)",
                t.request_ms,
                t.stages_ms()
            )));
        }
        if self.duty_cycle.cycle_length_secs == 0 {
            return Err(ConfigError::Invalid("Duty-cycle length must be non-zero".into()));
        }

        Ok(())
    }

    pub fn add_broker(&mut self, broker: BrokerConfig) {
        self.brokers.push(broker);
    }
}

/// Collaborator deadlines, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Address index and gateway status lookups.
    #[serde(default = "default_lookup_ms")]
    pub lookup_ms: u64,

    /// Duty-cycle snapshot and update.
    #[serde(default = "default_duty_ms")]
    pub duty_ms: u64,

    /// Aggregate wait for broker answers.
    #[serde(default = "default_dispatch_ms")]
    pub dispatch_ms: u64,

    /// Whole request, as seen by the gateway.
    #[serde(default = "default_request_ms")]
    pub request_ms: u64,
}

fn default_lookup_ms() -> u64 {
    500
}

fn default_duty_ms() -> u64 {
    500
}

fn default_dispatch_ms() -> u64 {
    2000
}

fn default_request_ms() -> u64 {
    4000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            lookup_ms: default_lookup_ms(),
            duty_ms: default_duty_ms(),
            dispatch_ms: default_dispatch_ms(),
            request_ms: default_request_ms(),
        }
    }
}

impl TimeoutConfig {
    /// Longest path through one uplink: address and location lookups, duty
    /// snapshot, dispatch (fallback included), duty update.
    pub fn stages_ms(&self) -> u64 {
        2 * self.lookup_ms + 2 * self.duty_ms + self.dispatch_ms
    }

    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

impl From<&TimeoutConfig> for Timeouts {
    fn from(t: &TimeoutConfig) -> Self {
        Timeouts {
            lookup: Duration::from_millis(t.lookup_ms),
            duty: Duration::from_millis(t.duty_ms),
            dispatch: Duration::from_millis(t.dispatch_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DutyCycleConfig {
    /// Accounting window (seconds).
    #[serde(default = "default_cycle_length")]
    pub cycle_length_secs: u64,
}

fn default_cycle_length() -> u64 {
    3600
}

impl Default for DutyCycleConfig {
    fn default() -> Self {
        Self {
            cycle_length_secs: default_cycle_length(),
        }
    }
}

impl DutyCycleConfig {
    pub fn cycle_length(&self) -> Duration {
        Duration::from_secs(self.cycle_length_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub name: String,
    pub address: SocketAddr,
}

impl BrokerConfig {
    pub fn new(name: impl Into<String>, address: SocketAddr) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }

    /// Parses `name=host:port`.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let (name, address) = spec
            .split_once('=')
            .ok_or_else(|| {
                ConfigError::Invalid(format!("Invalid broker {:?}, expected name=addr", spec))
            })?;
        let address = address
            .parse()
            .map_err(|e| {
                ConfigError::Invalid(format!("Invalid broker address {:?}: {}", address, e))
            })?;
        Ok(Self::new(name, address))
    }
}
