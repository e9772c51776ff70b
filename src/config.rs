//! Monitor configuration.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! config file, `VITALWATCH_*` environment variables (nested keys separated
//! by `__`, e.g. `VITALWATCH_RECONNECT__MAX_RETRIES`), and finally command
//! line flags applied by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::connection::{Backoff, StreamConnection};
use crate::monitor::{alerts, waveform, MonitorOptions};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "VITALWATCH";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Service address as `host:port`.
    pub endpoint: String,
    pub handshake_timeout_ms: u64,
    pub waveform_capacity: usize,
    pub alert_retention: usize,
    /// Outbound command queue depth per connection.
    pub outbound_queue: usize,
    /// `tracing` filter directive, overridden by `RUST_LOG`.
    pub log_filter: String,
    pub roster_path: Option<PathBuf>,
    pub alerts_path: Option<PathBuf>,
    pub reconnect: ReconnectConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:5001".to_string(),
            handshake_timeout_ms: 5000,
            waveform_capacity: waveform::DEFAULT_CAPACITY,
            alert_retention: alerts::DEFAULT_RETENTION,
            outbound_queue: StreamConnection::DEFAULT_OUTBOUND_CAPACITY,
            log_filter: "vitalwatch=info".to_string(),
            roster_path: None,
            alerts_path: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Reconnect policy settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Consecutive failures before giving up. 0 retries forever.
    pub max_retries: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            max_retries: 10,
        }
    }
}

impl ReconnectConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            initial: Duration::from_millis(self.initial_delay_ms),
            max: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            max_retries: (self.max_retries > 0).then_some(self.max_retries),
        }
    }
}

impl MonitorConfig {
    /// Load from an optional file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            waveform_capacity: self.waveform_capacity,
            alert_retention: self.alert_retention,
        }
    }
}
