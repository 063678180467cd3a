//! Agent configuration, sourced from the environment.

use std::str::FromStr;
use std::time::Duration;

use bigdecimal::BigDecimal;
use serde::Deserialize;

use pactum_chain::{BackoffConfig, GatewaySourceConfig};
use pactum_core::EngineConfig;

use crate::server::ServerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Chain gateway base URL, e.g. `https://gateway.pactum.example`
    pub gateway_url: String,

    /// Address of the observed lease contract
    pub contract_address: String,

    /// HTTP listen host (env: `API_HOST`).
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// HTTP listen port (env: `API_PORT`).
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Number of warm sandboxes kept ready (env: `POOL_CAPACITY`).
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,

    /// Seconds an execution task waits for a sandbox (env: `ACQUIRE_TIMEOUT_SECS`).
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Admission cap on script size in bytes (env: `MAX_SCRIPT_BYTES`).
    #[serde(default = "default_max_script_bytes")]
    pub max_script_bytes: usize,

    /// Gateway poll interval in seconds (env: `POLL_INTERVAL_SECS`).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Initial resubscribe backoff in seconds (env: `BACKOFF_INITIAL_SECS`).
    #[serde(default = "default_backoff_initial_secs")]
    pub backoff_initial_secs: u64,

    /// Resubscribe backoff cap in seconds (env: `BACKOFF_MAX_SECS`).
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// Resubscribe backoff multiplier (env: `BACKOFF_FACTOR`).
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Reconnection attempts before the ingester turns fatal; unset retries
    /// forever (env: `MAX_RECONNECT_ATTEMPTS`).
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,

    /// Minimum acceptable `maxPrice` for proposals (env: `MIN_PRICE`).
    #[serde(default = "default_min_price")]
    pub min_price: String,

    /// Seconds running jobs get to finish during shutdown (env: `GRACE_PERIOD_SECS`).
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8402
}

fn default_pool_capacity() -> usize {
    3
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_max_script_bytes() -> usize {
    64 * 1024
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_backoff_initial_secs() -> u64 {
    1
}

fn default_backoff_max_secs() -> u64 {
    60
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_min_price() -> String {
    "0.000001".to_string()
}

fn default_grace_period_secs() -> u64 {
    10
}

impl AgentConfig {
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;
        cfg.try_deserialize()
    }

    /// Convenience constructor from environment variables.
    pub fn from_env() -> std::result::Result<Self, config::ConfigError> {
        Self::load()
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            host: self.api_host.clone(),
            port: self.api_port,
            enable_cors: true,
        }
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            max_script_bytes: self.max_script_bytes,
        }
    }

    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial: Duration::from_secs(self.backoff_initial_secs),
            factor: self.backoff_factor,
            max: Duration::from_secs(self.backoff_max_secs),
            jitter: 0.1,
            max_attempts: self.max_reconnect_attempts,
        }
    }

    pub fn gateway_source(&self) -> GatewaySourceConfig {
        GatewaySourceConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            ..GatewaySourceConfig::default()
        }
    }

    pub fn min_price_decimal(&self) -> std::result::Result<BigDecimal, config::ConfigError> {
        BigDecimal::from_str(&self.min_price).map_err(|e| {
            config::ConfigError::Message(format!("MIN_PRICE `{}` is invalid: {}", self.min_price, e))
        })
    }
}
