//! Bridge configuration
//!
//! Everything the bridge needs is passed in explicitly at construction
//! time; there is no process-global state. Configs deserialize from YAML:
//!
//! ```yaml
//! poll_interval_ms: 100
//! rest:
//!   port: 6397
//!   timeout_ms: 100
//! store:
//!   provider: firestore
//!   project_id: le-mans-strat
//!   api_key: AIza...
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BridgeConfig {
    /// Sampling cadence in milliseconds.
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub rest: RestConfig,

    pub store: StoreConfig,

    /// Collection holding the per-team strategy documents.
    #[serde(default = "defaults::collection")]
    pub collection: String,

    /// Collection holding the public team directory.
    #[serde(default = "defaults::teams_collection")]
    pub teams_collection: String,

    /// How long shutdown waits for the publish worker to drain.
    #[serde(default = "defaults::shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl BridgeConfig {
    /// Parse from a YAML document and validate.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Reject configurations the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(BridgeError::config_error("poll_interval_ms must be non-zero"));
        }
        if self.collection.is_empty() {
            return Err(BridgeError::config_error("collection must not be empty"));
        }
        match &self.store {
            StoreConfig::Firestore { project_id, api_key } => {
                if project_id.is_empty() || api_key.is_empty() {
                    return Err(BridgeError::config_error(
                        "firestore store requires project_id and api_key",
                    ));
                }
            }
            StoreConfig::Supabase { url, api_key } => {
                if url.is_empty() || api_key.is_empty() {
                    return Err(BridgeError::config_error(
                        "supabase store requires url and api_key",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Game-side REST endpoint settings for the pit-menu fetch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    pub host: String,
    pub port: u16,
    /// Request timeout in milliseconds. Kept short so a stalled game-side
    /// endpoint can never hold up the sampling loop.
    pub timeout_ms: u64,
}

impl RestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RestConfig {
    fn default() -> Self {
        // 6397 is the game's default webserver port.
        Self { host: "localhost".to_string(), port: 6397, timeout_ms: 100 }
    }
}

/// Which document store the publisher talks to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum StoreConfig {
    Firestore { project_id: String, api_key: String },
    Supabase { url: String, api_key: String },
}

mod defaults {
    pub fn poll_interval_ms() -> u64 {
        100
    }
    pub fn collection() -> String {
        "strategies".to_string()
    }
    pub fn teams_collection() -> String {
        "teams".to_string()
    }
    pub fn shutdown_grace_ms() -> u64 {
        3000
    }
}
