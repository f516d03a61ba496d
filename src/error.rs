//! Error types for the telemetry bridge.
//!
//! All failure handling in the bridge is local and isolating: no error from
//! the sampling loop or the publish worker is allowed to terminate either
//! task. The [`BridgeError::is_retryable`] classifier is what the publish
//! worker consults to decide between retrying a snapshot and dropping it.
//!
//! ## Error Categories
//!
//! - **Source Errors**: the simulator is not running or exposes no player
//!   vehicle this cycle
//! - **Fetch Errors**: the game-side REST endpoint timed out or refused the
//!   pit-menu request
//! - **Parse Errors**: malformed pit-menu payloads or config files
//! - **Store Errors**: the document store rejected or failed an upsert
//! - **Config Errors**: invalid bridge configuration
//!
//! ```rust
//! use pitlink::BridgeError;
//!
//! let error = BridgeError::store_status(503, "service unavailable");
//! assert!(error.is_retryable());
//! let error = BridgeError::store_status(401, "bad credentials");
//! assert!(!error.is_retryable());
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Main error type for bridge operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("Data source unavailable: {reason}")]
    Source { reason: String },

    #[error("Pit data fetch failed: {reason}")]
    Fetch {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Store request failed{}: {reason}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Store {
        /// HTTP status from the document store, if the request got that far.
        status: Option<u16>,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Publish pipeline closed")]
    PipelineClosed,
}

impl BridgeError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Store errors are transient when the request never produced a status
    /// (transport failure) or produced a server-side status (5xx). Client
    /// errors (4xx) are permanent: retrying a bad request or bad credentials
    /// only burns the retry budget of the snapshot behind it.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::Source { .. } => true,
            BridgeError::Fetch { .. } => true,
            BridgeError::Timeout { .. } => true,
            BridgeError::Store { status, .. } => match status {
                Some(code) => *code >= 500,
                None => true,
            },
            BridgeError::Parse { .. } => false,
            BridgeError::Config { .. } => false,
            BridgeError::PipelineClosed => false,
        }
    }

    /// Helper constructor for source-unavailable errors.
    pub fn source_unavailable(reason: impl Into<String>) -> Self {
        BridgeError::Source { reason: reason.into() }
    }

    /// Helper constructor for pit-data fetch failures.
    pub fn fetch_failed(reason: impl Into<String>) -> Self {
        BridgeError::Fetch { reason: reason.into(), source: None }
    }

    /// Helper constructor for parse errors with context.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        BridgeError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for store errors carrying an HTTP status.
    pub fn store_status(status: u16, reason: impl Into<String>) -> Self {
        BridgeError::Store { status: Some(status), reason: reason.into(), source: None }
    }

    /// Helper constructor for store transport errors (no status reached).
    pub fn store_transport(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        BridgeError::Store { status: None, reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        BridgeError::Config { reason: reason.into(), source: None }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        BridgeError::Store { status, reason: err.to_string(), source: Some(Box::new(err)) }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Parse { context: "JSON".to_string(), details: err.to_string() }
    }
}

impl From<serde_yaml_ng::Error> for BridgeError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        BridgeError::Config { reason: "invalid YAML".to_string(), source: Some(Box::new(err)) }
    }
}
