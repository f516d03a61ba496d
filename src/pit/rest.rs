//! Short-timeout fetch of the game's repair-and-refuel screen

use tracing::trace;

use super::menu::PitData;
use crate::config::RestConfig;
use crate::error::{BridgeError, Result};

/// Client for the game-side pit-menu REST endpoint.
///
/// The timeout comes from [`RestConfig`] and is deliberately short: when
/// the webserver is slow or absent the sampling loop treats the cycle as
/// having no pit data instead of stalling.
pub struct PitRestClient {
    client: reqwest::Client,
    url: String,
}

impl PitRestClient {
    pub fn new(config: &RestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| BridgeError::Fetch {
                reason: "failed to build HTTP client".to_string(),
                source: Some(Box::new(err)),
            })?;
        Ok(Self { client, url: endpoint_url(config) })
    }

    /// Fetch and extract the current pit data.
    ///
    /// Any failure (timeout, refused connection, non-200, bad JSON) is an
    /// error the caller downgrades to "no pit data this cycle".
    pub async fn fetch(&self) -> Result<PitData> {
        let response = self.client.get(&self.url).send().await.map_err(|err| {
            BridgeError::Fetch { reason: err.to_string(), source: Some(Box::new(err)) }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::fetch_failed(format!("endpoint returned {status}")));
        }

        let payload: serde_json::Value = response.json().await.map_err(|err| {
            BridgeError::Fetch { reason: err.to_string(), source: Some(Box::new(err)) }
        })?;

        trace!("Fetched pit data from {}", self.url);
        Ok(PitData::from_json(&payload))
    }
}

fn endpoint_url(config: &RestConfig) -> String {
    format!("http://{}:{}/rest/garage/UIScreen/RepairAndRefuel", config.host, config.port)
}
