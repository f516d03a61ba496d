//! Supabase REST adapter
//!
//! Supabase takes plain JSON, so the wire body is just the snapshot's field
//! map. Rows are addressed by the `id` column and updated with a PATCH
//! against the PostgREST filter endpoint.

use async_trait::async_trait;
use serde_json::Value as Json;
use tracing::debug;

use super::store::StoreAdapter;
use crate::error::{BridgeError, Result};
use crate::types::Snapshot;

pub struct SupabaseAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupabaseAdapter {
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|err| {
            BridgeError::store_transport("failed to build HTTP client", Box::new(err))
        })?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), api_key })
    }

    fn row_url(&self, table: &str, id: &str) -> String {
        format!("{}/rest/v1/{}?id=eq.{}", self.base_url, table, id)
    }
}

#[async_trait]
impl StoreAdapter for SupabaseAdapter {
    fn name(&self) -> &'static str {
        "supabase"
    }

    fn serialize(&self, snapshot: &Snapshot) -> Json {
        snapshot.to_json()
    }

    async fn send(&self, collection: &str, document: &str, body: Json) -> Result<()> {
        let url = self.row_url(collection, document);

        let response = self
            .client
            .patch(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(BridgeError::from)?;

        let status = response.status();
        if status.is_success() {
            debug!("Supabase upsert ok: {}/{}", collection, document);
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(BridgeError::store_status(status.as_u16(), detail))
        }
    }
}
