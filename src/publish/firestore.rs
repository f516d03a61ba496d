//! Firestore REST adapter
//!
//! Documents are PATCHed through the Firestore v1 REST API with the API key
//! as a query parameter. The body is Firestore's typed-value encoding; an
//! update mask listing the snapshot's fields gives merge semantics, so
//! fields owned by other writers (e.g. the dashboard's own bookkeeping)
//! survive each upsert.

use async_trait::async_trait;
use serde_json::{Value as Json, json};
use tracing::debug;

use super::store::StoreAdapter;
use crate::error::{BridgeError, Result};
use crate::types::{Snapshot, Value};

pub struct FirestoreAdapter {
    client: reqwest::Client,
    project_id: String,
    api_key: String,
}

impl FirestoreAdapter {
    pub fn new(project_id: String, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|err| {
            BridgeError::store_transport("failed to build HTTP client", Box::new(err))
        })?;
        Ok(Self { client, project_id, api_key })
    }

    fn document_url(&self, collection: &str, document: &str) -> String {
        format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents/{}/{}",
            self.project_id, collection, document
        )
    }
}

#[async_trait]
impl StoreAdapter for FirestoreAdapter {
    fn name(&self) -> &'static str {
        "firestore"
    }

    fn serialize(&self, snapshot: &Snapshot) -> Json {
        let fields: serde_json::Map<String, Json> =
            snapshot.iter().map(|(name, value)| (name.to_string(), typed_value(value))).collect();
        json!({ "fields": fields })
    }

    async fn send(&self, collection: &str, document: &str, body: Json) -> Result<()> {
        let url = self.document_url(collection, document);

        // One updateMask entry per field keeps the PATCH a merge.
        let mut query: Vec<(&str, String)> = vec![("key", self.api_key.clone())];
        if let Some(fields) = body.get("fields").and_then(Json::as_object) {
            for name in fields.keys() {
                query.push(("updateMask.fieldPaths", name.clone()));
            }
        }

        let response = self
            .client
            .patch(&url)
            .query(&query)
            .json(&body)
            .send()
            .await
            .map_err(BridgeError::from)?;

        let status = response.status();
        if status.is_success() {
            debug!("Firestore upsert ok: {}/{}", collection, document);
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(BridgeError::store_status(status.as_u16(), detail))
        }
    }
}

/// Encode one value in Firestore's typed-value representation.
fn typed_value(value: &Value) -> Json {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        // int64 travels as a decimal string in the REST encoding.
        Value::Int(i) => json!({ "integerValue": i.to_string() }),
        Value::Float(f) => json!({ "doubleValue": f }),
        Value::Str(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(typed_value).collect::<Vec<_>>() }
        }),
        Value::Map(entries) => json!({
            "mapValue": {
                "fields": entries
                    .iter()
                    .map(|(k, v)| (k.clone(), typed_value(v)))
                    .collect::<serde_json::Map<String, Json>>()
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_typed_values() {
        assert_eq!(typed_value(&Value::Bool(true)), json!({"booleanValue": true}));
        assert_eq!(typed_value(&Value::Int(42)), json!({"integerValue": "42"}));
        assert_eq!(typed_value(&Value::Float(3.5)), json!({"doubleValue": 3.5}));
        assert_eq!(typed_value(&Value::Str("P1".into())), json!({"stringValue": "P1"}));
        assert_eq!(typed_value(&Value::Null), json!({"nullValue": null}));
    }

    #[test]
    fn container_typed_values_nest() {
        let mut entry = std::collections::BTreeMap::new();
        entry.insert("name".to_string(), Value::from("jean"));
        let value = Value::Array(vec![Value::Map(entry)]);

        assert_eq!(
            typed_value(&value),
            json!({"arrayValue": {"values": [
                {"mapValue": {"fields": {"name": {"stringValue": "jean"}}}}
            ]}})
        );
    }

    #[test]
    fn serialize_wraps_fields() {
        let adapter = FirestoreAdapter::new("proj".into(), "key".into()).unwrap();
        let mut snapshot = Snapshot::new();
        snapshot.set("currentLap", 14);
        snapshot.set("isRaceRunning", true);

        let body = adapter.serialize(&snapshot);
        assert_eq!(body["fields"]["currentLap"], json!({"integerValue": "14"}));
        assert_eq!(body["fields"]["isRaceRunning"], json!({"booleanValue": true}));
    }

    #[test]
    fn document_url_shape() {
        let adapter = FirestoreAdapter::new("le-mans-strat".into(), "key".into()).unwrap();
        assert_eq!(
            adapter.document_url("strategies", "hypercar-50"),
            "https://firestore.googleapis.com/v1/projects/le-mans-strat/databases/(default)/documents/strategies/hypercar-50"
        );
    }
}
