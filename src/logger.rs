//! Cloud document store sink for the MQTT logger.
//!
//! Readings arriving on the data topic are persisted as
//! `{value, type, created_at}` documents in a Firestore collection via
//! its REST API. Firestore wants every field wrapped in a typed value
//! object, so the JSON payloads are converted field by field.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

pub struct FirestoreSink {
    client: reqwest::Client,
    project: String,
    api_key: Option<String>,
    collection: String,
}

impl FirestoreSink {
    pub fn new(
        project: impl Into<String>,
        api_key: Option<String>,
        collection: impl Into<String>,
    ) -> Result<FirestoreSink, Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(FirestoreSink {
            client,
            project: project.into(),
            api_key,
            collection: collection.into(),
        })
    }

    /// Persist one reading payload (`{"type": ..., "value": ...}`).
    #[tracing::instrument(err, skip(self, payload))]
    pub async fn save_reading(&self, payload: &Value) -> Result<(), Error> {
        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("people_count");

        let document = json!({
            "fields": {
                "value": to_firestore_value(&value),
                "type": {"stringValue": kind},
                "created_at": {
                    "timestampValue":
                        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
                },
            }
        });

        let mut request = self.client.post(self.documents_url()).json(&document);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Firestore { status, body });
        }

        tracing::debug!(kind, "reading persisted");
        Ok(())
    }

    fn documents_url(&self) -> String {
        format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents/{}",
            self.project, self.collection
        )
    }
}

impl std::fmt::Debug for FirestoreSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreSink")
            .field("project", &self.project)
            .field("collection", &self.collection)
            .finish()
    }
}

/// Whether a topic's payloads belong in the document store.
pub fn routes_to_store(topic: &str) -> bool {
    topic.ends_with("/sensor/data")
}

/// Wrap a JSON value in Firestore's typed-field representation.
pub fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({"nullValue": null}),
        Value::Bool(b) => json!({"booleanValue": b}),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // integers travel as strings in the REST API
                json!({"integerValue": i.to_string()})
            } else {
                json!({"doubleValue": n.as_f64()})
            }
        }
        Value::String(s) => json!({"stringValue": s}),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(to_firestore_value).collect();
            json!({"arrayValue": {"values": values}})
        }
        Value::Object(map) => {
            let fields: serde_json::Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), to_firestore_value(v)))
                .collect();
            json!({"mapValue": {"fields": fields}})
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("firestore returned {status}: {body}")]
    Firestore {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_map_to_typed_fields() {
        assert_eq!(
            to_firestore_value(&json!(24.5)),
            json!({"doubleValue": 24.5})
        );
        assert_eq!(
            to_firestore_value(&json!(42)),
            json!({"integerValue": "42"})
        );
        assert_eq!(
            to_firestore_value(&json!(true)),
            json!({"booleanValue": true})
        );
        assert_eq!(
            to_firestore_value(&json!("sound")),
            json!({"stringValue": "sound"})
        );
        assert_eq!(to_firestore_value(&Value::Null), json!({"nullValue": null}));
    }

    #[test]
    fn axes_object_maps_to_map_value() {
        let mapped = to_firestore_value(&json!({"x": 0.1, "y": -0.2, "z": 9.8}));
        assert_eq!(mapped["mapValue"]["fields"]["z"], json!({"doubleValue": 9.8}));
    }

    #[test]
    fn array_maps_elementwise() {
        let mapped = to_firestore_value(&json!([1, "a"]));
        assert_eq!(
            mapped["arrayValue"]["values"][0],
            json!({"integerValue": "1"})
        );
        assert_eq!(
            mapped["arrayValue"]["values"][1],
            json!({"stringValue": "a"})
        );
    }

    #[test]
    fn only_data_topics_route_to_store() {
        assert!(routes_to_store("home/edge/sensor/data"));
        assert!(!routes_to_store("home/edge/sensor/image"));
        assert!(!routes_to_store("home/edge/motor/status"));
    }
}
