//! Firestore REST store.
//!
//! # Responsibilities
//! - Encode a `LogRecord` as Firestore typed values
//! - Write it with a single `documents:commit`
//! - Let Firestore stamp `timestamp` with its own clock
//!
//! # Design Decisions
//! - Document ids are generated here (UUID v4) so the write can carry an
//!   `exists: false` precondition; a retried commit never overwrites
//! - One commit per record: the document appears whole or not at all
//! - The bearer token is supplied by configuration; minting it is out of scope

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{LogStore, RecordId, StoreError};
use crate::config::StoreConfig;
use crate::ingest::payload::{LogRecord, FIELD_TIMESTAMP};

pub struct FirestoreStore {
    client: reqwest::Client,
    commit_url: String,
    collection_path: String,
    access_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let fs = &config.firestore;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.write_timeout_ms))
            .build()?;

        let database_path = format!("projects/{}/databases/{}", fs.project_id, fs.database);
        let base_url = fs.base_url.trim_end_matches('/');

        Ok(Self {
            client,
            commit_url: format!("{base_url}/{database_path}/documents:commit"),
            collection_path: format!("{database_path}/documents/{}", config.collection),
            access_token: fs.access_token.clone(),
        })
    }

    pub fn commit_url(&self) -> &str {
        &self.commit_url
    }

    /// Request body creating document `id` from `record`.
    pub fn commit_body(&self, id: &str, record: &LogRecord) -> Value {
        json!({
            "writes": [{
                "update": {
                    "name": format!("{}/{}", self.collection_path, id),
                    "fields": encode_fields(&record.document_fields()),
                },
                "updateTransforms": [{
                    "fieldPath": FIELD_TIMESTAMP,
                    "setToServerValue": "REQUEST_TIME",
                }],
                "currentDocument": { "exists": false },
            }]
        })
    }
}

#[async_trait]
impl LogStore for FirestoreStore {
    fn backend(&self) -> &'static str {
        "firestore"
    }

    async fn insert(&self, record: &LogRecord) -> Result<RecordId, StoreError> {
        let id = Uuid::new_v4().to_string();
        let mut request = self
            .client
            .post(&self.commit_url)
            .json(&self.commit_body(&id, record));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(RecordId(id))
    }
}

/// Encode a JSON object as a Firestore `fields` map.
pub fn encode_fields(map: &Map<String, Value>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

/// Encode one JSON value as a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // int64 travels as a decimal string in the REST encoding
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or(f64::NAN) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}
