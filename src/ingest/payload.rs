//! Typed ingestion payload and the record it becomes.
//!
//! # Responsibilities
//! - Parse the raw body into a `LogPayload` (both fields optional on the wire)
//! - Convert it into a `LogRecord` only when `type` and `data` are both usable
//! - Flatten `data` next to `type` for storage
//!
//! # Design Decisions
//! - Only presence and shape are checked; values inside `data` are opaque
//! - `type` and `timestamp` are owned by the server and cannot be overridden
//!   from inside `data`

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const FIELD_TYPE: &str = "type";
pub const FIELD_TIMESTAMP: &str = "timestamp";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("body is not valid JSON: {0}")]
    Malformed(String),

    #[error("body is not a JSON object")]
    NotAnObject,

    #[error("`type` is missing")]
    MissingType,

    #[error("`type` must be a non-empty string")]
    InvalidType,

    #[error("`data` is missing")]
    MissingData,

    #[error("`data` must be a JSON object")]
    DataNotObject,

    #[error("`data` has no fields besides reserved ones")]
    EmptyData,
}

/// Request body as received. Unknown top-level fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogPayload {
    #[serde(rename = "type", default)]
    pub event_type: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl LogPayload {
    pub fn parse(body: &[u8]) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| PayloadError::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(PayloadError::NotAnObject);
        }
        serde_json::from_value(value).map_err(|e| PayloadError::Malformed(e.to_string()))
    }
}

/// One validated interaction event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    event_type: String,
    data: Map<String, Value>,
}

impl LogRecord {
    pub fn new(event_type: impl Into<String>, data: Map<String, Value>) -> Result<Self, PayloadError> {
        let event_type = event_type.into();
        if event_type.trim().is_empty() {
            return Err(PayloadError::InvalidType);
        }
        if !data.keys().any(|key| !is_reserved(key)) {
            return Err(PayloadError::EmptyData);
        }
        Ok(Self { event_type, data })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Fields of the stored document, minus the server timestamp.
    pub fn document_fields(&self) -> Map<String, Value> {
        let mut fields = Map::with_capacity(self.data.len() + 1);
        fields.insert(FIELD_TYPE.to_string(), Value::String(self.event_type.clone()));
        for (key, value) in &self.data {
            if is_reserved(key) {
                tracing::warn!(field = %key, "Dropping reserved field from log data");
                continue;
            }
            fields.insert(key.clone(), value.clone());
        }
        fields
    }
}

fn is_reserved(key: &str) -> bool {
    key == FIELD_TYPE || key == FIELD_TIMESTAMP
}

impl TryFrom<LogPayload> for LogRecord {
    type Error = PayloadError;

    fn try_from(payload: LogPayload) -> Result<Self, Self::Error> {
        let event_type = match payload.event_type {
            None => return Err(PayloadError::MissingType),
            Some(Value::String(s)) => s,
            Some(_) => return Err(PayloadError::InvalidType),
        };
        let data = match payload.data {
            None => return Err(PayloadError::MissingData),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(PayloadError::DataNotObject),
        };
        LogRecord::new(event_type, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(body: &str) -> Result<LogRecord, PayloadError> {
        LogPayload::parse(body.as_bytes()).and_then(LogRecord::try_from)
    }

    #[test]
    fn test_valid_record() {
        let record = record(r#"{"type":"click","data":{"x":1,"y":2},"extra":true}"#).unwrap();
        assert_eq!(record.event_type(), "click");
        assert_eq!(record.data()["x"], json!(1));
    }

    #[test]
    fn test_rejections() {
        let cases = [
            ("not json", "malformed"),
            (r#"["click", {"x": 1}]"#, "array"),
            (r#"{"data":{"x":1}}"#, "no type"),
            (r#"{"type":null,"data":{"x":1}}"#, "null type"),
            (r#"{"type":"","data":{"x":1}}"#, "empty type"),
            (r#"{"type":"  ","data":{"x":1}}"#, "blank type"),
            (r#"{"type":7,"data":{"x":1}}"#, "numeric type"),
            (r#"{"type":"click"}"#, "no data"),
            (r#"{"type":"click","data":null}"#, "null data"),
            (r#"{"type":"click","data":{}}"#, "empty data"),
            (r#"{"type":"click","data":{"timestamp":123}}"#, "only reserved data"),
            (r#"{"type":"click","data":{"type":"x","timestamp":1}}"#, "only reserved data"),
            (r#"{"type":"click","data":"x=1"}"#, "string data"),
            (r#"{"type":"click","data":[1,2]}"#, "array data"),
        ];
        for (body, label) in cases {
            assert!(record(body).is_err(), "{label} should be rejected");
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(record(r#"{"data":{"x":1}}"#), Err(PayloadError::MissingType));
        assert_eq!(record(r#"{"type":"a","data":{}}"#), Err(PayloadError::EmptyData));
        assert_eq!(record(r#"{"type":"a","data":3}"#), Err(PayloadError::DataNotObject));
        assert_eq!(record("[]"), Err(PayloadError::NotAnObject));
        assert_eq!(
            record(r#"{"type":"a","data":{"timestamp":123}}"#),
            Err(PayloadError::EmptyData)
        );
    }

    #[test]
    fn test_document_fields_flatten_and_protect_reserved() {
        let record = record(
            r#"{"type":"click","data":{"x":1,"nested":{"a":[true]},"type":"spoof","timestamp":0}}"#,
        )
        .unwrap();

        let fields = record.document_fields();
        assert_eq!(
            Value::Object(fields),
            json!({"type": "click", "x": 1, "nested": {"a": [true]}})
        );
    }
}
