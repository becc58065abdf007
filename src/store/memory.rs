//! Process-local log store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{RwLock, RwLockReadGuard};
use uuid::Uuid;

use super::{LogStore, RecordId, StoreError};
use crate::ingest::payload::LogRecord;

/// A record as persisted: id, server timestamp, flattened fields.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct MemoryLogStore {
    records: RwLock<Vec<StoredRecord>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of everything stored so far, in insertion order.
    pub fn records(&self) -> Vec<StoredRecord> {
        self.read().clone()
    }

    // Poisoning is ignored: a push either happened or it did not.
    fn read(&self) -> RwLockReadGuard<'_, Vec<StoredRecord>> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, record: &LogRecord) -> Result<RecordId, StoreError> {
        let stored = StoredRecord {
            id: RecordId(Uuid::new_v4().to_string()),
            timestamp: Utc::now(),
            fields: record.document_fields(),
        };
        let id = stored.id.clone();

        let mut records = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        records.push(stored);
        Ok(id)
    }
}
