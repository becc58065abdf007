//! Log record persistence.
//!
//! # Data Flow
//! ```text
//! LogRecord (validated)
//!     → LogStore::insert
//!         → memory.rs (process-local, development and tests)
//!         → firestore.rs (REST commit, server timestamp)
//!     → RecordId assigned by the store
//! ```
//!
//! # Design Decisions
//! - One insert per accepted request; no update or delete path
//! - The store sets the timestamp, never the client
//! - An insert either commits the whole document or nothing

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::payload::LogRecord;

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::{MemoryLogStore, StoredRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store rejected write with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Identifier assigned to a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only destination for log records.
#[async_trait]
pub trait LogStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn insert(&self, record: &LogRecord) -> Result<RecordId, StoreError>;
}
