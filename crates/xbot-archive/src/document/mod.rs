//! Document backend and the collection seam it stores through.

mod jsonl;
mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use jsonl::JsonlCollection;
pub use memory::MemoryCollection;
#[cfg(feature = "mongodb")]
pub use mongo::{MongoCollection, MongoConnection};

use crate::backend::{BackendKind, MessageBackend};
use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::error::ArchiveError;
use crate::model::ChatEventRecord;
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::sync::Arc;

/// Collection holding message records.
pub const MESSAGES_COLLECTION: &str = "messages";

/// Conjunction of exact-match field conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    fields: Vec<(String, Value)>,
}

impl DocumentFilter {
    /// Empty filter matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    /// Field conditions in insertion order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Whether a document satisfies every condition.
    pub fn matches(&self, document: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }
}

#[async_trait]
/// Minimal collection API the archive needs from a document database.
pub trait DocumentCollection: Send + Sync {
    /// Collection name, for logging.
    fn name(&self) -> &str;

    /// Insert one document.
    async fn insert_one(&self, document: Value) -> Result<(), ArchiveError>;

    /// Return matching documents in insertion order.
    async fn find(&self, filter: &DocumentFilter) -> Result<Vec<Value>, ArchiveError>;

    /// Return the first matching document.
    async fn find_one(&self, filter: &DocumentFilter) -> Result<Option<Value>, ArchiveError> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    /// Replace the first matching document, or insert when none match.
    async fn upsert_one(&self, filter: &DocumentFilter, document: Value)
    -> Result<(), ArchiveError>;
}

/// Message backend over a document collection.
///
/// Reads are not time-bounded and come back in insertion order.
pub struct DocumentBackend {
    collection: Arc<dyn DocumentCollection>,
    clock: Arc<dyn Clock>,
}

impl DocumentBackend {
    /// Create a backend stamping records with the wall clock.
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        Self::with_clock(collection, Arc::new(SystemClock))
    }

    /// Create a backend with an explicit clock.
    pub fn with_clock(collection: Arc<dyn DocumentCollection>, clock: Arc<dyn Clock>) -> Self {
        Self { collection, clock }
    }
}

#[async_trait]
impl MessageBackend for DocumentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    async fn write(&self, mut record: ChatEventRecord) -> Result<ChatEventRecord, ArchiveError> {
        let id = record.stamp(self.clock.now().timestamp());
        let document = codec::to_document(&record)?;
        self.collection.insert_one(document).await?;
        debug!(
            "stored message document (collection={}, id={}, chat_id={:?})",
            self.collection.name(),
            id,
            record.chat_id
        );
        Ok(record)
    }

    async fn read_by_conversation(
        &self,
        chat_id: i64,
    ) -> Result<Vec<ChatEventRecord>, ArchiveError> {
        let filter = DocumentFilter::new().equals("chat_id", chat_id);
        let documents = self.collection.find(&filter).await?;
        let records = documents
            .into_iter()
            .map(codec::from_document)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "read message documents (collection={}, chat_id={}, returned={})",
            self.collection.name(),
            chat_id,
            records.len()
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentBackend, DocumentFilter, MemoryCollection};
    use crate::backend::MessageBackend;
    use crate::clock::FixedClock;
    use crate::error::ArchiveError;
    use crate::model::{ChatEventRecord, UpdatePayload};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn message(chat_id: i64, text: &str) -> ChatEventRecord {
        ChatEventRecord::from_update(UpdatePayload::new(json!({
            "message": { "chat": { "id": chat_id }, "text": text }
        })))
    }

    #[test]
    fn filter_requires_every_field() {
        let filter = DocumentFilter::new().equals("a", 1).equals("b", "x");
        assert!(filter.matches(&json!({ "a": 1, "b": "x", "c": true })));
        assert!(!filter.matches(&json!({ "a": 1 })));
        assert!(DocumentFilter::new().matches(&json!({})));
    }

    #[tokio::test]
    async fn write_stamps_and_read_keeps_insertion_order() {
        let clock = Arc::new(FixedClock::at_timestamp(100));
        let collection = Arc::new(MemoryCollection::new("messages"));
        let backend = DocumentBackend::with_clock(collection, clock.clone());

        let first = backend.write(message(1, "a")).await.expect("write");
        clock.set(chrono::DateTime::from_timestamp(300, 0).expect("ts"));
        backend.write(message(1, "b")).await.expect("write");
        clock.set(chrono::DateTime::from_timestamp(200, 0).expect("ts"));
        backend.write(message(1, "c")).await.expect("write");
        backend.write(message(2, "other")).await.expect("write");

        assert_eq!(first.created_at, 100);
        assert_eq!(first.updated_at, 100);
        assert!(first.id.is_some());

        let records = backend.read_by_conversation(1).await.expect("read");
        let stamps: Vec<i64> = records.iter().map(|r| r.created_at).collect();
        assert_eq!(stamps, vec![100, 300, 200]);
        assert_eq!(records[0], first);
    }

    #[tokio::test]
    async fn unavailable_collection_surfaces_storage_error() {
        let collection = Arc::new(MemoryCollection::new("messages"));
        collection.set_available(false);
        let backend = DocumentBackend::new(collection);
        let err = backend.write(message(1, "a")).await.expect_err("write fails");
        assert!(matches!(err, ArchiveError::StorageUnavailable(_)));
        let err = backend.read_by_conversation(1).await.expect_err("read fails");
        assert!(err.is_retryable());
    }
}
