use super::{DocumentCollection, DocumentFilter};
use crate::error::ArchiveError;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-process collection. Contents are lost on restart.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    documents: RwLock<Vec<Value>>,
    available: AtomicBool,
}

impl MemoryCollection {
    /// Create an empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated outages; while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    fn ensure_available(&self) -> Result<(), ArchiveError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ArchiveError::StorageUnavailable(format!(
                "collection {} is unavailable",
                self.name
            )))
        }
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, document: Value) -> Result<(), ArchiveError> {
        self.ensure_available()?;
        self.documents.write().push(document);
        Ok(())
    }

    async fn find(&self, filter: &DocumentFilter) -> Result<Vec<Value>, ArchiveError> {
        self.ensure_available()?;
        Ok(self
            .documents
            .read()
            .iter()
            .filter(|document| filter.matches(document))
            .cloned()
            .collect())
    }

    async fn upsert_one(
        &self,
        filter: &DocumentFilter,
        document: Value,
    ) -> Result<(), ArchiveError> {
        self.ensure_available()?;
        let mut documents = self.documents.write();
        match documents.iter_mut().find(|existing| filter.matches(existing)) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryCollection;
    use crate::document::{DocumentCollection, DocumentFilter};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_replaces_first_match() {
        let collection = MemoryCollection::new("prompts");
        let filter = DocumentFilter::new().equals("chat_id", 1);
        collection
            .upsert_one(&filter, json!({ "chat_id": 1, "prompt": "a" }))
            .await
            .expect("insert");
        collection
            .upsert_one(&filter, json!({ "chat_id": 1, "prompt": "b" }))
            .await
            .expect("replace");
        assert_eq!(collection.len(), 1);
        let found = collection.find_one(&filter).await.expect("find");
        assert_eq!(found, Some(json!({ "chat_id": 1, "prompt": "b" })));
    }
}
