//! Per-conversation system prompts.

use crate::clock::{Clock, SystemClock};
use crate::document::{DocumentCollection, DocumentFilter};
use crate::error::ArchiveError;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Collection holding prompt records.
///
/// Spelled as in existing deployments.
pub const PROMPTS_COLLECTION: &str = "promts";

/// Prompt used when a conversation has none stored.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Stored system prompt of one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    /// Conversation id.
    pub chat_id: i64,
    /// Prompt text.
    #[serde(alias = "promt")]
    pub prompt: String,
    /// Unix seconds of first save.
    #[serde(default)]
    pub created_at: i64,
    /// Unix seconds of last save.
    #[serde(default)]
    pub updated_at: i64,
}

/// Keyed store of one prompt per conversation.
pub struct PromptStore {
    collection: Arc<dyn DocumentCollection>,
    clock: Arc<dyn Clock>,
}

impl PromptStore {
    /// Create a store stamping with the wall clock.
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        Self::with_clock(collection, Arc::new(SystemClock))
    }

    /// Create a store with an explicit clock.
    pub fn with_clock(collection: Arc<dyn DocumentCollection>, clock: Arc<dyn Clock>) -> Self {
        Self { collection, clock }
    }

    /// Insert or replace the prompt; `created_at` survives replacement.
    pub async fn save_prompt(
        &self,
        chat_id: i64,
        prompt: impl Into<String>,
    ) -> Result<PromptRecord, ArchiveError> {
        let now = self.clock.now().timestamp();
        let created_at = match self.get_prompt(chat_id).await {
            Ok(existing) => existing.created_at,
            Err(ArchiveError::NotFound(_)) => now,
            Err(err) => return Err(err),
        };
        let record = PromptRecord {
            chat_id,
            prompt: prompt.into(),
            created_at,
            updated_at: now,
        };
        let document =
            serde_json::to_value(&record).map_err(|err| ArchiveError::Encode(err.to_string()))?;
        self.collection
            .upsert_one(&chat_filter(chat_id), document)
            .await?;
        debug!("saved system prompt (chat_id={})", chat_id);
        Ok(record)
    }

    /// Stored prompt for a conversation.
    pub async fn get_prompt(&self, chat_id: i64) -> Result<PromptRecord, ArchiveError> {
        let Some(document) = self.collection.find_one(&chat_filter(chat_id)).await? else {
            return Err(ArchiveError::NotFound(format!("prompt for chat {chat_id}")));
        };
        decode_prompt(document)
    }

    /// Prompt to use for a conversation, falling back to the default.
    pub async fn system_prompt(&self, chat_id: i64) -> Result<String, ArchiveError> {
        match self.get_prompt(chat_id).await {
            Ok(record) if !record.prompt.trim().is_empty() => Ok(record.prompt),
            Ok(_) | Err(ArchiveError::NotFound(_)) => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
            Err(err) => Err(err),
        }
    }
}

fn chat_filter(chat_id: i64) -> DocumentFilter {
    DocumentFilter::new().equals("chat_id", chat_id)
}

fn decode_prompt(document: Value) -> Result<PromptRecord, ArchiveError> {
    serde_json::from_value(document).map_err(|err| ArchiveError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_SYSTEM_PROMPT, PROMPTS_COLLECTION, PromptStore};
    use crate::clock::FixedClock;
    use crate::document::{DocumentCollection, MemoryCollection};
    use crate::error::ArchiveError;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn second_save_keeps_created_at() {
        let clock = Arc::new(FixedClock::at_timestamp(1_000));
        let collection = Arc::new(MemoryCollection::new("prompts"));
        let store = PromptStore::with_clock(collection.clone(), clock.clone());

        store.save_prompt(9, "be brief").await.expect("save");
        clock.advance(Duration::seconds(60));
        let updated = store.save_prompt(9, "be kind").await.expect("save");

        assert_eq!(collection.len(), 1);
        assert_eq!(updated.created_at, 1_000);
        assert_eq!(updated.updated_at, 1_060);
        assert_eq!(store.system_prompt(9).await.expect("prompt"), "be kind");
    }

    #[tokio::test]
    async fn missing_or_blank_prompt_uses_default() {
        let store = PromptStore::new(Arc::new(MemoryCollection::new("prompts")));
        let err = store.get_prompt(1).await.expect_err("missing");
        assert!(matches!(err, ArchiveError::NotFound(_)));
        assert_eq!(
            store.system_prompt(1).await.expect("prompt"),
            DEFAULT_SYSTEM_PROMPT
        );
        store.save_prompt(1, "  ").await.expect("save");
        assert_eq!(
            store.system_prompt(1).await.expect("prompt"),
            DEFAULT_SYSTEM_PROMPT
        );
    }

    #[tokio::test]
    async fn legacy_prompt_documents_are_read() {
        let collection = Arc::new(MemoryCollection::new(PROMPTS_COLLECTION));
        collection
            .insert_one(json!({
                "_id": { "$oid": "65f1c0ffee" },
                "chat_id": -1001,
                "promt": "Talk like a sailor.",
                "created_at": 1_700_000_000,
                "updated_at": 1_700_000_000
            }))
            .await
            .expect("insert");
        let store = PromptStore::new(collection.clone());
        assert_eq!(
            store.system_prompt(-1001).await.expect("prompt"),
            "Talk like a sailor."
        );

        let updated = store.save_prompt(-1001, "Be brief.").await.expect("save");
        assert_eq!(updated.created_at, 1_700_000_000);
        assert_eq!(collection.len(), 1);
    }

    #[tokio::test]
    async fn outages_are_not_masked_by_the_default() {
        let collection = Arc::new(MemoryCollection::new("prompts"));
        collection.set_available(false);
        let store = PromptStore::new(collection);
        let err = store.system_prompt(1).await.expect_err("unavailable");
        assert!(err.is_retryable());
    }
}
