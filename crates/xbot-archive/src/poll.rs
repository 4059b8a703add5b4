//! Scheduled poll bookkeeping.

use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::document::{DocumentCollection, DocumentFilter};
use crate::error::ArchiveError;
use crate::model::RecordId;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Collection holding poll records.
pub const POLLS_COLLECTION: &str = "polls";

/// A poll the bot posted into a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRecord {
    /// Record identifier.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Poll schedule name, e.g. `daily`.
    #[serde(rename = "type")]
    pub poll_type: String,
    /// Posting date as `YYYY-MM-DD`.
    pub date: String,
    /// Conversation the poll was posted in.
    #[serde(alias = "chatid")]
    pub chat_id: i64,
    /// Platform message id of the poll.
    #[serde(default, alias = "messageid")]
    pub message_id: i64,
    /// Vendor poll id used by vote events.
    pub poll_id: String,
    /// Raw poll object as returned by the platform.
    #[serde(default)]
    pub poll: Value,
    /// Unix seconds.
    #[serde(default, alias = "createdat")]
    pub created_at: i64,
    /// Unix seconds.
    #[serde(default, alias = "updatedat")]
    pub updated_at: i64,
}

impl PollRecord {
    /// New unsaved record.
    pub fn new(
        poll_type: impl Into<String>,
        date: impl Into<String>,
        chat_id: i64,
        poll_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            poll_type: poll_type.into(),
            date: date.into(),
            chat_id,
            message_id: 0,
            poll_id: poll_id.into(),
            poll: Value::Null,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Date key used for polls posted at `now`.
pub fn poll_date(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Keyed store for [`PollRecord`]s.
pub struct PollStore {
    collection: Arc<dyn DocumentCollection>,
    clock: Arc<dyn Clock>,
}

impl PollStore {
    /// Create a store stamping with the wall clock.
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        Self::with_clock(collection, Arc::new(SystemClock))
    }

    /// Create a store with an explicit clock.
    pub fn with_clock(collection: Arc<dyn DocumentCollection>, clock: Arc<dyn Clock>) -> Self {
        Self { collection, clock }
    }

    /// Today's date key according to the store clock.
    pub fn today(&self) -> String {
        poll_date(self.clock.now())
    }

    /// Insert a poll, stamping id and timestamps.
    pub async fn save(&self, mut poll: PollRecord) -> Result<PollRecord, ArchiveError> {
        let now = self.clock.now().timestamp();
        poll.created_at = now;
        poll.updated_at = now;
        poll.id.get_or_insert_with(RecordId::generate);
        let document =
            serde_json::to_value(&poll).map_err(|err| ArchiveError::Encode(err.to_string()))?;
        self.collection.insert_one(document).await?;
        debug!(
            "stored poll (type={}, date={}, chat_id={})",
            poll.poll_type, poll.date, poll.chat_id
        );
        Ok(poll)
    }

    /// Poll of a given schedule posted on `date`, if any.
    pub async fn find_by_type_and_date(
        &self,
        poll_type: &str,
        date: &str,
    ) -> Result<Option<PollRecord>, ArchiveError> {
        let filter = DocumentFilter::new()
            .equals("type", poll_type)
            .equals("date", date);
        self.collection
            .find_one(&filter)
            .await?
            .map(decode_poll)
            .transpose()
    }

    /// Poll identified by its vendor poll id.
    pub async fn get_by_poll_id(&self, poll_id: &str) -> Result<PollRecord, ArchiveError> {
        let filter = DocumentFilter::new().equals("poll_id", poll_id);
        match self.collection.find_one(&filter).await? {
            Some(document) => decode_poll(document),
            None => Err(ArchiveError::NotFound(format!("poll {poll_id}"))),
        }
    }
}

fn decode_poll(mut document: Value) -> Result<PollRecord, ArchiveError> {
    codec::flatten_document_id(&mut document)?;
    serde_json::from_value(document).map_err(|err| ArchiveError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{PollRecord, PollStore, poll_date};
    use crate::clock::FixedClock;
    use crate::document::MemoryCollection;
    use crate::error::ArchiveError;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> PollStore {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).single().expect("ts");
        PollStore::with_clock(
            Arc::new(MemoryCollection::new("polls")),
            Arc::new(FixedClock::new(now)),
        )
    }

    #[test]
    fn date_key_uses_iso_day() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 23, 0, 0).single().expect("ts");
        assert_eq!(poll_date(now), "2024-01-05");
    }

    #[tokio::test]
    async fn saved_polls_are_found_by_type_date_and_poll_id() {
        let store = store();
        let mut poll = PollRecord::new("daily", store.today(), -100, "5001");
        poll.poll = json!({ "question": "Lunch?" });
        let saved = store.save(poll).await.expect("save");
        assert!(saved.id.is_some());
        assert_eq!(saved.created_at, saved.updated_at);

        let found = store
            .find_by_type_and_date("daily", "2024-02-29")
            .await
            .expect("find");
        assert_eq!(found, Some(saved.clone()));
        assert_eq!(
            store.find_by_type_and_date("weekly", "2024-02-29").await.expect("find"),
            None
        );
        assert_eq!(store.get_by_poll_id("5001").await.expect("get"), saved);
    }

    #[tokio::test]
    async fn missing_poll_id_is_not_found() {
        let err = store().get_by_poll_id("nope").await.expect_err("missing");
        assert!(matches!(err, ArchiveError::NotFound(_)));
    }
}
