//! Storage backend contract.

use crate::error::ArchiveError;
use crate::model::ChatEventRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which storage engine a backend is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Document database queried by conversation id.
    Document,
    /// Object store partitioned by conversation and day.
    Object,
}

impl BackendKind {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
/// Storage engine used by [`crate::MessageArchive`].
pub trait MessageBackend: Send + Sync {
    /// Engine kind, used for logging and health reporting.
    fn kind(&self) -> BackendKind;

    /// Persist one record and return it as stored.
    ///
    /// The backend assigns `id` when missing and overwrites both timestamps
    /// with its own clock.
    async fn write(&self, record: ChatEventRecord) -> Result<ChatEventRecord, ArchiveError>;

    /// Return every retrievable record for a conversation.
    async fn read_by_conversation(
        &self,
        chat_id: i64,
    ) -> Result<Vec<ChatEventRecord>, ArchiveError>;
}
