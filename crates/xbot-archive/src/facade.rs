//! Archive facade used by request handlers.

use crate::backend::{BackendKind, MessageBackend};
use crate::error::ArchiveError;
use crate::model::{ChatEventRecord, UpdatePayload};
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Single entry point for saving and reading archived messages.
///
/// Holds exactly one backend for its whole lifetime; the choice is made
/// once at startup. Cloning shares the backend.
#[derive(Clone)]
pub struct MessageArchive {
    backend: Arc<dyn MessageBackend>,
    operation_timeout: Option<Duration>,
}

impl MessageArchive {
    /// Wrap a selected backend.
    pub fn new(backend: Arc<dyn MessageBackend>) -> Self {
        Self {
            backend,
            operation_timeout: None,
        }
    }

    /// Bound every backend call; expiry is reported as storage unavailable.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Kind of the active backend.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Persist a record through the active backend.
    pub async fn save_message(
        &self,
        record: ChatEventRecord,
    ) -> Result<ChatEventRecord, ArchiveError> {
        let stored = self
            .bounded("save_message", self.backend.write(record))
            .await?;
        debug!(
            "archived message (backend={}, chat_id={:?})",
            self.backend.kind(),
            stored.chat_id
        );
        Ok(stored)
    }

    /// Wrap a raw inbound event into a record and persist it.
    pub async fn save_update(
        &self,
        update: UpdatePayload,
    ) -> Result<ChatEventRecord, ArchiveError> {
        self.save_message(ChatEventRecord::from_update(update)).await
    }

    /// Retrievable records for a conversation, in backend order.
    pub async fn get_messages_by_conversation(
        &self,
        chat_id: i64,
    ) -> Result<Vec<ChatEventRecord>, ArchiveError> {
        self.bounded(
            "get_messages_by_conversation",
            self.backend.read_by_conversation(chat_id),
        )
        .await
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        future: impl Future<Output = Result<T, ArchiveError>>,
    ) -> Result<T, ArchiveError> {
        let Some(timeout) = self.operation_timeout else {
            return future.await;
        };
        match tokio::time::timeout(timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "archive operation timed out (operation={}, backend={}, timeout_ms={})",
                    operation,
                    self.backend.kind(),
                    timeout.as_millis()
                );
                Err(ArchiveError::StorageUnavailable(format!(
                    "{operation} timed out after {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }
}

impl std::fmt::Debug for MessageArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageArchive")
            .field("backend", &self.backend.kind())
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::MessageArchive;
    use crate::backend::{BackendKind, MessageBackend};
    use crate::document::{DocumentBackend, MemoryCollection};
    use crate::error::ArchiveError;
    use crate::model::{ChatEventRecord, UpdatePayload};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    struct SlowBackend;

    #[async_trait]
    impl MessageBackend for SlowBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Object
        }

        async fn write(&self, record: ChatEventRecord) -> Result<ChatEventRecord, ArchiveError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(record)
        }

        async fn read_by_conversation(
            &self,
            _chat_id: i64,
        ) -> Result<Vec<ChatEventRecord>, ArchiveError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn save_update_goes_through_backend() {
        let archive = MessageArchive::new(Arc::new(DocumentBackend::new(Arc::new(
            MemoryCollection::new("messages"),
        ))));
        let stored = archive
            .save_update(UpdatePayload::new(json!({
                "message": { "chat": { "id": 11 }, "text": "hey" }
            })))
            .await
            .expect("save");
        assert_eq!(stored.chat_id, Some(11));
        assert_eq!(archive.backend_kind(), BackendKind::Document);
        let records = archive.get_messages_by_conversation(11).await.expect("read");
        assert_eq!(records, vec![stored]);
    }

    #[tokio::test]
    async fn slow_backend_times_out_as_unavailable() {
        let archive = MessageArchive::new(Arc::new(SlowBackend))
            .with_operation_timeout(Duration::from_millis(50));
        let err = archive
            .get_messages_by_conversation(1)
            .await
            .expect_err("timeout");
        assert!(matches!(err, ArchiveError::StorageUnavailable(_)));
    }
}
