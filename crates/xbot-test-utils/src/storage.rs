use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use xbot_archive::{
    ArchiveError, BackendFactory, BackendKind, ChatEventRecord, DocumentBackend,
    MESSAGES_COLLECTION, MemoryCollection, MessageBackend, ObjectBackend, ObjectBackendOptions,
};

/// Factory handing out preset backends; a missing slot fails to open.
#[derive(Default)]
pub struct StubBackendFactory {
    document: Option<Arc<dyn MessageBackend>>,
    object: Option<Arc<dyn MessageBackend>>,
    opened: AtomicUsize,
}

impl StubBackendFactory {
    pub fn new(
        document: Option<Arc<dyn MessageBackend>>,
        object: Option<Arc<dyn MessageBackend>>,
    ) -> Self {
        Self {
            document,
            object,
            opened: AtomicUsize::new(0),
        }
    }

    /// Both slots filled with fresh in-memory backends.
    pub fn in_memory() -> Self {
        Self::new(
            Some(Arc::new(DocumentBackend::new(Arc::new(
                MemoryCollection::new(MESSAGES_COLLECTION),
            )))),
            Some(Arc::new(ObjectBackend::in_memory(
                ObjectBackendOptions::default(),
            ))),
        )
    }

    /// Number of open attempts across both slots.
    pub fn open_attempts(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn open(
        &self,
        slot: &Option<Arc<dyn MessageBackend>>,
        kind: BackendKind,
    ) -> Result<Arc<dyn MessageBackend>, ArchiveError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        slot.clone()
            .ok_or_else(|| ArchiveError::StorageUnavailable(format!("{kind} storage is down")))
    }
}

#[async_trait]
impl BackendFactory for StubBackendFactory {
    async fn open_document(&self) -> Result<Arc<dyn MessageBackend>, ArchiveError> {
        self.open(&self.document, BackendKind::Document)
    }

    async fn open_object(&self) -> Result<Arc<dyn MessageBackend>, ArchiveError> {
        self.open(&self.object, BackendKind::Object)
    }
}

/// Backend whose every call fails as unreachable.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableBackend {
    kind: BackendKind,
}

impl UnavailableBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl MessageBackend for UnavailableBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn write(&self, _record: ChatEventRecord) -> Result<ChatEventRecord, ArchiveError> {
        Err(ArchiveError::StorageUnavailable("connection refused".to_string()))
    }

    async fn read_by_conversation(
        &self,
        _chat_id: i64,
    ) -> Result<Vec<ChatEventRecord>, ArchiveError> {
        Err(ArchiveError::StorageUnavailable("connection refused".to_string()))
    }
}

/// Backend whose calls never complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct StalledBackend;

#[async_trait]
impl MessageBackend for StalledBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    async fn write(&self, _record: ChatEventRecord) -> Result<ChatEventRecord, ArchiveError> {
        std::future::pending().await
    }

    async fn read_by_conversation(
        &self,
        _chat_id: i64,
    ) -> Result<Vec<ChatEventRecord>, ArchiveError> {
        std::future::pending().await
    }
}
