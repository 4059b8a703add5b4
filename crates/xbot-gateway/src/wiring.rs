//! Startup wiring from configuration to concrete stores and clients.

use crate::error::GatewayError;
use crate::history::{HistoryService, HistorySettings};
use crate::state::AppState;
use async_trait::async_trait;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use xbot_ai::{
    GeminiImageClient, ImageGenerator, OpenAiCompatibleClient, RetryingImageGenerator,
    TextGenerator,
};
use xbot_archive::{
    ArchiveError, BackendFactory, DocumentBackend, DocumentCollection, JsonlCollection,
    MESSAGES_COLLECTION, MemoryCollection, MessageArchive, MessageBackend, MongoConnection,
    ObjectBackend, ObjectBackendOptions, POLLS_COLLECTION, PROMPTS_COLLECTION, PollStore,
    PromptStore, S3Options, StorageMode, select_backend,
};
use xbot_config::{StorageConfig, XbotConfig};

const DOCUMENTS_DIR: &str = "documents";
const OBJECTS_DIR: &str = "objects";

/// Opens backends from the `storage` config section.
///
/// Document collections come from MongoDB when a URI is set, otherwise from
/// JSONL files under `local.path/documents`. Objects come from S3 when an
/// endpoint is set, otherwise from files under `local.path/objects`. One
/// MongoDB connection is shared by every collection.
pub struct ConfiguredBackends {
    storage: StorageConfig,
    mongo: OnceCell<MongoConnection>,
}

impl ConfiguredBackends {
    pub fn new(storage: StorageConfig) -> Self {
        Self {
            storage,
            mongo: OnceCell::new(),
        }
    }

    fn local_root(&self, dir: &str) -> Option<PathBuf> {
        self.storage.local.path.as_ref().map(|root| root.join(dir))
    }

    async fn mongo(&self) -> Result<&MongoConnection, ArchiveError> {
        let mongo = &self.storage.mongo;
        self.mongo
            .get_or_try_init(|| {
                MongoConnection::connect(
                    &mongo.uri,
                    &mongo.database,
                    Duration::from_secs(mongo.server_selection_timeout_secs.max(1)),
                )
            })
            .await
    }

    /// Open a named document collection on whichever document store is configured.
    pub async fn document_collection(
        &self,
        name: &str,
    ) -> Result<Arc<dyn DocumentCollection>, ArchiveError> {
        if self.storage.mongo.is_configured() {
            return Ok(Arc::new(self.mongo().await?.collection(name)));
        }
        match self.local_root(DOCUMENTS_DIR) {
            Some(root) => Ok(Arc::new(JsonlCollection::open(root, name)?)),
            None => Err(ArchiveError::InvalidConfig(
                "neither storage.mongo.uri nor storage.local.path is set".to_string(),
            )),
        }
    }

    /// Collection for the prompt and poll stores.
    ///
    /// These stores always need somewhere to live, so an unavailable
    /// document store degrades to process memory.
    pub async fn keyed_collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        match self.document_collection(name).await {
            Ok(collection) => collection,
            Err(err) => {
                warn!(
                    "document store unavailable, keeping collection in memory (collection={}, error={})",
                    name, err
                );
                Arc::new(MemoryCollection::new(name))
            }
        }
    }

    fn object_options(&self) -> ObjectBackendOptions {
        ObjectBackendOptions {
            window_days: self.storage.object_window_days,
            scan_policy: self.storage.scan_policy,
            fetch_concurrency: self.storage.fetch_concurrency,
            ..ObjectBackendOptions::default()
        }
    }
}

#[async_trait]
impl BackendFactory for ConfiguredBackends {
    async fn open_document(&self) -> Result<Arc<dyn MessageBackend>, ArchiveError> {
        let collection = self.document_collection(MESSAGES_COLLECTION).await?;
        Ok(Arc::new(DocumentBackend::new(collection)))
    }

    async fn open_object(&self) -> Result<Arc<dyn MessageBackend>, ArchiveError> {
        let s3 = &self.storage.s3;
        if s3.is_configured() {
            let options = S3Options {
                endpoint: s3.endpoint.clone(),
                access_key: s3.access_key.clone(),
                secret_key: s3.secret_key.clone(),
                bucket: s3.bucket.clone(),
                region: s3.region.clone(),
                allow_http: s3.allow_http,
            };
            return Ok(Arc::new(
                ObjectBackend::s3(&options, self.object_options()).await?,
            ));
        }
        match self.local_root(OBJECTS_DIR) {
            Some(root) => Ok(Arc::new(ObjectBackend::local(root, self.object_options())?)),
            None => Err(ArchiveError::InvalidConfig(
                "neither storage.s3.endpoint nor storage.local.path is set".to_string(),
            )),
        }
    }
}

/// Build the shared state from an effective config.
pub async fn build_state(config: &XbotConfig) -> Result<AppState, GatewayError> {
    let backends = ConfiguredBackends::new(config.storage.clone());
    let mode = StorageMode::parse(&config.storage.message_storage);
    let backend = select_backend(mode, &backends).await?;

    let mut archive = MessageArchive::new(backend);
    if let Some(timeout) = config.storage.operation_timeout() {
        archive = archive.with_operation_timeout(timeout);
    }
    let prompts = Arc::new(PromptStore::new(
        backends.keyed_collection(PROMPTS_COLLECTION).await,
    ));
    let polls = Arc::new(PollStore::new(
        backends.keyed_collection(POLLS_COLLECTION).await,
    ));

    let timeout = config.ai.request_timeout();
    let text: Arc<dyn TextGenerator> = Arc::new(OpenAiCompatibleClient::new(
        &config.ai.text.endpoint,
        &config.ai.text.api_key,
        timeout,
    )?);
    let images: Option<Arc<dyn ImageGenerator>> = if config.ai.image.is_configured() {
        let client = GeminiImageClient::new(
            &config.ai.image.endpoint,
            &config.ai.image.api_key,
            &config.ai.image.model,
            timeout,
        )?;
        Some(Arc::new(RetryingImageGenerator::new(Arc::new(client))))
    } else {
        info!("image generation disabled (no ai.image.api_key)");
        None
    };

    let history = HistoryService::new(
        archive.clone(),
        prompts.clone(),
        text,
        HistorySettings {
            summary_models: config.summary_models(),
            chat_model: config.ai.text.model.clone(),
            max_records: config.history.max_records,
            leaderboard_limit: config.history.leaderboard_limit,
        },
    );
    info!(
        "gateway state ready (storage_mode={}, backend={}, images={})",
        mode,
        archive.backend_kind(),
        images.is_some()
    );
    Ok(AppState {
        archive,
        prompts,
        polls,
        history,
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::{ConfiguredBackends, build_state};
    use pretty_assertions::assert_eq;
    use xbot_archive::{ArchiveError, BackendFactory, BackendKind};
    use xbot_config::{LocalStorageConfig, StorageConfig, XbotConfig};

    fn local_storage(root: &std::path::Path, mode: &str) -> StorageConfig {
        StorageConfig {
            message_storage: mode.to_string(),
            local: LocalStorageConfig {
                path: Some(root.to_path_buf()),
            },
            ..StorageConfig::default()
        }
    }

    #[tokio::test]
    async fn nothing_configured_is_invalid_config() {
        let backends = ConfiguredBackends::new(StorageConfig::default());
        let err = backends.open_document().await.err().expect("error");
        assert!(matches!(err, ArchiveError::InvalidConfig(_)));
        let err = backends.open_object().await.err().expect("error");
        assert!(matches!(err, ArchiveError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn local_path_serves_both_backends() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backends = ConfiguredBackends::new(local_storage(temp.path(), ""));
        assert_eq!(
            backends.open_document().await.expect("document").kind(),
            BackendKind::Document
        );
        assert_eq!(
            backends.open_object().await.expect("object").kind(),
            BackendKind::Object
        );
        assert!(temp.path().join("documents").is_dir());
        assert!(temp.path().join("objects").is_dir());
    }

    #[tokio::test]
    async fn explicit_object_mode_selects_object_backend() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = XbotConfig::builder()
            .storage(local_storage(temp.path(), "s3"))
            .build();
        let state = build_state(&config).await.expect("state");
        assert_eq!(state.archive.backend_kind(), BackendKind::Object);
        assert!(state.images.is_none());
    }
}
