//! Startup choice of the message backend.

use crate::backend::MessageBackend;
use crate::error::ArchiveError;
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configured storage preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Use the document backend; failure to open it is fatal.
    Document,
    /// Use the object backend; failure to open it is fatal.
    Object,
    /// Open whatever is available, preferring the document backend.
    #[default]
    Auto,
}

impl StorageMode {
    /// Parse a configured mode name.
    ///
    /// Unknown names fall back to [`StorageMode::Auto`] with a warning.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Self::Auto,
            "document" | "mongodb" | "mongo" => Self::Document,
            "object" | "s3" | "minio" => Self::Object,
            other => {
                warn!("unknown message storage mode, using auto (mode={})", other);
                Self::Auto
            }
        }
    }

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Object => "object",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
/// Opens the concrete backends from configuration.
pub trait BackendFactory: Send + Sync {
    /// Open and verify the document backend.
    async fn open_document(&self) -> Result<Arc<dyn MessageBackend>, ArchiveError>;

    /// Open and verify the object backend.
    async fn open_object(&self) -> Result<Arc<dyn MessageBackend>, ArchiveError>;
}

/// Choose the single backend the archive will use.
///
/// Explicit modes propagate the open error. In auto mode both backends are
/// attempted, each failure is logged, the document backend wins when both
/// open, and [`ArchiveError::NoStorageConfigured`] is returned when neither
/// does.
pub async fn select_backend(
    mode: StorageMode,
    factory: &dyn BackendFactory,
) -> Result<Arc<dyn MessageBackend>, ArchiveError> {
    let backend = match mode {
        StorageMode::Document => factory.open_document().await?,
        StorageMode::Object => factory.open_object().await?,
        StorageMode::Auto => {
            let document = factory.open_document().await;
            let object = factory.open_object().await;
            match (document, object) {
                (Ok(document), _) => document,
                (Err(document_err), Ok(object)) => {
                    warn!("document storage unavailable (error={})", document_err);
                    object
                }
                (Err(document_err), Err(object_err)) => {
                    warn!("document storage unavailable (error={})", document_err);
                    warn!("object storage unavailable (error={})", object_err);
                    return Err(ArchiveError::NoStorageConfigured);
                }
            }
        }
    };
    info!(
        "message storage selected (mode={}, backend={})",
        mode,
        backend.kind()
    );
    Ok(backend)
}
