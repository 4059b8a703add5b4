//! Error types for archive operations.

/// Errors returned by backends, the facade and the keyed stores.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The underlying store could not be reached, or the call timed out.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Stored bytes are not a valid record.
    #[error("decode error: {0}")]
    Decode(String),
    /// A record could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
    /// Neither backend could be initialized.
    #[error("no message storage configured")]
    NoStorageConfigured,
    /// Singleton lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),
    /// Storage settings are incomplete or contradictory.
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),
}

impl ArchiveError {
    /// Whether a caller may retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<object_store::Error> for ArchiveError {
    fn from(err: object_store::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for ArchiveError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}
