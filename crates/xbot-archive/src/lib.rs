//! Message archive for the xbot gateway.
//!
//! Every inbound chat event is recorded through [`MessageArchive`], which
//! delegates to exactly one [`MessageBackend`] chosen at startup by
//! [`select_backend`]. Two backends exist: a document store queried by
//! conversation id, and an object store whose keys are partitioned by
//! conversation and calendar day.

pub mod backend;
pub mod clock;
pub mod codec;
pub mod document;
pub mod error;
pub mod facade;
pub mod model;
pub mod object;
pub mod poll;
pub mod prompt;
pub mod selection;
pub mod stats;
pub mod window;

/// Backend contract shared by both storage engines.
pub use backend::{BackendKind, MessageBackend};
/// Time sources used to stamp records.
pub use clock::{Clock, FixedClock, SystemClock};
/// Document backend and its collection seam.
pub use document::{
    DocumentBackend, DocumentCollection, DocumentFilter, JsonlCollection, MESSAGES_COLLECTION,
    MemoryCollection,
};
/// Archive error type.
pub use error::ArchiveError;
/// Single entry point for saving and reading messages.
pub use facade::MessageArchive;
/// Record model.
pub use model::{ChatEventRecord, PollAnswer, RecordId, Sender, UpdatePayload};
/// Object backend, options and key layout.
pub use object::{
    ObjectBackend, ObjectBackendOptions, S3Options, ScanPolicy, UNASSIGNED_PARTITION,
};
/// Poll tracking.
pub use poll::{POLLS_COLLECTION, PollRecord, PollStore, poll_date};
/// Per-conversation system prompts.
pub use prompt::{DEFAULT_SYSTEM_PROMPT, PROMPTS_COLLECTION, PromptRecord, PromptStore};
/// Startup backend selection.
pub use selection::{BackendFactory, StorageMode, select_backend};
/// Sender activity ranking.
pub use stats::{SenderActivity, activity_leaderboard};
/// Prompt-sized transcript builder.
pub use window::{ContextWindow, DEFAULT_MAX_RECORDS};

#[cfg(feature = "mongodb")]
pub use document::{MongoCollection, MongoConnection};
