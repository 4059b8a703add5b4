//! Shared state managed by the rocket instance.

use crate::history::HistoryService;
use std::sync::Arc;
use xbot_ai::ImageGenerator;
use xbot_archive::{MessageArchive, PollStore, PromptStore};

/// Everything request handlers need; built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub archive: MessageArchive,
    pub prompts: Arc<PromptStore>,
    pub polls: Arc<PollStore>,
    pub history: HistoryService,
    /// `None` when no image endpoint is configured.
    pub images: Option<Arc<dyn ImageGenerator>>,
}
