//! Test helpers shared across xbot crates.

pub mod ai;
pub mod storage;
pub mod updates;

pub use ai::{FailingTextGenerator, RecordedPrompt, ScriptedImageGenerator, StubTextGenerator};
pub use storage::{StalledBackend, StubBackendFactory, UnavailableBackend};
pub use updates::{message_update, poll_answer_update, text_update};
