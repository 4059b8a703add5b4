use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use xbot_ai::{AiError, GeneratedImage, ImageGenerator, ImageRequest, TextGenerator};

/// One call seen by [`StubTextGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPrompt {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Replies with a fixed text and records every prompt.
#[derive(Debug, Default)]
pub struct StubTextGenerator {
    response: String,
    failing_models: Vec<String>,
    calls: Mutex<Vec<RecordedPrompt>>,
}

impl StubTextGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            failing_models: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Models that answer with a 503 instead of the fixed text.
    pub fn with_failing_models(mut self, models: &[&str]) -> Self {
        self.failing_models = models.iter().map(|model| model.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<RecordedPrompt> {
        self.calls.lock().clone()
    }

    pub fn last_call(&self) -> Option<RecordedPrompt> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for StubTextGenerator {
    async fn generate_text(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AiError> {
        self.calls.lock().push(RecordedPrompt {
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
        });
        if self.failing_models.iter().any(|failing| failing == model) {
            return Err(AiError::Status {
                status: 503,
                body: format!("{model} unavailable"),
            });
        }
        Ok(self.response.clone())
    }
}

/// Every call fails with the same status.
#[derive(Debug, Clone)]
pub struct FailingTextGenerator {
    status: u16,
}

impl FailingTextGenerator {
    pub fn new(status: u16) -> Self {
        Self { status }
    }
}

impl Default for FailingTextGenerator {
    fn default() -> Self {
        Self::new(500)
    }
}

#[async_trait]
impl TextGenerator for FailingTextGenerator {
    async fn generate_text(
        &self,
        model: &str,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> Result<String, AiError> {
        Err(AiError::Status {
            status: self.status,
            body: format!("{model} failed"),
        })
    }
}

/// Pops scripted results in order; an exhausted script yields an empty response.
#[derive(Debug, Default)]
pub struct ScriptedImageGenerator {
    script: Mutex<VecDeque<Result<GeneratedImage, AiError>>>,
    requests: Mutex<Vec<ImageRequest>>,
}

impl ScriptedImageGenerator {
    pub fn new(script: Vec<Result<GeneratedImage, AiError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn png(bytes: &[u8]) -> GeneratedImage {
        GeneratedImage {
            data: bytes.to_vec(),
            mime_type: "image/png".to_string(),
            finish_reason: "STOP".to_string(),
        }
    }

    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedImageGenerator {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, AiError> {
        self.requests.lock().push(request.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AiError::EmptyResponse("script exhausted".to_string())))
    }
}
