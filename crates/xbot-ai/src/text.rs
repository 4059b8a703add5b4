//! Text generation and candidate-model fallback.

use crate::error::AiError;
use async_trait::async_trait;
use log::{info, warn};

#[async_trait]
/// Chat-completion style text generation.
pub trait TextGenerator: Send + Sync {
    /// Generate a reply to `user_prompt` under `system_prompt` with `model`.
    async fn generate_text(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AiError>;
}

/// Successful fallback result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackOutcome {
    /// Generated text.
    pub text: String,
    /// Model that produced it.
    pub model: String,
}

/// Try each model in order and return the first success.
///
/// Returns the last error when every model fails, or [`AiError::NoModels`]
/// when `models` is empty.
pub async fn generate_with_fallback(
    generator: &dyn TextGenerator,
    models: &[String],
    system_prompt: &str,
    user_prompt: &str,
) -> Result<FallbackOutcome, AiError> {
    let mut last_error = AiError::NoModels;
    for model in models {
        match generator
            .generate_text(model, system_prompt, user_prompt)
            .await
        {
            Ok(text) => {
                info!(
                    "text generated (model={}, output_len={})",
                    model,
                    text.len()
                );
                return Ok(FallbackOutcome {
                    text,
                    model: model.clone(),
                });
            }
            Err(err) => {
                warn!("model failed, trying next (model={}, error={})", model, err);
                last_error = err;
            }
        }
    }
    Err(last_error)
}
