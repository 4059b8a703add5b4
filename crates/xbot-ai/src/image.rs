//! Image generation contract and retry wrapper.

use crate::error::AiError;
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;
use std::time::Duration;

/// Sampling temperature used when the request leaves it unset.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Top-k used when the request leaves it unset.
pub const DEFAULT_TOP_K: u32 = 40;
/// Top-p used when the request leaves it unset.
pub const DEFAULT_TOP_P: f64 = 0.95;
/// Attempts made by [`RetryingImageGenerator`].
pub const DEFAULT_IMAGE_ATTEMPTS: usize = 3;

/// Parameters for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    /// Text prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Top-k sampling.
    pub top_k: Option<u32>,
    /// Nucleus sampling.
    pub top_p: Option<f64>,
}

impl ImageRequest {
    /// Request with vendor defaults.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            top_k: None,
            top_p: None,
        }
    }

    /// Effective temperature.
    pub fn temperature(&self) -> f64 {
        self.temperature
            .filter(|value| *value > 0.0)
            .unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Effective top-k.
    pub fn top_k(&self) -> u32 {
        self.top_k.filter(|value| *value > 0).unwrap_or(DEFAULT_TOP_K)
    }

    /// Effective top-p.
    pub fn top_p(&self) -> f64 {
        self.top_p
            .filter(|value| *value > 0.0)
            .unwrap_or(DEFAULT_TOP_P)
    }
}

/// Decoded image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// MIME type reported by the vendor.
    pub mime_type: String,
    /// Vendor finish reason, empty when not reported.
    pub finish_reason: String,
}

#[async_trait]
/// Text-to-image generation.
pub trait ImageGenerator: Send + Sync {
    /// Generate one image.
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, AiError>;
}

/// Retries transient image failures a bounded number of times.
pub struct RetryingImageGenerator {
    inner: Arc<dyn ImageGenerator>,
    attempts: usize,
    backoff: Duration,
}

impl RetryingImageGenerator {
    /// Wrap a generator with the default attempt count.
    pub fn new(inner: Arc<dyn ImageGenerator>) -> Self {
        Self {
            inner,
            attempts: DEFAULT_IMAGE_ATTEMPTS,
            backoff: Duration::from_millis(500),
        }
    }

    /// Override the attempt count (at least one).
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Override the pause between attempts.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl ImageGenerator for RetryingImageGenerator {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, AiError> {
        let mut attempt = 1;
        loop {
            match self.inner.generate_image(request).await {
                Ok(image) if !image.data.is_empty() => return Ok(image),
                Ok(_) => {
                    let err = AiError::EmptyResponse("image data is empty".to_string());
                    if attempt >= self.attempts {
                        return Err(err);
                    }
                    warn!("image attempt failed (attempt={}, error={})", attempt, err);
                }
                Err(err) if err.is_retryable() && attempt < self.attempts => {
                    warn!("image attempt failed (attempt={}, error={})", attempt, err);
                }
                Err(err) => return Err(err),
            }
            attempt += 1;
            if !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
        }
    }
}
