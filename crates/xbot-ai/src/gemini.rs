//! Gemini `generateContent` image client.

use crate::error::AiError;
use crate::image::{GeneratedImage, ImageGenerator, ImageRequest};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::info;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Model used when none is configured.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

/// Image generator over the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiImageClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiImageClient {
    /// Build a client for `{endpoint}/v1beta/models/{model}:generateContent`.
    pub fn new(
        endpoint: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let model = if model.trim().is_empty() {
            DEFAULT_IMAGE_MODEL
        } else {
            model.trim()
        };
        Ok(Self {
            client,
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[async_trait]
impl ImageGenerator for GeminiImageClient {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, AiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "temperature": request.temperature(),
                "topK": request.top_k(),
                "topP": request.top_p(),
                "candidateCount": 1
            }
        });
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| AiError::Decode(err.to_string()))?;
        let candidate = payload
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AiError::EmptyResponse("no candidates in response".to_string()))?;
        let finish_reason = candidate.finish_reason.unwrap_or_default();
        let inline = candidate
            .content
            .into_iter()
            .flat_map(|content| content.parts)
            .find_map(|part| part.inline_data)
            .ok_or_else(|| {
                AiError::EmptyResponse(format!(
                    "no image data in response (finish_reason={finish_reason})"
                ))
            })?;
        let data = STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|err| AiError::Decode(err.to_string()))?;
        info!(
            "image generated (model={}, mime_type={}, finish_reason={}, bytes={})",
            self.model,
            inline.mime_type,
            finish_reason,
            data.len()
        );
        Ok(GeneratedImage {
            data,
            mime_type: inline.mime_type,
            finish_reason,
        })
    }
}
