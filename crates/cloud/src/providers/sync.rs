//! Synchronous image backend for OpenAI-style `images/generations` APIs.
//!
//! One request returns the finished image, either inline as base64 or as a
//! short-lived URL.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{ensure_success, ImageBackend, RenderedImage};
use crate::error::ProviderError;
use crate::retry::{with_retry, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-image-1";
pub const DEFAULT_SIZE: &str = "1024x1024";

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// HTTP client for a synchronous image generation endpoint.
pub struct SyncImageBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    size: String,
    retry: RetryPolicy,
}

impl SyncImageBackend {
    /// * `base_url` - API root without the `/v1` suffix, e.g. `https://api.openai.com`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            size: DEFAULT_SIZE.to_string(),
            retry: RetryPolicy::SYNC_IMAGE,
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request_once(&self, prompt: &str) -> Result<GenerationResponse, ProviderError> {
        let body = GenerationRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: &self.size,
        };
        let response = self
            .client
            .post(format!("{}/v1/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        response
            .json::<GenerationResponse>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

/// Pick the first usable image out of a generation response.
fn first_image(response: GenerationResponse) -> Result<RenderedImage, ProviderError> {
    let image = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Malformed("Response contained no images".into()))?;

    if let Some(encoded) = image.b64_json {
        let data = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| ProviderError::Malformed(format!("Invalid base64 image: {e}")))?;
        return Ok(RenderedImage::Bytes {
            data,
            content_type: "image/png".to_string(),
        });
    }
    match image.url {
        Some(url) => Ok(RenderedImage::Remote { url }),
        None => Err(ProviderError::Malformed(
            "Image entry has neither b64_json nor url".into(),
        )),
    }
}

#[async_trait]
impl ImageBackend for SyncImageBackend {
    fn name(&self) -> &'static str {
        "sync"
    }

    async fn render(&self, prompt: &str) -> Result<RenderedImage, ProviderError> {
        let response = with_retry(&self.retry, "images.generate", || self.request_once(prompt)).await?;
        first_image(response)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn parse(json: &str) -> GenerationResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn decodes_inline_base64() {
        let response = parse(r#"{"data":[{"b64_json":"aGVsbG8="}]}"#);
        assert_eq!(
            first_image(response).unwrap(),
            RenderedImage::Bytes {
                data: b"hello".to_vec(),
                content_type: "image/png".into()
            }
        );
    }

    #[test]
    fn falls_back_to_url() {
        let response = parse(r#"{"data":[{"url":"https://cdn.test/a.png"}]}"#);
        assert_matches!(first_image(response), Ok(RenderedImage::Remote { url }) if url == "https://cdn.test/a.png");
    }

    #[test]
    fn empty_data_is_malformed() {
        assert_matches!(first_image(parse(r#"{"data":[]}"#)), Err(ProviderError::Malformed(_)));
        assert_matches!(first_image(parse(r#"{}"#)), Err(ProviderError::Malformed(_)));
    }

    #[test]
    fn invalid_base64_is_malformed() {
        let response = parse(r#"{"data":[{"b64_json":"***"}]}"#);
        assert_matches!(first_image(response), Err(ProviderError::Malformed(msg)) if msg.contains("base64"));
    }
}
