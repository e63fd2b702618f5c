//! Vision client that turns an uploaded jewelry photo into a structured
//! [`DesignAnalysis`].
//!
//! Callers always receive an [`AnalysisOutcome`]. Missing credentials,
//! exhausted retries and unusable model output all collapse into
//! [`AnalysisOutcome::Unavailable`] so an upgrade preview can still be
//! rendered from its snapshot alone.

use async_trait::async_trait;
use atelier_core::prompt::DesignAnalysis;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::providers::ensure_success;
use crate::retry::{with_retry, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Fixed instruction sent with every image.
const INSTRUCTION: &str = "You are a jewelry appraiser. Describe the piece in the photo. \
Respond with a single JSON object and nothing else, using exactly these keys: \
\"category\" (string, e.g. ring, pendant, earrings, bracelet), \
\"metal\" (string or null), \
\"stones\" (array of short strings, empty if none), \
\"style\" (string or null), \
\"description\" (one sentence).";

/// An image to analyze.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageRef {
    Url(String),
    Bytes { data: Vec<u8>, content_type: String },
}

impl ImageRef {
    /// URL form accepted by the chat API; bytes become a data URI.
    pub fn to_request_url(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Bytes { data, content_type } => {
                format!("data:{content_type};base64,{}", STANDARD.encode(data))
            }
        }
    }
}

/// Result of one analysis request.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Available(DesignAnalysis),
    Unavailable { reason: String },
}

impl AnalysisOutcome {
    fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn into_analysis(self) -> Option<DesignAnalysis> {
        match self {
            Self::Available(analysis) => Some(analysis),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Extracts a structured description from a photo.
#[async_trait]
pub trait DesignAnalyzer: Send + Sync {
    async fn analyze(&self, image: &ImageRef) -> AnalysisOutcome;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client.
pub struct VisionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    retry: RetryPolicy,
}

impl VisionClient {
    /// A client without an API key answers every request with `Unavailable`.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            retry: RetryPolicy::VISION,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn request_once(&self, api_key: &str, image_url: &str) -> Result<ChatResponse, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "temperature": 0,
            "messages": [
                { "role": "system", "content": INSTRUCTION },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": "Analyze this piece of jewelry." },
                        { "type": "image_url", "image_url": { "url": image_url } },
                    ],
                },
            ],
        });
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

/// Validate the model's JSON content into an analysis.
fn parse_analysis(response: ChatResponse) -> AnalysisOutcome {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return AnalysisOutcome::unavailable("Model returned empty content");
    }

    let analysis: DesignAnalysis = match serde_json::from_str(content.trim()) {
        Ok(analysis) => analysis,
        Err(e) => return AnalysisOutcome::unavailable(format!("Model returned malformed JSON: {e}")),
    };
    if analysis.category.as_deref().map_or(true, |c| c.trim().is_empty()) {
        return AnalysisOutcome::unavailable("Model response is missing a category");
    }
    AnalysisOutcome::Available(analysis)
}

#[async_trait]
impl DesignAnalyzer for VisionClient {
    async fn analyze(&self, image: &ImageRef) -> AnalysisOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return AnalysisOutcome::unavailable("Vision API key is not configured");
        };
        let image_url = image.to_request_url();

        match with_retry(&self.retry, "vision.analyze", || self.request_once(api_key, &image_url)).await {
            Ok(response) => {
                let outcome = parse_analysis(response);
                if let AnalysisOutcome::Unavailable { reason } = &outcome {
                    tracing::warn!(model = %self.model, reason = %reason, "Vision analysis unusable");
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(model = %self.model, error = %e, "Vision analysis failed");
                AnalysisOutcome::unavailable(e.to_string())
            }
        }
    }
}
