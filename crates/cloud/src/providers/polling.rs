//! Poll-based image backend for Replicate-style `predictions` APIs.
//!
//! Submission returns a prediction handle; the backend then checks its
//! status on a fixed interval for at most `max_attempts` times.
//!
//! - Transport failures and 5xx during polling are retried in place.
//! - 4xx during polling is fatal.
//! - Exhausting the attempt budget yields [`ProviderError::Timeout`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_success, ImageBackend, RenderedImage};
use crate::error::ProviderError;
use crate::retry::{with_retry, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";
pub const DEFAULT_MODEL: &str = "black-forest-labs/flux-schnell";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// A prediction as returned by both the submit and status endpoints.
#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Where a prediction stands after one status check.
#[derive(Debug, PartialEq)]
enum PollOutcome {
    Done(String),
    Pending,
}

impl Prediction {
    fn outcome(&self) -> Result<PollOutcome, ProviderError> {
        match self.status.as_str() {
            "succeeded" => first_output_url(self.output.as_ref()).map(PollOutcome::Done),
            "failed" | "canceled" => {
                let reason = match &self.error {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => format!("prediction {} {}", self.id, self.status),
                };
                Err(ProviderError::Generation(reason))
            }
            _ => Ok(PollOutcome::Pending),
        }
    }
}

/// `output` is either a single URL or a list of URLs.
fn first_output_url(output: Option<&serde_json::Value>) -> Result<String, ProviderError> {
    let url = match output {
        Some(serde_json::Value::String(url)) => Some(url.clone()),
        Some(serde_json::Value::Array(items)) => items.iter().find_map(|item| item.as_str().map(String::from)),
        _ => None,
    };
    url.ok_or_else(|| ProviderError::Malformed("Succeeded prediction has no output URL".into()))
}

/// HTTP client for a prediction-style generation API.
pub struct PollingImageBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    poll_interval: Duration,
    max_attempts: u32,
    submit_retry: RetryPolicy,
}

impl PollingImageBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            submit_retry: RetryPolicy::POLL_SUBMIT,
        }
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_submit_retry(mut self, retry: RetryPolicy) -> Self {
        self.submit_retry = retry;
        self
    }

    async fn submit_once(&self, prompt: &str) -> Result<Prediction, ProviderError> {
        let body = serde_json::json!({ "input": { "prompt": prompt } });
        let response = self
            .client
            .post(format!("{}/v1/models/{}/predictions", self.base_url, self.model))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        response
            .json::<Prediction>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    async fn fetch_status(&self, prediction_id: &str) -> Result<Prediction, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/predictions/{}", self.base_url, prediction_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        response
            .json::<Prediction>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    /// Check the prediction until it settles or the attempt budget runs out.
    async fn wait_for(&self, prediction_id: &str) -> Result<String, ProviderError> {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.poll_interval).await;

            match self.fetch_status(prediction_id).await {
                Ok(prediction) => match prediction.outcome()? {
                    PollOutcome::Done(url) => {
                        tracing::debug!(prediction_id, attempt, "Prediction succeeded");
                        return Ok(url);
                    }
                    PollOutcome::Pending => {}
                },
                Err(e) if e.is_transport() || e.is_server_error() => {
                    tracing::warn!(prediction_id, attempt, error = %e, "Transient poll failure");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ProviderError::Timeout {
            attempts: self.max_attempts,
        })
    }
}

#[async_trait]
impl ImageBackend for PollingImageBackend {
    fn name(&self) -> &'static str {
        "poll"
    }

    async fn render(&self, prompt: &str) -> Result<RenderedImage, ProviderError> {
        let prediction =
            with_retry(&self.submit_retry, "predictions.create", || self.submit_once(prompt)).await?;
        tracing::debug!(prediction_id = %prediction.id, model = %self.model, "Prediction submitted");

        // Some deployments answer synchronously when the model is warm.
        let url = match prediction.outcome()? {
            PollOutcome::Done(url) => url,
            PollOutcome::Pending => self.wait_for(&prediction.id).await?,
        };
        Ok(RenderedImage::Remote { url })
    }
}
