//! Credential-less provider returning deterministic stand-in URLs.

use async_trait::async_trait;
use atelier_core::frames::{frame_angle, frame_prompt};
use atelier_core::types::DbId;
use sha2::{Digest, Sha256};

use super::ImageProvider;
use crate::error::ProviderError;

/// Default placeholder image service.
pub const DEFAULT_PLACEHOLDER_BASE_URL: &str = "https://placehold.co/1024x1024/png";

/// Returns URLs derived from the job id and prompt. Never touches the network.
pub struct PlaceholderProvider {
    base_url: String,
}

impl Default for PlaceholderProvider {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_BASE_URL)
    }
}

impl PlaceholderProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn url(&self, job_id: DbId, label: &str, prompt: &str) -> String {
        let digest = Sha256::digest(prompt.as_bytes());
        let seed: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
        format!("{}?text={label}&job={job_id}&seed={seed}", self.base_url)
    }
}

#[async_trait]
impl ImageProvider for PlaceholderProvider {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn generate_single(&self, job_id: DbId, prompt: &str) -> Result<String, ProviderError> {
        tracing::debug!(job_id, "Placeholder mode: returning stand-in image");
        Ok(self.url(job_id, "Preview", prompt))
    }

    async fn generate_multi_frame(
        &self,
        job_id: DbId,
        prompt: &str,
        frame_count: u32,
    ) -> Result<Vec<String>, ProviderError> {
        tracing::debug!(job_id, frame_count, "Placeholder mode: returning stand-in frames");
        Ok((0..frame_count)
            .map(|i| {
                let label = format!("View+{}+deg", frame_angle(i, frame_count));
                self.url(job_id, &label, &frame_prompt(prompt, i, frame_count))
            })
            .collect())
    }
}
