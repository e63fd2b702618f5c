//! Provider that renders through a backend and re-hosts results in storage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atelier_core::frames::frame_prompt;
use atelier_core::types::DbId;

use super::{ensure_success, extension_for, ImageBackend, ImageProvider, RenderedImage};
use crate::error::ProviderError;
use crate::storage::StorageUploader;

/// Default pause between frames of a multi-frame job.
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(750);

/// Default prefix for object keys.
pub const DEFAULT_KEY_PREFIX: &str = "previews";

/// Drives an [`ImageBackend`] and uploads each image as soon as it exists.
pub struct HostedImageProvider {
    backend: Arc<dyn ImageBackend>,
    storage: Arc<dyn StorageUploader>,
    http: reqwest::Client,
    frame_delay: Duration,
    key_prefix: String,
}

impl HostedImageProvider {
    pub fn new(backend: Arc<dyn ImageBackend>, storage: Arc<dyn StorageUploader>) -> Self {
        Self {
            backend,
            storage,
            http: reqwest::Client::new(),
            frame_delay: DEFAULT_FRAME_DELAY,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn with_frame_delay(mut self, frame_delay: Duration) -> Self {
        self.frame_delay = frame_delay;
        self
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    /// Object key for one image of a job; `name` distinguishes frames.
    fn object_key(&self, job_id: DbId, name: &str, content_type: &str) -> String {
        format!(
            "{}/{job_id}/{name}-{}.{}",
            self.key_prefix,
            uuid::Uuid::new_v4().simple(),
            extension_for(content_type)
        )
    }

    /// Fetch a provider-hosted image so it can be re-hosted.
    async fn download(&self, url: &str) -> Result<(Vec<u8>, String), ProviderError> {
        let response = ensure_success(self.http.get(url).send().await?).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let data = response.bytes().await?.to_vec();
        if data.is_empty() {
            return Err(ProviderError::Malformed(format!("Empty image body at {url}")));
        }
        Ok((data, content_type))
    }

    /// Render one prompt and upload the result. Returns `(key, public_url)`.
    async fn render_and_store(
        &self,
        job_id: DbId,
        name: &str,
        prompt: &str,
    ) -> Result<(String, String), ProviderError> {
        let (data, content_type) = match self.backend.render(prompt).await? {
            RenderedImage::Bytes { data, content_type } => (data, content_type),
            RenderedImage::Remote { url } => self.download(&url).await?,
        };
        let key = self.object_key(job_id, name, &content_type);
        let url = self.storage.upload(&key, data, &content_type).await?;
        Ok((key, url))
    }
}

/// Keys uploaded for a frame set that has not been handed back yet.
///
/// Dropping the guard while it still holds keys (the caller timed out or
/// was cancelled mid-set) deletes them on a background task.
struct PendingFrames {
    job_id: DbId,
    storage: Arc<dyn StorageUploader>,
    keys: Vec<String>,
}

impl PendingFrames {
    fn new(job_id: DbId, storage: Arc<dyn StorageUploader>, capacity: usize) -> Self {
        Self {
            job_id,
            storage,
            keys: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, key: String) {
        self.keys.push(key);
    }

    /// Delete everything uploaded so far and disarm the guard.
    async fn discard(mut self) {
        let keys = std::mem::take(&mut self.keys);
        delete_keys(Arc::clone(&self.storage), self.job_id, keys).await;
    }

    /// The set is complete; keep the uploads.
    fn release(mut self) {
        self.keys.clear();
    }
}

impl Drop for PendingFrames {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let keys = std::mem::take(&mut self.keys);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::info!(job_id = self.job_id, frames = keys.len(), "Frame set abandoned, deleting uploads");
                handle.spawn(delete_keys(Arc::clone(&self.storage), self.job_id, keys));
            }
            Err(_) => {
                tracing::warn!(job_id = self.job_id, keys = ?keys, "Frame set abandoned outside a runtime, uploads left behind");
            }
        }
    }
}

/// Best-effort removal of uploaded objects.
async fn delete_keys(storage: Arc<dyn StorageUploader>, job_id: DbId, keys: Vec<String>) {
    for key in &keys {
        if let Err(e) = storage.delete(key).await {
            tracing::warn!(job_id, key = %key, error = %e, "Failed to delete partial frame");
        }
    }
}

#[async_trait]
impl ImageProvider for HostedImageProvider {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn generate_single(&self, job_id: DbId, prompt: &str) -> Result<String, ProviderError> {
        let (key, url) = self.render_and_store(job_id, "preview", prompt).await?;
        tracing::info!(job_id, backend = self.backend.name(), key = %key, "Preview image stored");
        Ok(url)
    }

    async fn generate_multi_frame(
        &self,
        job_id: DbId,
        prompt: &str,
        frame_count: u32,
    ) -> Result<Vec<String>, ProviderError> {
        let mut pending =
            PendingFrames::new(job_id, Arc::clone(&self.storage), frame_count as usize);
        let mut urls = Vec::with_capacity(frame_count as usize);

        for index in 0..frame_count {
            let frame = frame_prompt(prompt, index, frame_count);
            let name = format!("frame-{index:02}");
            match self.render_and_store(job_id, &name, &frame).await {
                Ok((key, url)) => {
                    tracing::debug!(job_id, frame = index, frame_count, "Frame stored");
                    pending.push(key);
                    urls.push(url);
                }
                Err(e) => {
                    tracing::warn!(
                        job_id,
                        frame = index,
                        frame_count,
                        error = %e,
                        "Frame generation failed, discarding earlier frames",
                    );
                    pending.discard().await;
                    return Err(e);
                }
            }

            if index + 1 < frame_count && !self.frame_delay.is_zero() {
                tokio::time::sleep(self.frame_delay).await;
            }
        }

        pending.release();
        tracing::info!(job_id, frame_count, backend = self.backend.name(), "All frames stored");
        Ok(urls)
    }

    /// Map each URL back to its object key under this job and delete it.
    /// URLs that were not stored by this provider are ignored.
    async fn discard(&self, job_id: DbId, urls: &[String]) {
        let marker = format!("{}/{job_id}/", self.key_prefix);
        let keys: Vec<String> = urls
            .iter()
            .filter_map(|url| url.find(&marker).map(|at| url[at..].to_string()))
            .collect();
        if !keys.is_empty() {
            tracing::info!(job_id, objects = keys.len(), "Discarding rejected provider result");
            delete_keys(Arc::clone(&self.storage), job_id, keys).await;
        }
    }
}
