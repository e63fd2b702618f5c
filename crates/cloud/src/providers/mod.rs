//! Image generation providers.
//!
//! [`ImageProvider`] is the capability the worker loop calls. Two
//! implementations exist:
//!
//! - [`PlaceholderProvider`]: no credentials configured; returns
//!   deterministic stand-in URLs without any network traffic.
//! - [`HostedImageProvider`]: drives an [`ImageBackend`] strategy
//!   ([`SyncImageBackend`] or [`PollingImageBackend`]) and re-hosts each
//!   result through a [`StorageUploader`](crate::storage::StorageUploader).

use async_trait::async_trait;
use atelier_core::types::DbId;

use crate::error::ProviderError;

pub mod hosted;
pub mod placeholder;
pub mod polling;
pub mod sync;

pub use hosted::HostedImageProvider;
pub use placeholder::PlaceholderProvider;
pub use polling::PollingImageBackend;
pub use sync::SyncImageBackend;

/// Generates preview imagery and returns public URLs.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Short name for logs (e.g. `"placeholder"`, `"sync"`).
    fn name(&self) -> &str;

    /// Generate one image for `prompt`.
    async fn generate_single(&self, job_id: DbId, prompt: &str) -> Result<String, ProviderError>;

    /// Generate `frame_count` images around the piece, in ascending angle order.
    async fn generate_multi_frame(
        &self,
        job_id: DbId,
        prompt: &str,
        frame_count: u32,
    ) -> Result<Vec<String>, ProviderError>;

    /// Release whatever backs `urls` after the caller rejected a result.
    /// Best effort; the default does nothing.
    async fn discard(&self, _job_id: DbId, _urls: &[String]) {}
}

/// One image as produced by a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedImage {
    /// Raw image bytes returned inline.
    Bytes { data: Vec<u8>, content_type: String },
    /// A URL on the provider's own CDN, usually short-lived.
    Remote { url: String },
}

/// A single-image generation protocol.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(&self, prompt: &str) -> Result<RenderedImage, ProviderError>;
}

/// Return the response unchanged on 2xx, or [`ProviderError::Api`] carrying
/// the status and body text.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// File extension for an image content type.
pub(crate) fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}
