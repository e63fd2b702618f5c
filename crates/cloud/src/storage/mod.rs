//! Object storage for generated images.
//!
//! Providers hand each finished image to a [`StorageUploader`] as soon as
//! it exists and keep only the returned public URL.

use async_trait::async_trait;

use crate::error::StorageError;

pub mod local;
pub mod s3;

pub use local::LocalUploader;
pub use s3::S3Uploader;

/// Uploads bytes under a key and serves them from a public URL.
#[async_trait]
pub trait StorageUploader: Send + Sync {
    /// Store `data` at `key` and return its public URL.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<String, StorageError>;

    /// Remove the object at `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Reject empty keys, absolute keys and keys with `..` segments.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "..");
    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Join a public base URL and a key with exactly one slash.
pub(crate) fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}
