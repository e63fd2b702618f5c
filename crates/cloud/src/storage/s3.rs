//! Amazon S3 (or S3-compatible) uploader.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use super::{public_url, validate_key, StorageUploader};
use crate::error::StorageError;

/// Uploads objects to one bucket and serves them from a CDN / bucket URL.
pub struct S3Uploader {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3Uploader {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, public_base_url: String) -> Self {
        Self {
            client,
            bucket,
            public_base_url,
        }
    }

    /// Build a client from the standard AWS environment / profile chain.
    pub async fn from_env(bucket: String, public_base_url: String) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket, public_base_url)
    }
}

#[async_trait]
impl StorageUploader for S3Uploader {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("put_object {key}: {e}")))?;

        tracing::debug!(bucket = %self.bucket, key, size, "Uploaded object to S3");
        Ok(public_url(&self.public_base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("delete_object {key}: {e}")))?;
        Ok(())
    }
}
