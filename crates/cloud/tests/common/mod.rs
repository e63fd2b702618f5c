use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;

use atelier_cloud::error::StorageError;
use atelier_cloud::storage::StorageUploader;

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Shared request counter for mock handlers.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicU32>);

impl Hits {
    /// Record a hit and return its 1-based number.
    pub fn record(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Uploader that keeps everything in memory and records deletes.
#[derive(Default)]
pub struct RecordingUploader {
    pub uploaded: Mutex<Vec<(String, Vec<u8>, String)>>,
    pub deleted: Mutex<Vec<String>>,
}

impl RecordingUploader {
    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().iter().map(|(k, _, _)| k.clone()).collect()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageUploader for RecordingUploader {
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.uploaded
            .lock()
            .unwrap()
            .push((key.to_string(), data, content_type.to_string()));
        Ok(format!("https://cdn.test/{key}"))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }
}
