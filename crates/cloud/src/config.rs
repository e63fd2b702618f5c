//! Environment-driven selection of storage, image providers and vision.
//!
//! Absent provider credentials select placeholder mode instead of failing
//! startup. Malformed numeric values panic at startup, like the server
//! configuration does.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::providers::placeholder::DEFAULT_PLACEHOLDER_BASE_URL;
use crate::providers::{
    polling, sync, HostedImageProvider, ImageBackend, ImageProvider, PlaceholderProvider,
    PollingImageBackend, SyncImageBackend,
};
use crate::storage::{LocalUploader, S3Uploader, StorageUploader};
use crate::vision::{self, VisionClient};

fn var_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn var_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match var_opt(name) {
        Some(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>())),
        None => default,
    }
}

// ---------------------------------------------------------------------------
// Image providers
// ---------------------------------------------------------------------------

/// Which generation protocol to speak when credentials are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Sync,
    Poll,
}

impl ProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sync" | "openai" => Some(Self::Sync),
            "poll" | "replicate" => Some(Self::Poll),
            _ => None,
        }
    }
}

/// Image provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    /// `None` selects placeholder mode.
    pub api_key: Option<String>,
    /// Overrides the backend's default API root.
    pub base_url: Option<String>,
    /// Overrides the backend's default model.
    pub model: Option<String>,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    pub frame_delay: Duration,
    pub placeholder_base_url: String,
}

impl ProviderSettings {
    /// | Env Var                      | Default                               |
    /// |------------------------------|---------------------------------------|
    /// | `IMAGE_PROVIDER`             | `sync`                                |
    /// | `IMAGE_PROVIDER_API_KEY`     | unset (placeholder mode)              |
    /// | `IMAGE_PROVIDER_BASE_URL`    | backend default                       |
    /// | `IMAGE_PROVIDER_MODEL`       | backend default                       |
    /// | `IMAGE_POLL_INTERVAL_MS`     | `2000`                                |
    /// | `IMAGE_POLL_MAX_ATTEMPTS`    | `60`                                  |
    /// | `IMAGE_FRAME_DELAY_MS`       | `750`                                 |
    /// | `PLACEHOLDER_IMAGE_BASE_URL` | `https://placehold.co/1024x1024/png`  |
    pub fn from_env() -> Self {
        let kind = match var_opt("IMAGE_PROVIDER") {
            Some(raw) => ProviderKind::parse(&raw)
                .unwrap_or_else(|| panic!("IMAGE_PROVIDER must be 'sync' or 'poll', got '{raw}'")),
            None => ProviderKind::Sync,
        };

        Self {
            kind,
            api_key: var_opt("IMAGE_PROVIDER_API_KEY"),
            base_url: var_opt("IMAGE_PROVIDER_BASE_URL"),
            model: var_opt("IMAGE_PROVIDER_MODEL"),
            poll_interval: Duration::from_millis(var_parse(
                "IMAGE_POLL_INTERVAL_MS",
                polling::DEFAULT_POLL_INTERVAL.as_millis() as u64,
            )),
            poll_max_attempts: var_parse("IMAGE_POLL_MAX_ATTEMPTS", polling::DEFAULT_MAX_ATTEMPTS),
            frame_delay: Duration::from_millis(var_parse(
                "IMAGE_FRAME_DELAY_MS",
                crate::providers::hosted::DEFAULT_FRAME_DELAY.as_millis() as u64,
            )),
            placeholder_base_url: var_opt("PLACEHOLDER_IMAGE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER_BASE_URL.to_string()),
        }
    }

    /// Placeholder settings with no credentials.
    pub fn placeholder() -> Self {
        Self {
            kind: ProviderKind::Sync,
            api_key: None,
            base_url: None,
            model: None,
            poll_interval: polling::DEFAULT_POLL_INTERVAL,
            poll_max_attempts: polling::DEFAULT_MAX_ATTEMPTS,
            frame_delay: crate::providers::hosted::DEFAULT_FRAME_DELAY,
            placeholder_base_url: DEFAULT_PLACEHOLDER_BASE_URL.to_string(),
        }
    }

    /// Construct the configured provider. Storage is only used by hosted
    /// backends.
    pub fn build(&self, storage: Arc<dyn StorageUploader>) -> Arc<dyn ImageProvider> {
        let Some(api_key) = self.api_key.clone() else {
            tracing::warn!("IMAGE_PROVIDER_API_KEY not set, previews will use placeholder images");
            return Arc::new(PlaceholderProvider::new(self.placeholder_base_url.clone()));
        };

        let backend: Arc<dyn ImageBackend> = match self.kind {
            ProviderKind::Sync => Arc::new(SyncImageBackend::new(
                self.base_url.as_deref().unwrap_or(sync::DEFAULT_BASE_URL),
                api_key,
                self.model.as_deref().unwrap_or(sync::DEFAULT_MODEL),
            )),
            ProviderKind::Poll => Arc::new(
                PollingImageBackend::new(
                    self.base_url.as_deref().unwrap_or(polling::DEFAULT_BASE_URL),
                    api_key,
                    self.model.as_deref().unwrap_or(polling::DEFAULT_MODEL),
                )
                .with_polling(self.poll_interval, self.poll_max_attempts),
            ),
        };
        tracing::info!(backend = backend.name(), "Image provider configured");

        Arc::new(HostedImageProvider::new(backend, storage).with_frame_delay(self.frame_delay))
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Where generated images are stored.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageSettings {
    S3 {
        bucket: String,
        public_base_url: String,
    },
    Local {
        root: PathBuf,
        public_base_url: String,
    },
}

impl StorageSettings {
    /// | Env Var                    | Default                           |
    /// |----------------------------|-----------------------------------|
    /// | `STORAGE_BACKEND`          | `local`                           |
    /// | `S3_BUCKET`                | required when backend is `s3`     |
    /// | `S3_PUBLIC_BASE_URL`       | `https://{bucket}.s3.amazonaws.com` |
    /// | `LOCAL_STORAGE_DIR`        | `./storage`                       |
    /// | `LOCAL_STORAGE_PUBLIC_URL` | `http://localhost:3000/media`     |
    pub fn from_env() -> Self {
        let backend = var_opt("STORAGE_BACKEND").unwrap_or_else(|| "local".into());
        match backend.to_ascii_lowercase().as_str() {
            "s3" => {
                let bucket =
                    var_opt("S3_BUCKET").expect("S3_BUCKET must be set when STORAGE_BACKEND=s3");
                let public_base_url = var_opt("S3_PUBLIC_BASE_URL")
                    .unwrap_or_else(|| format!("https://{bucket}.s3.amazonaws.com"));
                Self::S3 {
                    bucket,
                    public_base_url,
                }
            }
            "local" => Self::Local {
                root: var_opt("LOCAL_STORAGE_DIR")
                    .unwrap_or_else(|| "./storage".into())
                    .into(),
                public_base_url: var_opt("LOCAL_STORAGE_PUBLIC_URL")
                    .unwrap_or_else(|| "http://localhost:3000/media".into()),
            },
            other => panic!("STORAGE_BACKEND must be 's3' or 'local', got '{other}'"),
        }
    }

    pub async fn build(&self) -> Arc<dyn StorageUploader> {
        match self {
            Self::S3 {
                bucket,
                public_base_url,
            } => {
                tracing::info!(bucket = %bucket, "Using S3 storage");
                Arc::new(S3Uploader::from_env(bucket.clone(), public_base_url.clone()).await)
            }
            Self::Local {
                root,
                public_base_url,
            } => {
                tracing::info!(root = %root.display(), "Using local storage");
                Arc::new(LocalUploader::new(root.clone(), public_base_url.clone()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Vision
// ---------------------------------------------------------------------------

/// Vision client configuration.
#[derive(Debug, Clone)]
pub struct VisionSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_retries: u32,
}

impl VisionSettings {
    /// | Env Var              | Default                  |
    /// |----------------------|--------------------------|
    /// | `VISION_API_KEY`     | unset (analysis off)     |
    /// | `VISION_BASE_URL`    | `https://api.openai.com` |
    /// | `VISION_MODEL`       | `gpt-4o-mini`            |
    /// | `VISION_MAX_RETRIES` | `2`                      |
    pub fn from_env() -> Self {
        Self {
            api_key: var_opt("VISION_API_KEY"),
            base_url: var_opt("VISION_BASE_URL").unwrap_or_else(|| vision::DEFAULT_BASE_URL.into()),
            model: var_opt("VISION_MODEL").unwrap_or_else(|| vision::DEFAULT_MODEL.into()),
            max_retries: var_parse("VISION_MAX_RETRIES", 2),
        }
    }

    pub fn build(&self) -> VisionClient {
        if self.api_key.is_none() {
            tracing::warn!("VISION_API_KEY not set, upgrade previews will skip photo analysis");
        }
        VisionClient::new(&self.base_url, self.api_key.clone(), &self.model)
            .with_retry_policy(self.retry_policy())
    }

    /// One initial attempt plus `max_retries`.
    fn retry_policy(&self) -> crate::retry::RetryPolicy {
        crate::retry::RetryPolicy::VISION.with_max_attempts(self.max_retries.saturating_add(1))
    }
}
