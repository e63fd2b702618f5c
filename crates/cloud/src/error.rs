//! Error types shared by every provider and uploader.

/// Errors from a [`StorageUploader`](crate::storage::StorageUploader).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The object key would escape the storage root or is empty.
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote object store rejected the request.
    #[error("Object storage error: {0}")]
    Backend(String),
}

/// The single error kind every image provider reports.
///
/// Backends map their own response shapes onto these variants before the
/// error leaves the crate, so the worker loop only ever records
/// `ProviderError::to_string()` on a failed job.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose payload could not be understood.
    #[error("Malformed provider response: {0}")]
    Malformed(String),

    /// The provider reported that generation itself failed.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// A poll-based provider did not finish within its attempt budget.
    #[error("Provider did not finish after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("Upload failed: {0}")]
    Storage(#[from] StorageError),
}

impl ProviderError {
    /// Connection-level failures: the request never produced a response.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Request(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    /// 5xx responses.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_api_error() {
        let err = ProviderError::Api {
            status: 429,
            body: "slow down".into(),
        };
        assert_eq!(err.to_string(), "Provider API error (429): slow down");
        assert!(!err.is_server_error());
    }

    #[test]
    fn server_errors_are_flagged() {
        let err = ProviderError::Api {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_server_error());
        assert!(!err.is_transport());
    }

    #[test]
    fn storage_error_wraps() {
        let err: ProviderError = StorageError::InvalidKey("../etc".into()).into();
        assert_eq!(err.to_string(), "Upload failed: Invalid storage key '../etc'");
    }
}
