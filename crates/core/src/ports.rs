//! Ports the pipeline is written against.
//!
//! The worker loop and the submission service never touch the database or
//! the subject aggregates directly; they go through these traits so that
//! the Postgres adapters in `atelier-db` and in-memory test doubles are
//! interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::preview::{JobKind, NewPreviewJob, PreviewJob};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Job store
// ---------------------------------------------------------------------------

/// Errors from a [`JobStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("Preview job {0} not found")]
    NotFound(DbId),

    /// A stored row could not be mapped back onto the domain type.
    #[error("Corrupt preview job row: {0}")]
    Corrupt(String),

    #[error("Job store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<JobStoreError> for CoreError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(id) => CoreError::NotFound {
                entity: "PreviewJob",
                id,
            },
            other => CoreError::Internal(other.to_string()),
        }
    }
}

/// Durable record of preview job state.
///
/// Writes are unconditional: [`save`](JobStore::save) overwrites the
/// mutable columns of the row with the in-memory job, so the last writer
/// wins. Callers mutate jobs only through the [`PreviewJob`] transition
/// methods before saving.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new `Pending` job.
    async fn insert(&self, job: NewPreviewJob) -> Result<PreviewJob, JobStoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<PreviewJob>, JobStoreError>;

    /// Up to `limit` oldest `Pending` jobs of the given kinds, ordered by
    /// `created_at` then `id`.
    async fn fetch_pending(
        &self,
        kinds: &[JobKind],
        limit: i64,
    ) -> Result<Vec<PreviewJob>, JobStoreError>;

    /// `Processing` jobs of the given kinds last touched before `updated_before`.
    async fn find_stuck(
        &self,
        kinds: &[JobKind],
        updated_before: Timestamp,
    ) -> Result<Vec<PreviewJob>, JobStoreError>;

    /// Overwrite the mutable state of one job.
    async fn save(&self, job: &PreviewJob) -> Result<(), JobStoreError>;

    /// Overwrite several jobs as one unit of work.
    async fn save_all(&self, jobs: &[PreviewJob]) -> Result<(), JobStoreError>;

    /// Number of `Completed` jobs of `kind` owned by guest `guest_id`.
    async fn count_completed_for_guest(
        &self,
        guest_id: &str,
        kind: JobKind,
    ) -> Result<i64, JobStoreError>;
}

// ---------------------------------------------------------------------------
// Subject catalog
// ---------------------------------------------------------------------------

/// What kind of aggregate a subject is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// A jewelry configuration built in the configurator.
    Configuration,
    /// An analysis of an uploaded photo.
    Analysis,
}

impl SubjectKind {
    /// The subject kind a job of `kind` renders.
    pub fn for_job(kind: JobKind) -> Self {
        match kind {
            JobKind::SingleImage | JobKind::MultiFrame => Self::Configuration,
            JobKind::UpgradePreview => Self::Analysis,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Analysis => "analysis",
        }
    }

    pub fn parse(name: &str) -> Result<Self, CoreError> {
        match name {
            "configuration" => Ok(Self::Configuration),
            "analysis" => Ok(Self::Analysis),
            other => Err(CoreError::Internal(format!("Unknown subject kind '{other}'"))),
        }
    }
}

/// The minimal view of a configuration/analysis the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: DbId,
    pub kind: SubjectKind,
    /// `None` for subjects created anonymously.
    pub owner_user_id: Option<DbId>,
}

/// Access to the aggregates previews are rendered from.
#[async_trait]
pub trait SubjectCatalog: Send + Sync {
    async fn find_subject(&self, id: DbId) -> Result<Option<Subject>, CoreError>;

    /// Build the opaque semantic snapshot for a subject.
    async fn build_snapshot(&self, id: DbId) -> Result<serde_json::Value, CoreError>;
}

// ---------------------------------------------------------------------------
// Prompt builder
// ---------------------------------------------------------------------------

/// Turns a snapshot into provider-ready prompt text.
pub trait PromptBuilder: Send + Sync {
    fn build_prompt(&self, kind: JobKind, snapshot: &serde_json::Value) -> Result<String, CoreError>;
}
