//! Preview job entity, kinds, statuses, and the status state machine.
//!
//! A job moves `Pending -> Processing -> {Completed, Failed}` and never
//! back. Every transition goes through a method on [`PreviewJob`] which
//! rejects an illegal source status and leaves the job untouched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Frame count used for multi-frame jobs submitted without one.
pub const DEFAULT_FRAME_COUNT: u32 = 12;

/// Upper bound on frames per multi-frame job.
pub const MAX_FRAME_COUNT: u32 = 36;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// The job variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    SingleImage,
    MultiFrame,
    UpgradePreview,
}

impl JobKind {
    /// Kinds handled by the preview worker loop.
    pub const PREVIEW: &'static [JobKind] = &[JobKind::SingleImage, JobKind::MultiFrame];

    /// Kinds handled by the upgrade-preview worker loop.
    pub const UPGRADE: &'static [JobKind] = &[JobKind::UpgradePreview];

    /// Database `kind` column value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleImage => "single_image",
            Self::MultiFrame => "multi_frame",
            Self::UpgradePreview => "upgrade_preview",
        }
    }

    /// Parse from the database / wire name.
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        match name {
            "single_image" => Ok(Self::SingleImage),
            "multi_frame" => Ok(Self::MultiFrame),
            "upgrade_preview" => Ok(Self::UpgradePreview),
            other => Err(CoreError::Validation(format!(
                "Unknown job kind '{other}'. Must be one of: single_image, multi_frame, upgrade_preview"
            ))),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Status ID type matching SMALLINT in the `job_statuses` lookup table.
pub type StatusId = i16;

/// Preview job execution status. Discriminants match the seed data.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending = 1,
    Processing = 2,
    Completed = 3,
    Failed = 4,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Map a database status ID back to the enum.
    pub fn from_id(id: StatusId) -> Result<Self, CoreError> {
        match id {
            1 => Ok(Self::Pending),
            2 => Ok(Self::Processing),
            3 => Ok(Self::Completed),
            4 => Ok(Self::Failed),
            other => Err(CoreError::Internal(format!("Unknown job status id {other}"))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Owner
// ---------------------------------------------------------------------------

/// Who a job belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum OwnerRef {
    /// An authenticated user.
    User(DbId),
    /// An anonymous caller identified by a client-generated correlation id.
    Guest(String),
    /// Created by the platform itself; no caller owns it.
    System,
}

impl OwnerRef {
    /// Rebuild the owner from its two nullable columns.
    pub fn from_columns(user_id: Option<DbId>, guest_id: Option<String>) -> Result<Self, CoreError> {
        match (user_id, guest_id) {
            (Some(user_id), None) => Ok(Self::User(user_id)),
            (None, Some(guest_id)) => Ok(Self::Guest(guest_id)),
            (None, None) => Ok(Self::System),
            (Some(user_id), Some(guest_id)) => Err(CoreError::Internal(format!(
                "Job owned by both user {user_id} and guest '{guest_id}'"
            ))),
        }
    }

    pub fn user_id(&self) -> Option<DbId> {
        match self {
            Self::User(id) => Some(*id),
            _ => None,
        }
    }

    pub fn guest_id(&self) -> Option<&str> {
        match self {
            Self::Guest(id) => Some(id),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame count
// ---------------------------------------------------------------------------

/// Resolve the frame count stored on a new job of `kind`.
///
/// Multi-frame jobs get `requested` (or [`DEFAULT_FRAME_COUNT`]) within
/// `1..=MAX_FRAME_COUNT`; every other kind must not carry one.
pub fn resolve_frame_count(kind: JobKind, requested: Option<u32>) -> Result<Option<u32>, CoreError> {
    match (kind, requested) {
        (JobKind::MultiFrame, None) => Ok(Some(DEFAULT_FRAME_COUNT)),
        (JobKind::MultiFrame, Some(count)) if (1..=MAX_FRAME_COUNT).contains(&count) => {
            Ok(Some(count))
        }
        (JobKind::MultiFrame, Some(count)) => Err(CoreError::Validation(format!(
            "frame_count must be between 1 and {MAX_FRAME_COUNT}, got {count}"
        ))),
        (_, None) => Ok(None),
        (other, Some(_)) => Err(CoreError::Validation(format!(
            "frame_count only applies to multi_frame jobs, not {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Input for creating a new pending job.
#[derive(Debug, Clone)]
pub struct NewPreviewJob {
    pub owner: OwnerRef,
    pub subject_id: DbId,
    pub kind: JobKind,
    pub snapshot: Option<serde_json::Value>,
    pub frame_count: Option<u32>,
    pub retry_of_job_id: Option<DbId>,
}

/// A persisted request for generated preview imagery.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewJob {
    pub id: DbId,
    pub owner: OwnerRef,
    pub subject_id: DbId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub snapshot: Option<serde_json::Value>,
    pub prompt: Option<String>,
    pub frame_count: Option<u32>,
    pub result_primary_url: Option<String>,
    pub result_frame_urls: Option<Vec<String>>,
    pub error_message: Option<String>,
    pub retry_of_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PreviewJob {
    /// Number of frames a multi-frame job must produce.
    pub fn requested_frames(&self) -> u32 {
        self.frame_count.unwrap_or(DEFAULT_FRAME_COUNT)
    }

    /// `Pending -> Processing`.
    pub fn mark_processing(&mut self, now: Timestamp) -> Result<(), CoreError> {
        self.expect_status(JobStatus::Pending, JobStatus::Processing)?;
        self.status = JobStatus::Processing;
        self.updated_at = now;
        Ok(())
    }

    /// `Processing -> Completed` for kinds that produce one image.
    pub fn complete_single(&mut self, url: String, now: Timestamp) -> Result<(), CoreError> {
        self.expect_status(JobStatus::Processing, JobStatus::Completed)?;
        if self.kind == JobKind::MultiFrame {
            return Err(CoreError::Conflict(format!(
                "Job {} is multi_frame and must complete with a frame set",
                self.id
            )));
        }
        self.status = JobStatus::Completed;
        self.result_primary_url = Some(url);
        self.result_frame_urls = None;
        self.error_message = None;
        self.updated_at = now;
        Ok(())
    }

    /// `Processing -> Completed` for multi-frame jobs.
    ///
    /// `urls` must hold exactly [`requested_frames`](Self::requested_frames)
    /// entries; the first becomes the primary URL.
    pub fn complete_frames(&mut self, urls: Vec<String>, now: Timestamp) -> Result<(), CoreError> {
        self.expect_status(JobStatus::Processing, JobStatus::Completed)?;
        if self.kind != JobKind::MultiFrame {
            return Err(CoreError::Conflict(format!(
                "Job {} is {} and cannot complete with a frame set",
                self.id, self.kind
            )));
        }
        let expected = self.requested_frames() as usize;
        let Some(primary) = urls.first().cloned().filter(|_| urls.len() == expected) else {
            return Err(CoreError::Validation(format!(
                "Job {} expected {expected} frames, provider returned {}",
                self.id,
                urls.len()
            )));
        };
        self.status = JobStatus::Completed;
        self.result_primary_url = Some(primary);
        self.result_frame_urls = Some(urls);
        self.error_message = None;
        self.updated_at = now;
        Ok(())
    }

    /// `Processing -> Failed`.
    pub fn fail(&mut self, message: impl Into<String>, now: Timestamp) -> Result<(), CoreError> {
        self.expect_status(JobStatus::Processing, JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        self.result_primary_url = None;
        self.result_frame_urls = None;
        self.updated_at = now;
        Ok(())
    }

    /// The read model exposed to status-polling callers.
    pub fn descriptor(&self) -> JobDescriptor {
        JobDescriptor {
            id: self.id,
            kind: self.kind,
            status: self.status,
            primary_url: self.result_primary_url.clone(),
            frame_urls: self.result_frame_urls.clone(),
            error_message: self.error_message.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn expect_status(&self, from: JobStatus, to: JobStatus) -> Result<(), CoreError> {
        if self.status == from {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Job {} cannot move from {} to {to}",
                self.id, self.status
            )))
        }
    }
}

/// Job descriptor returned by submission and status polling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDescriptor {
    pub id: DbId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub primary_url: Option<String>,
    pub frame_urls: Option<Vec<String>>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
