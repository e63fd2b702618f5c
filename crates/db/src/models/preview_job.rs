//! Row model for the `preview_jobs` table.

use atelier_core::error::CoreError;
use atelier_core::preview::{JobKind, JobStatus, OwnerRef, PreviewJob, StatusId};
use atelier_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `preview_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct PreviewJobRow {
    pub id: DbId,
    pub owner_user_id: Option<DbId>,
    pub guest_client_id: Option<String>,
    pub subject_id: DbId,
    pub kind: String,
    pub status_id: StatusId,
    pub snapshot: Option<serde_json::Value>,
    pub prompt: Option<String>,
    pub frame_count: Option<i32>,
    pub result_primary_url: Option<String>,
    pub result_frame_urls: Option<Vec<String>>,
    pub error_message: Option<String>,
    pub retry_of_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<PreviewJobRow> for PreviewJob {
    type Error = CoreError;

    fn try_from(row: PreviewJobRow) -> Result<Self, Self::Error> {
        let frame_count = row
            .frame_count
            .map(|count| {
                u32::try_from(count).map_err(|_| {
                    CoreError::Internal(format!("Job {} has negative frame_count {count}", row.id))
                })
            })
            .transpose()?;

        Ok(PreviewJob {
            id: row.id,
            owner: OwnerRef::from_columns(row.owner_user_id, row.guest_client_id)?,
            subject_id: row.subject_id,
            kind: JobKind::parse(&row.kind)?,
            status: JobStatus::from_id(row.status_id)?,
            snapshot: row.snapshot,
            prompt: row.prompt,
            frame_count,
            result_primary_url: row.result_primary_url,
            result_frame_urls: row.result_frame_urls,
            error_message: row.error_message,
            retry_of_job_id: row.retry_of_job_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
