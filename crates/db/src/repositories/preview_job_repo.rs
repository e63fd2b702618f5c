//! Repository for the `preview_jobs` table.
//!
//! Uses `JobStatus` ids from `atelier_core::preview` for every status
//! literal. Updates are unconditional: no version column, no row lock.

use atelier_core::preview::{JobKind, JobStatus, NewPreviewJob, PreviewJob};
use atelier_core::types::{DbId, Timestamp};
use sqlx::{PgExecutor, PgPool};

use crate::models::preview_job::PreviewJobRow;

/// Column list for `preview_jobs` queries.
const COLUMNS: &str = "\
    id, owner_user_id, guest_client_id, subject_id, kind, status_id, \
    snapshot, prompt, frame_count, result_primary_url, result_frame_urls, \
    error_message, retry_of_job_id, created_at, updated_at";

/// Database names for a slice of kinds, bound as `TEXT[]`.
fn kind_names(kinds: &[JobKind]) -> Vec<String> {
    kinds.iter().map(|k| k.as_str().to_string()).collect()
}

/// Provides persistence operations for preview jobs.
pub struct PreviewJobRepo;

impl PreviewJobRepo {
    /// Insert a new pending job and return the stored row.
    pub async fn insert(pool: &PgPool, input: &NewPreviewJob) -> Result<PreviewJobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO preview_jobs \
                 (owner_user_id, guest_client_id, subject_id, kind, status_id, \
                  snapshot, frame_count, retry_of_job_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PreviewJobRow>(&query)
            .bind(input.owner.user_id())
            .bind(input.owner.guest_id())
            .bind(input.subject_id)
            .bind(input.kind.as_str())
            .bind(JobStatus::Pending.id())
            .bind(&input.snapshot)
            .bind(input.frame_count.map(|c| c as i32))
            .bind(input.retry_of_job_id)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PreviewJobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM preview_jobs WHERE id = $1");
        sqlx::query_as::<_, PreviewJobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Oldest pending jobs of the given kinds, FIFO with id as tiebreaker.
    ///
    /// This is a plain read: no `FOR UPDATE SKIP LOCKED`. The pipeline runs
    /// one worker per kind family and the caller marks each job processing
    /// with a separate unconditional update.
    pub async fn fetch_pending(
        pool: &PgPool,
        kinds: &[JobKind],
        limit: i64,
    ) -> Result<Vec<PreviewJobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM preview_jobs \
             WHERE status_id = $1 AND kind = ANY($2) \
             ORDER BY created_at ASC, id ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, PreviewJobRow>(&query)
            .bind(JobStatus::Pending.id())
            .bind(kind_names(kinds))
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Processing jobs of the given kinds whose `updated_at` is before `cutoff`.
    pub async fn find_stuck(
        pool: &PgPool,
        kinds: &[JobKind],
        cutoff: Timestamp,
    ) -> Result<Vec<PreviewJobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM preview_jobs \
             WHERE status_id = $1 AND kind = ANY($2) AND updated_at < $3 \
             ORDER BY updated_at ASC, id ASC"
        );
        sqlx::query_as::<_, PreviewJobRow>(&query)
            .bind(JobStatus::Processing.id())
            .bind(kind_names(kinds))
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Overwrite every mutable column with the in-memory job state.
    ///
    /// Returns the number of rows affected (0 when the job no longer exists).
    pub async fn update<'e, E>(executor: E, job: &PreviewJob) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE preview_jobs \
             SET status_id = $2, snapshot = $3, prompt = $4, \
                 result_primary_url = $5, result_frame_urls = $6, \
                 error_message = $7, updated_at = $8 \
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(job.status.id())
        .bind(&job.snapshot)
        .bind(&job.prompt)
        .bind(&job.result_primary_url)
        .bind(&job.result_frame_urls)
        .bind(&job.error_message)
        .bind(job.updated_at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Count completed jobs of `kind` owned by a guest.
    pub async fn count_completed_for_guest(
        pool: &PgPool,
        guest_id: &str,
        kind: JobKind,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM preview_jobs \
             WHERE guest_client_id = $1 AND kind = $2 AND status_id = $3",
        )
        .bind(guest_id)
        .bind(kind.as_str())
        .bind(JobStatus::Completed.id())
        .fetch_one(pool)
        .await
    }
}
