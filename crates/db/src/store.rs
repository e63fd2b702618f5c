//! Postgres adapters for the pipeline ports.

use async_trait::async_trait;
use atelier_core::error::CoreError;
use atelier_core::ports::{JobStore, JobStoreError, Subject, SubjectCatalog};
use atelier_core::preview::{JobKind, NewPreviewJob, PreviewJob};
use atelier_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::preview_job::PreviewJobRow;
use crate::repositories::{DesignSubjectRepo, PreviewJobRepo};

fn backend(err: sqlx::Error) -> JobStoreError {
    JobStoreError::Backend(Box::new(err))
}

fn to_job(row: PreviewJobRow) -> Result<PreviewJob, JobStoreError> {
    PreviewJob::try_from(row).map_err(|e| JobStoreError::Corrupt(e.to_string()))
}

fn to_jobs(rows: Vec<PreviewJobRow>) -> Result<Vec<PreviewJob>, JobStoreError> {
    rows.into_iter().map(to_job).collect()
}

/// [`JobStore`] backed by the `preview_jobs` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: NewPreviewJob) -> Result<PreviewJob, JobStoreError> {
        let row = PreviewJobRepo::insert(&self.pool, &job).await.map_err(backend)?;
        to_job(row)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<PreviewJob>, JobStoreError> {
        PreviewJobRepo::find_by_id(&self.pool, id)
            .await
            .map_err(backend)?
            .map(to_job)
            .transpose()
    }

    async fn fetch_pending(
        &self,
        kinds: &[JobKind],
        limit: i64,
    ) -> Result<Vec<PreviewJob>, JobStoreError> {
        let rows = PreviewJobRepo::fetch_pending(&self.pool, kinds, limit)
            .await
            .map_err(backend)?;
        to_jobs(rows)
    }

    async fn find_stuck(
        &self,
        kinds: &[JobKind],
        updated_before: Timestamp,
    ) -> Result<Vec<PreviewJob>, JobStoreError> {
        let rows = PreviewJobRepo::find_stuck(&self.pool, kinds, updated_before)
            .await
            .map_err(backend)?;
        to_jobs(rows)
    }

    async fn save(&self, job: &PreviewJob) -> Result<(), JobStoreError> {
        let affected = PreviewJobRepo::update(&self.pool, job)
            .await
            .map_err(backend)?;
        if affected == 0 {
            return Err(JobStoreError::NotFound(job.id));
        }
        Ok(())
    }

    async fn save_all(&self, jobs: &[PreviewJob]) -> Result<(), JobStoreError> {
        // Rolls back on drop if any update fails before commit.
        let mut tx = self.pool.begin().await.map_err(backend)?;
        for job in jobs {
            let affected = PreviewJobRepo::update(&mut *tx, job)
                .await
                .map_err(backend)?;
            if affected == 0 {
                return Err(JobStoreError::NotFound(job.id));
            }
        }
        tx.commit().await.map_err(backend)
    }

    async fn count_completed_for_guest(
        &self,
        guest_id: &str,
        kind: JobKind,
    ) -> Result<i64, JobStoreError> {
        PreviewJobRepo::count_completed_for_guest(&self.pool, guest_id, kind)
            .await
            .map_err(backend)
    }
}

/// [`SubjectCatalog`] reading the `design_subjects` projection.
///
/// Snapshots are materialized by the services that own configurations and
/// analyses; a subject without one cannot be snapshotted here.
#[derive(Clone)]
pub struct PgSubjectCatalog {
    pool: PgPool,
}

impl PgSubjectCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubjectCatalog for PgSubjectCatalog {
    async fn find_subject(&self, id: DbId) -> Result<Option<Subject>, CoreError> {
        let row = DesignSubjectRepo::find_by_id(&self.pool, id)
            .await
            .map_err(|e| CoreError::Internal(format!("Subject lookup failed: {e}")))?;
        row.as_ref().map(Subject::try_from).transpose()
    }

    async fn build_snapshot(&self, id: DbId) -> Result<serde_json::Value, CoreError> {
        let row = DesignSubjectRepo::find_by_id(&self.pool, id)
            .await
            .map_err(|e| CoreError::Internal(format!("Subject lookup failed: {e}")))?
            .ok_or(CoreError::NotFound {
                entity: "DesignSubject",
                id,
            })?;

        row.semantic_snapshot.ok_or_else(|| {
            tracing::debug!(subject_id = id, "Subject has no materialized snapshot");
            CoreError::Validation(format!("Subject {id} has no semantic snapshot"))
        })
    }
}
