//! Handlers for the `/preview-jobs` resource.
//!
//! Every endpoint acts on behalf of a [`Caller`]. Jobs owned by someone
//! else read as not found.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use atelier_core::preview::JobKind;
use atelier_core::types::DbId;
use atelier_pipeline::SubmitRequest;

use crate::error::AppResult;
use crate::middleware::caller::Caller;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /preview-jobs`.
#[derive(Debug, Deserialize)]
pub struct SubmitPreviewJob {
    /// `single_image`, `multi_frame` or `upgrade_preview`.
    pub kind: String,
    pub subject_id: DbId,
    pub frame_count: Option<u32>,
}

/// POST /api/v1/preview-jobs
///
/// Validate and enqueue a job. Returns 201 with the pending descriptor.
pub async fn submit_preview_job(
    Caller(owner): Caller,
    State(state): State<AppState>,
    Json(input): Json<SubmitPreviewJob>,
) -> AppResult<impl IntoResponse> {
    let request = SubmitRequest {
        kind: JobKind::parse(&input.kind)?,
        subject_id: input.subject_id,
        frame_count: input.frame_count,
    };
    let descriptor = state.submissions.submit(owner, request).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: descriptor })))
}

/// GET /api/v1/preview-jobs/{id}
pub async fn get_preview_job(
    Caller(owner): Caller,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let descriptor = state.submissions.status(&owner, job_id).await?;
    Ok(Json(DataResponse { data: descriptor }))
}

/// POST /api/v1/preview-jobs/{id}/retry
///
/// Enqueue a fresh copy of a failed job. Returns 201 with the new descriptor.
pub async fn retry_preview_job(
    Caller(owner): Caller,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let descriptor = state.submissions.retry(owner, job_id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: descriptor })))
}
