use axum::routing::{get, post};
use axum::Router;

use crate::handlers::preview_jobs;
use crate::state::AppState;

/// Routes mounted at `/preview-jobs`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(preview_jobs::submit_preview_job))
        .route("/{id}", get(preview_jobs::get_preview_job))
        .route("/{id}/retry", post(preview_jobs::retry_preview_job))
}
