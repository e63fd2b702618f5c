pub mod health;
pub mod preview_jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /preview-jobs                 submit (POST)
/// /preview-jobs/{id}            status (GET)
/// /preview-jobs/{id}/retry      retry a failed job (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/preview-jobs", preview_jobs::router())
}
