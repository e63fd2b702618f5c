use std::sync::Arc;

use atelier_db::{PgJobStore, PgSubjectCatalog};
use atelier_pipeline::SubmissionService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc` or is a pool handle.
#[derive(Clone)]
pub struct AppState {
    pub pool: atelier_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub submissions: Arc<SubmissionService>,
}

impl AppState {
    /// Wire the submission service to the Postgres-backed ports.
    pub fn new(pool: atelier_db::DbPool, config: ServerConfig) -> Self {
        let submissions = SubmissionService::new(
            Arc::new(PgJobStore::new(pool.clone())),
            Arc::new(PgSubjectCatalog::new(pool.clone())),
            config.guest_preview_limit,
        );
        Self {
            pool,
            config: Arc::new(config),
            submissions: Arc::new(submissions),
        }
    }
}
