//! Read access to the `design_subjects` projection.

use atelier_core::types::DbId;
use sqlx::PgPool;

use crate::models::subject::DesignSubjectRow;

/// Column list for `design_subjects` queries.
const COLUMNS: &str = "id, subject_kind, owner_user_id, semantic_snapshot";

pub struct DesignSubjectRepo;

impl DesignSubjectRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<DesignSubjectRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM design_subjects WHERE id = $1");
        sqlx::query_as::<_, DesignSubjectRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
