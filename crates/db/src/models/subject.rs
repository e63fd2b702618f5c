//! Row model for the `design_subjects` projection.

use atelier_core::error::CoreError;
use atelier_core::ports::{Subject, SubjectKind};
use atelier_core::types::DbId;
use sqlx::FromRow;

/// A row from the `design_subjects` table.
#[derive(Debug, Clone, FromRow)]
pub struct DesignSubjectRow {
    pub id: DbId,
    pub subject_kind: String,
    pub owner_user_id: Option<DbId>,
    pub semantic_snapshot: Option<serde_json::Value>,
}

impl TryFrom<&DesignSubjectRow> for Subject {
    type Error = CoreError;

    fn try_from(row: &DesignSubjectRow) -> Result<Self, Self::Error> {
        Ok(Subject {
            id: row.id,
            kind: SubjectKind::parse(&row.subject_kind)?,
            owner_user_id: row.owner_user_id,
        })
    }
}
