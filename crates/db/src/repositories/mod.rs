//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` (or any Postgres executor) as the first argument.

pub mod design_subject_repo;
pub mod preview_job_repo;

pub use design_subject_repo::DesignSubjectRepo;
pub use preview_job_repo::PreviewJobRepo;
