//! Row structs for the tables this crate reads and writes.
//!
//! Each row struct derives `FromRow` and converts into the matching domain
//! type from `atelier_core`.

pub mod preview_job;
pub mod subject;
