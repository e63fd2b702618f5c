//! Third-party integrations for preview generation.
//!
//! - [`storage`]: object storage uploaders (S3, local filesystem).
//! - [`providers`]: the [`ImageProvider`](providers::ImageProvider)
//!   capability plus placeholder, synchronous and poll-based backends.
//! - [`vision`]: structured analysis of uploaded photos.
//! - [`retry`]: per-provider retry policies.
//! - [`config`]: environment-driven selection of all of the above.

pub mod config;
pub mod error;
pub mod providers;
pub mod retry;
pub mod storage;
pub mod vision;
