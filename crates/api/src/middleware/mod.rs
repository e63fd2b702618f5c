//! Request extractors.
//!
//! - [`caller::Caller`] -- resolves the job owner from a Bearer token or a
//!   guest correlation header.

pub mod caller;
