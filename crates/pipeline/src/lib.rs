//! Preview job orchestration.
//!
//! - [`submission`]: validates and persists new jobs, enforces the guest
//!   quota, handles retries and status reads.
//! - [`worker`]: the polling loop that drives jobs through the state machine.
//! - [`reaper`]: force-fails jobs orphaned in `Processing`.
//! - [`resolve`]: turns a job's snapshot into provider prompt text.
//! - [`config`]: worker tuning loaded from the environment.

pub mod config;
pub mod reaper;
pub mod resolve;
pub mod submission;
pub mod worker;

pub use config::WorkerConfig;
pub use reaper::StuckJobReaper;
pub use resolve::PromptResolver;
pub use submission::{SubmissionService, SubmitRequest};
pub use worker::{PreviewWorker, TickSummary};
