//! Job submission, retry and status reads.
//!
//! Submission validates synchronously and never creates a job on failure:
//!
//! - the subject exists, renders for this kind, and belongs to the caller
//!   (guests only need it to exist);
//! - guests carry a non-empty correlation id and are under their quota;
//! - the frame count is in range for multi-frame jobs.
//!
//! The snapshot is built best-effort; a failure is logged and the job is
//! created without one.

use std::sync::Arc;

use atelier_core::error::CoreError;
use atelier_core::ports::{JobStore, SubjectCatalog, SubjectKind};
use atelier_core::preview::{
    resolve_frame_count, JobDescriptor, JobKind, JobStatus, NewPreviewJob, OwnerRef, PreviewJob,
};
use atelier_core::quota::check_guest_quota;
use atelier_core::types::DbId;

/// What a caller asks to render.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub kind: JobKind,
    pub subject_id: DbId,
    /// Only meaningful for [`JobKind::MultiFrame`].
    pub frame_count: Option<u32>,
}

/// Creates jobs and serves their descriptors.
pub struct SubmissionService {
    store: Arc<dyn JobStore>,
    catalog: Arc<dyn SubjectCatalog>,
    guest_limit: i64,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn JobStore>, catalog: Arc<dyn SubjectCatalog>, guest_limit: i64) -> Self {
        Self {
            store,
            catalog,
            guest_limit,
        }
    }

    /// Validate and persist a new `Pending` job.
    pub async fn submit(
        &self,
        owner: OwnerRef,
        request: SubmitRequest,
    ) -> Result<JobDescriptor, CoreError> {
        validate_owner(&owner)?;
        let frame_count = resolve_frame_count(request.kind, request.frame_count)?;
        self.check_subject(&owner, request.kind, request.subject_id).await?;
        self.check_quota(&owner, request.kind).await?;

        let snapshot = match self.catalog.build_snapshot(request.subject_id).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(
                    subject_id = request.subject_id,
                    error = %e,
                    "Snapshot build failed, job will rebuild it at processing time",
                );
                None
            }
        };

        let job = self
            .store
            .insert(NewPreviewJob {
                owner,
                subject_id: request.subject_id,
                kind: request.kind,
                snapshot,
                frame_count,
                retry_of_job_id: None,
            })
            .await?;

        tracing::info!(job_id = job.id, kind = %job.kind, subject_id = job.subject_id, "Preview job submitted");
        Ok(job.descriptor())
    }

    /// Create a new `Pending` job from a `Failed` one owned by the caller.
    pub async fn retry(&self, owner: OwnerRef, job_id: DbId) -> Result<JobDescriptor, CoreError> {
        validate_owner(&owner)?;
        let original = self.find_owned(&owner, job_id).await?;
        if original.status != JobStatus::Failed {
            return Err(CoreError::Conflict(format!(
                "Job {job_id} is {} and can only be retried once it has failed",
                original.status
            )));
        }
        self.check_quota(&owner, original.kind).await?;

        let job = self
            .store
            .insert(NewPreviewJob {
                owner,
                subject_id: original.subject_id,
                kind: original.kind,
                snapshot: original.snapshot.clone(),
                frame_count: original.frame_count,
                retry_of_job_id: Some(original.id),
            })
            .await?;

        tracing::info!(job_id = job.id, retry_of = original.id, "Preview job retried");
        Ok(job.descriptor())
    }

    /// Descriptor of a job owned by the caller.
    ///
    /// Jobs owned by someone else are reported as not found.
    pub async fn status(&self, owner: &OwnerRef, job_id: DbId) -> Result<JobDescriptor, CoreError> {
        Ok(self.find_owned(owner, job_id).await?.descriptor())
    }

    async fn find_owned(&self, owner: &OwnerRef, job_id: DbId) -> Result<PreviewJob, CoreError> {
        let not_found = CoreError::NotFound {
            entity: "PreviewJob",
            id: job_id,
        };
        match self.store.find_by_id(job_id).await? {
            Some(job) if &job.owner == owner => Ok(job),
            _ => Err(not_found),
        }
    }

    async fn check_subject(
        &self,
        owner: &OwnerRef,
        kind: JobKind,
        subject_id: DbId,
    ) -> Result<(), CoreError> {
        let subject = self
            .catalog
            .find_subject(subject_id)
            .await?
            .ok_or_else(|| CoreError::Validation(format!("Subject {subject_id} does not exist")))?;

        let expected = SubjectKind::for_job(kind);
        if subject.kind != expected {
            return Err(CoreError::Validation(format!(
                "A {kind} job renders a {} subject, but subject {subject_id} is a {}",
                expected.as_str(),
                subject.kind.as_str()
            )));
        }

        if let OwnerRef::User(user_id) = owner {
            if subject.owner_user_id != Some(*user_id) {
                return Err(CoreError::Validation(format!(
                    "Subject {subject_id} does not belong to the caller"
                )));
            }
        }
        Ok(())
    }

    async fn check_quota(&self, owner: &OwnerRef, kind: JobKind) -> Result<(), CoreError> {
        let OwnerRef::Guest(guest_id) = owner else {
            return Ok(());
        };
        if self.guest_limit <= 0 {
            return Ok(());
        }
        let completed = self.store.count_completed_for_guest(guest_id, kind).await?;
        check_guest_quota(guest_id, self.guest_limit, completed).inspect_err(|_| {
            tracing::info!(guest_id = %guest_id, kind = %kind, completed, "Guest preview limit reached");
        })
    }
}

fn validate_owner(owner: &OwnerRef) -> Result<(), CoreError> {
    match owner {
        OwnerRef::Guest(guest_id) if guest_id.trim().is_empty() => {
            Err(CoreError::Validation("A guest id is required".into()))
        }
        _ => Ok(()),
    }
}
