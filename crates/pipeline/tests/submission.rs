//! Submission, retry and status reads.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Utc;

use atelier_core::error::CoreError;
use atelier_core::ports::{JobStore, SubjectKind};
use atelier_core::preview::{JobKind, JobStatus, OwnerRef};
use atelier_pipeline::{SubmissionService, SubmitRequest};
use common::{ring_snapshot, MemoryJobStore, StubCatalog};

const CONFIG_SUBJECT: i64 = 10;
const ANALYSIS_SUBJECT: i64 = 20;
const ANON_SUBJECT: i64 = 30;

fn fixtures(guest_limit: i64) -> (Arc<MemoryJobStore>, Arc<StubCatalog>, SubmissionService) {
    let store = MemoryJobStore::new();
    let catalog = StubCatalog::new();
    catalog.add(CONFIG_SUBJECT, SubjectKind::Configuration, Some(1), ring_snapshot());
    catalog.add(ANALYSIS_SUBJECT, SubjectKind::Analysis, Some(1), ring_snapshot());
    catalog.add(ANON_SUBJECT, SubjectKind::Configuration, None, ring_snapshot());
    let service = SubmissionService::new(store.clone(), catalog.clone(), guest_limit);
    (store, catalog, service)
}

fn request(kind: JobKind, subject_id: i64) -> SubmitRequest {
    SubmitRequest {
        kind,
        subject_id,
        frame_count: None,
    }
}

/// Drive a job straight to `Completed` as the worker would.
async fn complete(store: &MemoryJobStore, id: i64) {
    let mut job = store.get(id);
    job.mark_processing(Utc::now()).unwrap();
    job.complete_single("https://x/img.png".into(), Utc::now()).unwrap();
    store.save(&job).await.unwrap();
}

async fn fail(store: &MemoryJobStore, id: i64) {
    let mut job = store.get(id);
    job.mark_processing(Utc::now()).unwrap();
    job.fail("provider exploded", Utc::now()).unwrap();
    store.save(&job).await.unwrap();
}

#[tokio::test]
async fn user_submission_creates_pending_job_with_snapshot() {
    let (store, _, service) = fixtures(3);

    let descriptor = service
        .submit(OwnerRef::User(1), request(JobKind::SingleImage, CONFIG_SUBJECT))
        .await
        .unwrap();

    assert_eq!(descriptor.status, JobStatus::Pending);
    assert_eq!(descriptor.kind, JobKind::SingleImage);
    assert!(descriptor.primary_url.is_none());
    let job = store.get(descriptor.id);
    assert_eq!(job.snapshot, Some(ring_snapshot()));
    assert_eq!(job.frame_count, None);
}

#[tokio::test]
async fn multi_frame_defaults_to_twelve_frames() {
    let (store, _, service) = fixtures(3);

    let descriptor = service
        .submit(OwnerRef::User(1), request(JobKind::MultiFrame, CONFIG_SUBJECT))
        .await
        .unwrap();

    assert_eq!(store.get(descriptor.id).frame_count, Some(12));
}

#[tokio::test]
async fn out_of_range_frame_count_is_rejected() {
    let (store, _, service) = fixtures(3);
    let mut req = request(JobKind::MultiFrame, CONFIG_SUBJECT);
    req.frame_count = Some(0);

    assert_matches!(
        service.submit(OwnerRef::User(1), req).await,
        Err(CoreError::Validation(_))
    );
    assert!(store.all().is_empty());
}

#[tokio::test]
async fn subject_must_exist_match_kind_and_belong_to_user() {
    let (store, _, service) = fixtures(3);

    assert_matches!(
        service.submit(OwnerRef::User(1), request(JobKind::SingleImage, 999)).await,
        Err(CoreError::Validation(msg)) if msg.contains("does not exist")
    );
    assert_matches!(
        service.submit(OwnerRef::User(1), request(JobKind::UpgradePreview, CONFIG_SUBJECT)).await,
        Err(CoreError::Validation(msg)) if msg.contains("analysis")
    );
    assert_matches!(
        service.submit(OwnerRef::User(2), request(JobKind::SingleImage, CONFIG_SUBJECT)).await,
        Err(CoreError::Validation(msg)) if msg.contains("does not belong")
    );
    assert!(store.all().is_empty());
}

#[tokio::test]
async fn guest_only_needs_subject_to_exist() {
    let (_, _, service) = fixtures(3);

    let descriptor = service
        .submit(OwnerRef::Guest("g-1".into()), request(JobKind::SingleImage, CONFIG_SUBJECT))
        .await
        .unwrap();
    assert_eq!(descriptor.status, JobStatus::Pending);

    assert_matches!(
        service.submit(OwnerRef::Guest(String::new()), request(JobKind::SingleImage, ANON_SUBJECT)).await,
        Err(CoreError::Validation(msg)) if msg.contains("guest id")
    );
}

#[tokio::test]
async fn guest_quota_rejects_after_limit_completed_jobs() {
    let (store, _, service) = fixtures(2);
    let guest = OwnerRef::Guest("g-7".into());

    for _ in 0..2 {
        let d = service
            .submit(guest.clone(), request(JobKind::SingleImage, ANON_SUBJECT))
            .await
            .unwrap();
        complete(&store, d.id).await;
    }

    assert_matches!(
        service.submit(guest.clone(), request(JobKind::SingleImage, ANON_SUBJECT)).await,
        Err(CoreError::QuotaExceeded { guest_id, limit: 2 }) if guest_id == "g-7"
    );

    // Other kinds and other guests have their own counters.
    assert!(service
        .submit(guest.clone(), request(JobKind::MultiFrame, ANON_SUBJECT))
        .await
        .is_ok());
    assert!(service
        .submit(OwnerRef::Guest("g-8".into()), request(JobKind::SingleImage, ANON_SUBJECT))
        .await
        .is_ok());
}

#[tokio::test]
async fn pending_jobs_do_not_count_toward_quota() {
    let (_, _, service) = fixtures(1);
    let guest = OwnerRef::Guest("g-2".into());

    for _ in 0..3 {
        service
            .submit(guest.clone(), request(JobKind::SingleImage, ANON_SUBJECT))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn non_positive_limit_never_rejects() {
    for limit in [0, -1] {
        let (store, _, service) = fixtures(limit);
        let guest = OwnerRef::Guest("g-3".into());
        for _ in 0..5 {
            let d = service
                .submit(guest.clone(), request(JobKind::SingleImage, ANON_SUBJECT))
                .await
                .unwrap();
            complete(&store, d.id).await;
        }
    }
}

#[tokio::test]
async fn snapshot_failure_still_creates_job() {
    let (store, catalog, service) = fixtures(3);
    catalog.snapshot_fails.store(true, Ordering::SeqCst);

    let descriptor = service
        .submit(OwnerRef::User(1), request(JobKind::SingleImage, CONFIG_SUBJECT))
        .await
        .unwrap();

    assert!(store.get(descriptor.id).snapshot.is_none());
}

#[tokio::test]
async fn status_is_owner_only() {
    let (_, _, service) = fixtures(3);
    let owner = OwnerRef::User(1);
    let d = service
        .submit(owner.clone(), request(JobKind::SingleImage, CONFIG_SUBJECT))
        .await
        .unwrap();

    assert_eq!(service.status(&owner, d.id).await.unwrap(), d);
    assert_matches!(
        service.status(&OwnerRef::User(2), d.id).await,
        Err(CoreError::NotFound { .. })
    );
    assert_matches!(
        service.status(&OwnerRef::Guest("g".into()), d.id).await,
        Err(CoreError::NotFound { .. })
    );
}

#[tokio::test]
async fn retry_copies_failed_job() {
    let (store, _, service) = fixtures(3);
    let owner = OwnerRef::User(1);
    let mut req = request(JobKind::MultiFrame, CONFIG_SUBJECT);
    req.frame_count = Some(8);
    let original = service.submit(owner.clone(), req).await.unwrap();
    fail(&store, original.id).await;

    let retried = service.retry(owner.clone(), original.id).await.unwrap();

    assert_ne!(retried.id, original.id);
    assert_eq!(retried.status, JobStatus::Pending);
    let job = store.get(retried.id);
    assert_eq!(job.retry_of_job_id, Some(original.id));
    assert_eq!(job.frame_count, Some(8));
    assert_eq!(job.snapshot, store.get(original.id).snapshot);
    assert_eq!(store.get(original.id).status, JobStatus::Failed);
}

#[tokio::test]
async fn retry_requires_failed_status_and_ownership() {
    let (store, _, service) = fixtures(3);
    let owner = OwnerRef::User(1);
    let d = service
        .submit(owner.clone(), request(JobKind::SingleImage, CONFIG_SUBJECT))
        .await
        .unwrap();

    assert_matches!(service.retry(owner.clone(), d.id).await, Err(CoreError::Conflict(_)));

    fail(&store, d.id).await;
    assert_matches!(
        service.retry(OwnerRef::User(2), d.id).await,
        Err(CoreError::NotFound { .. })
    );
}

#[tokio::test]
async fn guest_retry_respects_quota() {
    let (store, _, service) = fixtures(1);
    let guest = OwnerRef::Guest("g-9".into());

    let done = service
        .submit(guest.clone(), request(JobKind::SingleImage, ANON_SUBJECT))
        .await
        .unwrap();
    complete(&store, done.id).await;

    // Create a failed job directly; submission would already be over quota.
    let failed = store.seed(JobKind::SingleImage, guest.clone(), Utc::now());
    fail(&store, failed).await;

    assert_matches!(
        service.retry(guest, failed).await,
        Err(CoreError::QuotaExceeded { limit: 1, .. })
    );
}
