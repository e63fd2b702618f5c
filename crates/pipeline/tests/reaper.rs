mod common;

use std::time::Duration;

use chrono::Utc;

use atelier_core::preview::{JobKind, JobStatus, OwnerRef};
use atelier_pipeline::StuckJobReaper;
use common::MemoryJobStore;

fn minutes_ago(m: i64) -> chrono::DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(m)
}

fn processing_since(store: &MemoryJobStore, kind: JobKind, minutes: i64) -> i64 {
    let id = store.seed(kind, OwnerRef::System, minutes_ago(minutes + 1));
    let mut job = store.get(id);
    job.mark_processing(minutes_ago(minutes)).unwrap();
    store.put(job);
    id
}

#[tokio::test]
async fn no_stuck_jobs_means_no_writes() {
    let store = MemoryJobStore::new();
    processing_since(&store, JobKind::SingleImage, 2);
    store.seed(JobKind::SingleImage, OwnerRef::System, minutes_ago(60));
    let reaper = StuckJobReaper::new(store.clone(), JobKind::PREVIEW, Duration::from_secs(900));

    assert_eq!(reaper.reap().await.unwrap(), 0);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn stuck_jobs_fail_in_one_batch() {
    let store = MemoryJobStore::new();
    let a = processing_since(&store, JobKind::SingleImage, 20);
    let b = processing_since(&store, JobKind::MultiFrame, 45);
    let recent = processing_since(&store, JobKind::SingleImage, 5);
    let reaper = StuckJobReaper::new(store.clone(), JobKind::PREVIEW, Duration::from_secs(900));

    assert_eq!(reaper.reap().await.unwrap(), 2);
    assert_eq!(store.writes(), 1);

    for id in [a, b] {
        let job = store.get(id);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("Timed out: job was still processing after 900s and was presumed abandoned")
        );
        assert!(job.updated_at > minutes_ago(1));
    }
    assert_eq!(store.get(recent).status, JobStatus::Processing);
}

#[tokio::test]
async fn other_kind_families_are_left_alone() {
    let store = MemoryJobStore::new();
    let upgrade = processing_since(&store, JobKind::UpgradePreview, 60);
    let reaper = StuckJobReaper::new(store.clone(), JobKind::PREVIEW, Duration::from_secs(900));

    assert_eq!(reaper.reap().await.unwrap(), 0);
    assert_eq!(store.get(upgrade).status, JobStatus::Processing);
}
