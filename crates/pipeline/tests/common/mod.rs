#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use atelier_cloud::error::ProviderError;
use atelier_cloud::providers::ImageProvider;
use atelier_cloud::vision::{AnalysisOutcome, DesignAnalyzer, ImageRef};
use atelier_core::error::CoreError;
use atelier_core::ports::{JobStore, JobStoreError, Subject, SubjectCatalog, SubjectKind};
use atelier_core::preview::{JobKind, JobStatus, NewPreviewJob, OwnerRef, PreviewJob};
use atelier_core::prompt::TemplatePromptBuilder;
use atelier_core::types::{DbId, Timestamp};
use atelier_pipeline::{PreviewWorker, PromptResolver, WorkerConfig};

// ---------------------------------------------------------------------------
// Job store
// ---------------------------------------------------------------------------

/// In-memory [`JobStore`] that counts writes and can be told to fail saves.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<PreviewJob>>,
    pub writes: AtomicUsize,
    save_limit: Mutex<Option<usize>>,
}

impl MemoryJobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a job directly, bypassing submission.
    pub fn seed(&self, kind: JobKind, owner: OwnerRef, created_at: Timestamp) -> DbId {
        let mut jobs = self.jobs.lock().unwrap();
        let id = jobs.len() as DbId + 1;
        jobs.push(PreviewJob {
            id,
            owner,
            subject_id: 1,
            kind,
            status: JobStatus::Pending,
            snapshot: Some(ring_snapshot()),
            prompt: None,
            frame_count: (kind == JobKind::MultiFrame).then_some(12),
            result_primary_url: None,
            result_frame_urls: None,
            error_message: None,
            retry_of_job_id: None,
            created_at,
            updated_at: created_at,
        });
        id
    }

    pub fn get(&self, id: DbId) -> PreviewJob {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .expect("job exists")
    }

    /// Overwrite a job in place without counting a write.
    pub fn put(&self, job: PreviewJob) {
        let mut jobs = self.jobs.lock().unwrap();
        let slot = jobs.iter_mut().find(|j| j.id == job.id).expect("job exists");
        *slot = job;
    }

    pub fn all(&self) -> Vec<PreviewJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every save after the next `n` fail.
    pub fn fail_saves_after(&self, n: usize) {
        *self.save_limit.lock().unwrap() = Some(self.writes() + n);
    }

    fn record_write(&self) -> Result<(), JobStoreError> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst);
        match *self.save_limit.lock().unwrap() {
            Some(limit) if n >= limit => Err(JobStoreError::Backend("database unavailable".into())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: NewPreviewJob) -> Result<PreviewJob, JobStoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        let now = Utc::now();
        let stored = PreviewJob {
            id: jobs.len() as DbId + 1,
            owner: job.owner,
            subject_id: job.subject_id,
            kind: job.kind,
            status: JobStatus::Pending,
            snapshot: job.snapshot,
            prompt: None,
            frame_count: job.frame_count,
            result_primary_url: None,
            result_frame_urls: None,
            error_message: None,
            retry_of_job_id: job.retry_of_job_id,
            created_at: now,
            updated_at: now,
        };
        jobs.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<PreviewJob>, JobStoreError> {
        Ok(self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned())
    }

    async fn fetch_pending(
        &self,
        kinds: &[JobKind],
        limit: i64,
    ) -> Result<Vec<PreviewJob>, JobStoreError> {
        let mut pending: Vec<PreviewJob> = self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.status == JobStatus::Pending && kinds.contains(&j.kind))
            .cloned()
            .collect();
        pending.sort_by_key(|j| (j.created_at, j.id));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn find_stuck(
        &self,
        kinds: &[JobKind],
        updated_before: Timestamp,
    ) -> Result<Vec<PreviewJob>, JobStoreError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| {
                j.status == JobStatus::Processing
                    && kinds.contains(&j.kind)
                    && j.updated_at < updated_before
            })
            .cloned()
            .collect())
    }

    async fn save(&self, job: &PreviewJob) -> Result<(), JobStoreError> {
        self.record_write()?;
        let mut jobs = self.jobs.lock().unwrap();
        let slot = jobs
            .iter_mut()
            .find(|j| j.id == job.id)
            .ok_or(JobStoreError::NotFound(job.id))?;
        *slot = job.clone();
        Ok(())
    }

    async fn save_all(&self, batch: &[PreviewJob]) -> Result<(), JobStoreError> {
        self.record_write()?;
        let mut jobs = self.jobs.lock().unwrap();
        for job in batch {
            if let Some(slot) = jobs.iter_mut().find(|j| j.id == job.id) {
                *slot = job.clone();
            }
        }
        Ok(())
    }

    async fn count_completed_for_guest(
        &self,
        guest_id: &str,
        kind: JobKind,
    ) -> Result<i64, JobStoreError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| {
                j.owner.guest_id() == Some(guest_id)
                    && j.kind == kind
                    && j.status == JobStatus::Completed
            })
            .count() as i64)
    }
}

// ---------------------------------------------------------------------------
// Subject catalog
// ---------------------------------------------------------------------------

pub fn ring_snapshot() -> serde_json::Value {
    json!({
        "category": "ring",
        "shape": "solitaire",
        "material": "platinum",
        "stones": [{ "kind": "diamond", "shape": "round", "carat": 1.0 }],
    })
}

/// Catalog holding fixed subjects, with a toggle to break snapshot builds.
#[derive(Default)]
pub struct StubCatalog {
    pub subjects: Mutex<Vec<(Subject, serde_json::Value)>>,
    pub snapshot_fails: AtomicBool,
    pub snapshot_builds: AtomicUsize,
}

impl StubCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, id: DbId, kind: SubjectKind, owner_user_id: Option<DbId>, snapshot: serde_json::Value) {
        self.subjects.lock().unwrap().push((
            Subject {
                id,
                kind,
                owner_user_id,
            },
            snapshot,
        ));
    }
}

#[async_trait]
impl SubjectCatalog for StubCatalog {
    async fn find_subject(&self, id: DbId) -> Result<Option<Subject>, CoreError> {
        Ok(self
            .subjects
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| s.id == id)
            .map(|(s, _)| s.clone()))
    }

    async fn build_snapshot(&self, id: DbId) -> Result<serde_json::Value, CoreError> {
        self.snapshot_builds.fetch_add(1, Ordering::SeqCst);
        if self.snapshot_fails.load(Ordering::SeqCst) {
            return Err(CoreError::Internal("snapshot builder offline".into()));
        }
        self.subjects
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| s.id == id)
            .map(|(_, snapshot)| snapshot.clone())
            .ok_or(CoreError::NotFound {
                entity: "Subject",
                id,
            })
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// How the stub provider behaves.
#[derive(Clone)]
pub enum StubBehavior {
    Succeed,
    Fail(&'static str),
    Hang,
    /// Return one frame fewer than requested.
    ShortFrames,
}

/// Provider returning `https://x/img.png`-style URLs and recording prompts.
pub struct StubProvider {
    pub behavior: StubBehavior,
    pub prompts: Mutex<Vec<String>>,
    pub discarded: Mutex<Vec<String>>,
}

impl StubProvider {
    pub fn new(behavior: StubBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            prompts: Mutex::new(Vec::new()),
            discarded: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    async fn act(&self, prompt: &str) -> Result<(), ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.behavior {
            StubBehavior::Succeed | StubBehavior::ShortFrames => Ok(()),
            StubBehavior::Fail(msg) => Err(ProviderError::Generation(msg.to_string())),
            StubBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ImageProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate_single(&self, _job_id: DbId, prompt: &str) -> Result<String, ProviderError> {
        self.act(prompt).await?;
        Ok("https://x/img.png".to_string())
    }

    async fn generate_multi_frame(
        &self,
        _job_id: DbId,
        prompt: &str,
        frame_count: u32,
    ) -> Result<Vec<String>, ProviderError> {
        self.act(prompt).await?;
        let frame_count = match self.behavior {
            StubBehavior::ShortFrames => frame_count.saturating_sub(1),
            _ => frame_count,
        };
        Ok((0..frame_count).map(|i| format!("https://x/frame-{i}.png")).collect())
    }

    async fn discard(&self, _job_id: DbId, urls: &[String]) {
        self.discarded.lock().unwrap().extend_from_slice(urls);
    }
}

/// Analyzer that never answers.
pub struct HangingAnalyzer;

#[async_trait]
impl DesignAnalyzer for HangingAnalyzer {
    async fn analyze(&self, _image: &ImageRef) -> AnalysisOutcome {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        AnalysisOutcome::Unavailable {
            reason: "no answer".into(),
        }
    }
}

/// Analyzer returning a fixed outcome and counting calls.
pub struct StubAnalyzer {
    pub outcome: AnalysisOutcome,
    pub calls: AtomicUsize,
}

#[async_trait]
impl DesignAnalyzer for StubAnalyzer {
    async fn analyze(&self, _image: &ImageRef) -> AnalysisOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

// ---------------------------------------------------------------------------
// Worker wiring
// ---------------------------------------------------------------------------

/// Config with no delays and a short timeout.
pub fn fast_config() -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_millis(10),
        batch_size: 5,
        inter_job_delay: Duration::ZERO,
        job_timeout: Duration::from_millis(200),
        stuck_threshold: Duration::from_secs(900),
    }
}

pub fn resolver(catalog: Arc<StubCatalog>) -> PromptResolver {
    PromptResolver::new(catalog, Arc::new(TemplatePromptBuilder::with_style("studio photo")))
}

pub fn preview_worker(
    store: Arc<MemoryJobStore>,
    provider: Arc<dyn ImageProvider>,
    config: WorkerConfig,
) -> PreviewWorker {
    PreviewWorker::new(
        "preview",
        JobKind::PREVIEW,
        store,
        resolver(StubCatalog::new()),
        provider,
        config,
    )
}
