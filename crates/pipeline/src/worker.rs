//! Preview worker loop.
//!
//! One loop runs per kind family (preview jobs, upgrade jobs). Each tick
//! reaps stuck jobs, then claims up to `batch_size` of the oldest
//! `Pending` jobs and processes them one after another.
//!
//! Claiming is a plain read followed by an unconditional update. Two loops
//! serving the same kinds could process a job twice; the binary runs
//! exactly one loop per kind family.

use std::sync::Arc;
use std::time::Duration;

use atelier_cloud::error::ProviderError;
use atelier_cloud::providers::ImageProvider;
use atelier_core::error::CoreError;
use atelier_core::ports::{JobStore, JobStoreError};
use atelier_core::preview::{JobKind, JobStatus, PreviewJob};
use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::reaper::StuckJobReaper;
use crate::resolve::PromptResolver;

/// What a provider call produced.
enum Generated {
    Single(String),
    Frames(Vec<String>),
}

/// Why a job ended up `Failed`. The display text becomes the job's
/// error message.
#[derive(Debug, thiserror::Error)]
enum JobFailure {
    #[error("Prompt resolution failed: {0}")]
    Prompt(CoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Timed out after {0:?} resolving the prompt or waiting for the image provider")]
    Timeout(Duration),

    #[error("Cancelled: worker shutting down")]
    Cancelled,

    #[error("Unsupported job kind '{0}' for this worker")]
    UnsupportedKind(JobKind),

    #[error("Provider result rejected: {0}")]
    InvalidResult(CoreError),
}

/// Counts from one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub reaped: usize,
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Drives jobs of one kind family through the state machine.
pub struct PreviewWorker {
    name: &'static str,
    kinds: &'static [JobKind],
    store: Arc<dyn JobStore>,
    resolver: PromptResolver,
    provider: Arc<dyn ImageProvider>,
    reaper: StuckJobReaper,
    config: WorkerConfig,
}

impl PreviewWorker {
    /// * `name` - label used in logs, e.g. `"preview"` or `"upgrade"`.
    /// * `kinds` - the job kinds this loop claims.
    pub fn new(
        name: &'static str,
        kinds: &'static [JobKind],
        store: Arc<dyn JobStore>,
        resolver: PromptResolver,
        provider: Arc<dyn ImageProvider>,
        config: WorkerConfig,
    ) -> Self {
        let reaper = StuckJobReaper::new(Arc::clone(&store), kinds, config.stuck_threshold);
        Self {
            name,
            kinds,
            store,
            resolver,
            provider,
            reaper,
            config,
        }
    }

    /// Run ticks on the configured interval until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            worker = self.name,
            provider = self.provider.name(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Preview worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(worker = self.name, "Preview worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick(&cancel).await {
                        Ok(summary) if summary.claimed > 0 || summary.reaped > 0 => {
                            tracing::info!(
                                worker = self.name,
                                reaped = summary.reaped,
                                claimed = summary.claimed,
                                completed = summary.completed,
                                failed = summary.failed,
                                "Tick finished",
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(worker = self.name, error = %e, "Tick failed");
                        }
                    }
                }
            }
        }
    }

    /// One iteration: reap, claim a batch, process it sequentially.
    ///
    /// A reaper failure is logged and does not prevent claiming.
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<TickSummary, JobStoreError> {
        let mut summary = TickSummary::default();

        match self.reaper.reap().await {
            Ok(reaped) => summary.reaped = reaped,
            Err(e) => tracing::error!(worker = self.name, error = %e, "Stuck-job reaper failed"),
        }

        if cancel.is_cancelled() {
            return Ok(summary);
        }

        let jobs = self
            .store
            .fetch_pending(self.kinds, self.config.batch_size)
            .await?;

        for (index, job) in jobs.into_iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(worker = self.name, "Cancellation requested, leaving rest of batch");
                break;
            }
            if index > 0 && !self.config.inter_job_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.inter_job_delay) => {}
                }
            }

            summary.claimed += 1;
            match self.process(job, cancel).await {
                Some(JobStatus::Completed) => summary.completed += 1,
                Some(JobStatus::Failed) => summary.failed += 1,
                _ => {}
            }
        }

        Ok(summary)
    }

    /// Process one claimed job. Returns the terminal status it reached, or
    /// `None` if it could not be started.
    async fn process(&self, mut job: PreviewJob, cancel: &CancellationToken) -> Option<JobStatus> {
        let job_id = job.id;
        if let Err(e) = job.mark_processing(Utc::now()) {
            tracing::warn!(worker = self.name, job_id, error = %e, "Skipping job that is no longer pending");
            return None;
        }
        if let Err(e) = self.store.save(&job).await {
            tracing::error!(worker = self.name, job_id, error = %e, "Failed to mark job processing");
            return None;
        }
        tracing::info!(worker = self.name, job_id, kind = %job.kind, "Processing preview job");

        match self.execute(&mut job, cancel).await {
            Ok(generated) => {
                let now = Utc::now();
                let (completed, urls) = match generated {
                    Generated::Single(url) => (job.complete_single(url.clone(), now), vec![url]),
                    Generated::Frames(urls) => (job.complete_frames(urls.clone(), now), urls),
                };
                match completed {
                    Ok(()) => self.persist_completed(&job).await,
                    Err(e) => {
                        self.provider.discard(job_id, &urls).await;
                        self.persist_failed(&mut job, JobFailure::InvalidResult(e)).await
                    }
                }
            }
            Err(failure) => self.persist_failed(&mut job, failure).await,
        }
    }

    /// Resolve the prompt and call the provider within the job's bounded
    /// scope: loop cancellation or the per-job timeout, whichever is first.
    async fn execute(
        &self,
        job: &mut PreviewJob,
        cancel: &CancellationToken,
    ) -> Result<Generated, JobFailure> {
        if !self.kinds.contains(&job.kind) {
            return Err(JobFailure::UnsupportedKind(job.kind));
        }

        let scope = cancel.child_token();
        let work = async {
            let prompt = self.resolver.resolve(job).await.map_err(JobFailure::Prompt)?;
            let generated = self.generate(job, &prompt).await?;
            Ok::<_, JobFailure>(generated)
        };
        tokio::select! {
            _ = scope.cancelled() => Err(JobFailure::Cancelled),
            result = tokio::time::timeout(self.config.job_timeout, work) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(JobFailure::Timeout(self.config.job_timeout)),
            },
        }
    }

    async fn generate(&self, job: &PreviewJob, prompt: &str) -> Result<Generated, ProviderError> {
        match job.kind {
            JobKind::SingleImage | JobKind::UpgradePreview => self
                .provider
                .generate_single(job.id, prompt)
                .await
                .map(Generated::Single),
            JobKind::MultiFrame => self
                .provider
                .generate_multi_frame(job.id, prompt, job.requested_frames())
                .await
                .map(Generated::Frames),
        }
    }

    async fn persist_completed(&self, job: &PreviewJob) -> Option<JobStatus> {
        if let Err(e) = self.store.save(job).await {
            tracing::error!(worker = self.name, job_id = job.id, error = %e, "Failed to persist completed job");
            return None;
        }
        tracing::info!(
            worker = self.name,
            job_id = job.id,
            frames = job.result_frame_urls.as_ref().map_or(0, Vec::len),
            "Preview job completed",
        );
        Some(JobStatus::Completed)
    }

    /// Record a failure. A second failure while saving is only logged.
    async fn persist_failed(&self, job: &mut PreviewJob, failure: JobFailure) -> Option<JobStatus> {
        let message = failure.to_string();
        tracing::warn!(worker = self.name, job_id = job.id, error = %message, "Preview job failed");

        if let Err(e) = job.fail(message, Utc::now()) {
            tracing::error!(worker = self.name, job_id = job.id, error = %e, "Could not mark job failed");
            return None;
        }
        if let Err(e) = self.store.save(job).await {
            tracing::error!(worker = self.name, job_id = job.id, error = %e, "Failed to persist job failure");
        }
        Some(JobStatus::Failed)
    }
}
