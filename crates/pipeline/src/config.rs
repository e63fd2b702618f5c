use std::time::Duration;

/// Margin added to the job timeout when the stuck threshold is too small.
const STUCK_THRESHOLD_MARGIN: Duration = Duration::from_secs(60);

/// Tuning for the worker loops.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Time between ticks.
    pub poll_interval: Duration,
    /// Maximum jobs claimed per tick.
    pub batch_size: i64,
    /// Pause between consecutive jobs of a batch.
    pub inter_job_delay: Duration,
    /// Upper bound on one provider invocation.
    pub job_timeout: Duration,
    /// `Processing` jobs untouched for longer than this are reaped.
    /// Always greater than `job_timeout`.
    pub stuck_threshold: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 5,
            inter_job_delay: Duration::from_millis(500),
            job_timeout: Duration::from_secs(300),
            stuck_threshold: Duration::from_secs(900),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `WORKER_POLL_INTERVAL_SECS`   | `5`     |
    /// | `WORKER_BATCH_SIZE`           | `5`     |
    /// | `WORKER_INTER_JOB_DELAY_MS`   | `500`   |
    /// | `WORKER_JOB_TIMEOUT_SECS`     | `300`   |
    /// | `WORKER_STUCK_THRESHOLD_SECS` | `900`   |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let poll_interval_secs: u64 = std::env::var("WORKER_POLL_INTERVAL_SECS")
            .map(|v| v.parse().expect("WORKER_POLL_INTERVAL_SECS must be a valid u64"))
            .unwrap_or(defaults.poll_interval.as_secs());

        let batch_size: i64 = std::env::var("WORKER_BATCH_SIZE")
            .map(|v| v.parse().expect("WORKER_BATCH_SIZE must be a valid i64"))
            .unwrap_or(defaults.batch_size);

        let inter_job_delay_ms: u64 = std::env::var("WORKER_INTER_JOB_DELAY_MS")
            .map(|v| v.parse().expect("WORKER_INTER_JOB_DELAY_MS must be a valid u64"))
            .unwrap_or(defaults.inter_job_delay.as_millis() as u64);

        let job_timeout_secs: u64 = std::env::var("WORKER_JOB_TIMEOUT_SECS")
            .map(|v| v.parse().expect("WORKER_JOB_TIMEOUT_SECS must be a valid u64"))
            .unwrap_or(defaults.job_timeout.as_secs());

        let stuck_threshold_secs: u64 = std::env::var("WORKER_STUCK_THRESHOLD_SECS")
            .map(|v| v.parse().expect("WORKER_STUCK_THRESHOLD_SECS must be a valid u64"))
            .unwrap_or(defaults.stuck_threshold.as_secs());

        Self {
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            batch_size: batch_size.max(1),
            inter_job_delay: Duration::from_millis(inter_job_delay_ms),
            job_timeout: Duration::from_secs(job_timeout_secs.max(1)),
            stuck_threshold: Duration::from_secs(stuck_threshold_secs),
        }
        .validated()
    }

    /// Raise `stuck_threshold` to `job_timeout + 60s` when it does not
    /// exceed the job timeout.
    pub fn validated(mut self) -> Self {
        if self.stuck_threshold <= self.job_timeout {
            let raised = self.job_timeout + STUCK_THRESHOLD_MARGIN;
            tracing::warn!(
                stuck_threshold_secs = self.stuck_threshold.as_secs(),
                job_timeout_secs = self.job_timeout.as_secs(),
                raised_to_secs = raised.as_secs(),
                "Stuck threshold must exceed the job timeout; raising it",
            );
            self.stuck_threshold = raised;
        }
        self
    }
}
