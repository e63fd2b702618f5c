//! Stuck-job reaper.
//!
//! A worker that crashes mid-job leaves its row in `Processing` forever.
//! Each tick, before claiming new work, the reaper force-fails every such
//! job whose `updated_at` is older than the stuck threshold.

use std::sync::Arc;
use std::time::Duration;

use atelier_core::ports::{JobStore, JobStoreError};
use atelier_core::preview::JobKind;
use chrono::Utc;

/// Force-fails `Processing` jobs of one kind family.
pub struct StuckJobReaper {
    store: Arc<dyn JobStore>,
    kinds: &'static [JobKind],
    threshold: Duration,
}

impl StuckJobReaper {
    pub fn new(store: Arc<dyn JobStore>, kinds: &'static [JobKind], threshold: Duration) -> Self {
        Self {
            store,
            kinds,
            threshold,
        }
    }

    /// Fail every stuck job in one batched write. Returns how many were reaped.
    ///
    /// Performs no write at all when nothing qualifies.
    pub async fn reap(&self) -> Result<usize, JobStoreError> {
        let now = Utc::now();
        let cutoff = now - chrono::Duration::seconds(self.threshold.as_secs() as i64);
        let stuck = self.store.find_stuck(self.kinds, cutoff).await?;
        if stuck.is_empty() {
            return Ok(0);
        }

        let message = format!(
            "Timed out: job was still processing after {}s and was presumed abandoned",
            self.threshold.as_secs()
        );
        let mut reaped = Vec::with_capacity(stuck.len());
        for mut job in stuck {
            match job.fail(message.clone(), now) {
                Ok(()) => {
                    tracing::warn!(job_id = job.id, kind = %job.kind, "Reaping stuck preview job");
                    reaped.push(job);
                }
                Err(e) => tracing::warn!(job_id = job.id, error = %e, "Skipping unreapable job"),
            }
        }
        if reaped.is_empty() {
            return Ok(0);
        }

        self.store.save_all(&reaped).await?;
        tracing::info!(count = reaped.len(), "Reaped stuck preview jobs");
        Ok(reaped.len())
    }
}
