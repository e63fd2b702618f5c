//! Prompt resolution for a claimed job.
//!
//! Order of preference:
//!
//! 1. A prompt already stored on the job.
//! 2. The snapshot captured at submission.
//! 3. A snapshot rebuilt from the subject (jobs submitted before
//!    snapshotting existed, or whose snapshot build failed).
//!
//! Upgrade previews additionally run the vision client over the source
//! photo when the snapshot has no analysis yet.

use std::sync::Arc;

use atelier_cloud::vision::{AnalysisOutcome, DesignAnalyzer, ImageRef};
use atelier_core::error::CoreError;
use atelier_core::ports::{PromptBuilder, SubjectCatalog};
use atelier_core::preview::{JobKind, PreviewJob};
use atelier_core::prompt::DesignSnapshot;
use atelier_core::types::DbId;

pub struct PromptResolver {
    catalog: Arc<dyn SubjectCatalog>,
    builder: Arc<dyn PromptBuilder>,
    analyzer: Option<Arc<dyn DesignAnalyzer>>,
}

impl PromptResolver {
    pub fn new(catalog: Arc<dyn SubjectCatalog>, builder: Arc<dyn PromptBuilder>) -> Self {
        Self {
            catalog,
            builder,
            analyzer: None,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn DesignAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Resolve the prompt for `job`, storing the snapshot and prompt on it.
    pub async fn resolve(&self, job: &mut PreviewJob) -> Result<String, CoreError> {
        if let Some(prompt) = job.prompt.as_ref().filter(|p| !p.trim().is_empty()) {
            return Ok(prompt.clone());
        }

        let mut snapshot = match job.snapshot.clone() {
            Some(snapshot) => snapshot,
            None => {
                tracing::warn!(
                    job_id = job.id,
                    subject_id = job.subject_id,
                    "Job has no snapshot, rebuilding from subject (degraded path)",
                );
                self.catalog.build_snapshot(job.subject_id).await?
            }
        };

        if job.kind == JobKind::UpgradePreview {
            self.enrich_with_analysis(job.id, &mut snapshot).await;
        }

        let prompt = self.builder.build_prompt(job.kind, &snapshot);
        job.snapshot = Some(snapshot);
        let prompt = prompt?;
        job.prompt = Some(prompt.clone());
        Ok(prompt)
    }

    /// Attach a vision analysis of the source photo to `snapshot` when one
    /// is missing. An unavailable analysis leaves the snapshot unchanged.
    async fn enrich_with_analysis(&self, job_id: DbId, snapshot: &mut serde_json::Value) {
        let Some(analyzer) = self.analyzer.as_ref() else {
            return;
        };
        let Ok(parsed) = DesignSnapshot::from_value(snapshot) else {
            return;
        };
        if parsed.analysis.is_some() {
            return;
        }
        let Some(source) = parsed.source_image_url else {
            tracing::debug!(job_id, "Upgrade snapshot has no source image, skipping analysis");
            return;
        };

        match analyzer.analyze(&ImageRef::Url(source)).await {
            AnalysisOutcome::Available(analysis) => {
                if let (Some(map), Ok(value)) =
                    (snapshot.as_object_mut(), serde_json::to_value(&analysis))
                {
                    map.insert("analysis".to_string(), value);
                    tracing::debug!(job_id, "Snapshot enriched with vision analysis");
                }
            }
            AnalysisOutcome::Unavailable { reason } => {
                tracing::info!(job_id, reason = %reason, "Analysis unavailable, using snapshot alone");
            }
        }
    }
}
