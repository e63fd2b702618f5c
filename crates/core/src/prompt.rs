//! Semantic snapshot shape and the default template prompt builder.
//!
//! Snapshots are stored on jobs as opaque JSON. [`DesignSnapshot`] is the
//! shape the default [`TemplatePromptBuilder`] understands; unknown keys
//! are ignored so that richer snapshots from the external builder still
//! render.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ports::PromptBuilder;
use crate::preview::JobKind;

/// Style suffix appended to every prompt unless overridden.
pub const DEFAULT_STYLE: &str =
    "studio product photography, soft diffused lighting, seamless white background, \
     photorealistic, high detail";

/// One stone setting in a design.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoneSpec {
    /// e.g. `diamond`, `sapphire`.
    pub kind: String,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub carat: Option<f64>,
    #[serde(default)]
    pub count: Option<u32>,
}

/// Structured description extracted from an uploaded photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignAnalysis {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub metal: Option<String>,
    #[serde(default)]
    pub stones: Vec<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Semantic description of a configuration or analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignSnapshot {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub stones: Vec<StoneSpec>,
    #[serde(default)]
    pub enhancements: Vec<String>,
    /// Source photo for upgrade previews.
    #[serde(default)]
    pub source_image_url: Option<String>,
    /// Filled in by the vision client for upgrade previews.
    #[serde(default)]
    pub analysis: Option<DesignAnalysis>,
}

impl DesignSnapshot {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Validation(format!("Malformed design snapshot: {e}")))
    }
}

/// Renders snapshots into prompts with a fixed template.
#[derive(Debug, Clone)]
pub struct TemplatePromptBuilder {
    style: String,
}

impl Default for TemplatePromptBuilder {
    fn default() -> Self {
        Self {
            style: DEFAULT_STYLE.to_string(),
        }
    }
}

impl TemplatePromptBuilder {
    pub fn with_style(style: impl Into<String>) -> Self {
        Self {
            style: style.into(),
        }
    }

    fn describe_configuration(snapshot: &DesignSnapshot) -> Result<String, CoreError> {
        let category = snapshot
            .category
            .as_deref()
            .ok_or_else(|| CoreError::Validation("Snapshot is missing a category".into()))?;

        let mut subject = String::from("A");
        for part in [snapshot.material.as_deref(), snapshot.shape.as_deref()]
            .into_iter()
            .flatten()
        {
            subject.push(' ');
            subject.push_str(part);
        }
        subject.push(' ');
        subject.push_str(category);

        if !snapshot.stones.is_empty() {
            let stones: Vec<String> = snapshot.stones.iter().map(describe_stone).collect();
            subject.push_str(" set with ");
            subject.push_str(&stones.join(" and "));
        }
        Ok(subject)
    }

    fn describe_upgrade(snapshot: &DesignSnapshot) -> Result<String, CoreError> {
        let analysis = snapshot.analysis.clone().unwrap_or_default();
        let category = analysis
            .category
            .as_deref()
            .or(snapshot.category.as_deref())
            .ok_or_else(|| CoreError::Validation("Snapshot is missing a category".into()))?;

        let mut subject = format!("An upgraded version of an existing {category}");
        if let Some(metal) = analysis.metal.as_deref().or(snapshot.material.as_deref()) {
            subject.push_str(&format!(" in {metal}"));
        }
        if !analysis.stones.is_empty() {
            subject.push_str(&format!(" featuring {}", analysis.stones.join(", ")));
        }
        if let Some(style) = analysis.style.as_deref() {
            subject.push_str(&format!(", {style} style"));
        }
        if let Some(description) = analysis.description.as_deref() {
            subject.push_str(&format!(". Original piece: {description}"));
        }
        Ok(subject)
    }
}

fn describe_stone(stone: &StoneSpec) -> String {
    let mut parts = Vec::new();
    if let Some(count) = stone.count.filter(|c| *c > 1) {
        parts.push(count.to_string());
    }
    if let Some(shape) = stone.shape.as_deref() {
        parts.push(shape.to_string());
    }
    parts.push(stone.kind.clone());
    let mut text = parts.join(" ");
    if let Some(carat) = stone.carat {
        text.push_str(&format!(" ({carat} ct)"));
    }
    text
}

impl PromptBuilder for TemplatePromptBuilder {
    fn build_prompt(&self, kind: JobKind, snapshot: &serde_json::Value) -> Result<String, CoreError> {
        let snapshot = DesignSnapshot::from_value(snapshot)?;
        let mut prompt = match kind {
            JobKind::SingleImage | JobKind::MultiFrame => Self::describe_configuration(&snapshot)?,
            JobKind::UpgradePreview => Self::describe_upgrade(&snapshot)?,
        };
        if !snapshot.enhancements.is_empty() {
            prompt.push_str(&format!(", with {}", snapshot.enhancements.join(", ")));
        }
        prompt.push_str(". ");
        prompt.push_str(&self.style);
        Ok(prompt)
    }
}
