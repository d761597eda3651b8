use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

use crate::evaluator::{EvaluationReport, ModelFailure};
use crate::results::ModelAccuracy;

/// Version of the run summary layout.
pub const SUMMARY_SCHEMA_VERSION: &str = "1.0";

/// Run summary persisted next to the result table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummaryArtifact {
    pub schema_version: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,

    /// SHA-256 of the test data file.
    pub test_digest: String,
    pub train_digest: Option<String>,
    pub corresponding_data: bool,
    pub total_trials: usize,
    pub models: Vec<ModelAccuracy>,
    pub failures: Vec<ModelFailure>,
}

impl RunSummaryArtifact {
    pub fn new(
        report: &EvaluationReport,
        test_digest: String,
        train_digest: Option<String>,
        corresponding_data: bool,
    ) -> Self {
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            test_digest,
            train_digest,
            corresponding_data,
            total_trials: report.results.len(),
            models: report.results.accuracy_by_model(),
            failures: report.failures.clone(),
        }
    }
}

/// SHA-256 hex digest of a file's bytes.
pub fn file_digest(path: &Path) -> Result<String> {
    let content = std::fs::read(path).with_context(|| format!("read {:?}", path))?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Write the run summary in pretty JSON format.
pub fn write_summary_json(path: &Path, artifact: &RunSummaryArtifact) -> Result<()> {
    let content = serde_json::to_string_pretty(artifact).context("serialize run summary")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Render per-model accuracy and skipped models as Markdown.
pub fn render_summary_md(artifact: &RunSummaryArtifact) -> String {
    let mut out = String::new();
    out.push_str("# Evaluation Summary\n\n");
    out.push_str(&format!("- run: `{}`\n", artifact.run_id));
    out.push_str(&format!("- trials: {}\n\n", artifact.total_trials));

    out.push_str("| model | trials | accuracy |\n");
    out.push_str("|---|---:|---:|\n");
    for model in &artifact.models {
        out.push_str(&format!(
            "| {} | {} | {:.4} |\n",
            model.model, model.trials, model.accuracy
        ));
    }

    if !artifact.failures.is_empty() {
        out.push_str("\n## Skipped Models\n");
        for failure in &artifact.failures {
            out.push_str(&format!("- `{}`: {}\n", failure.path.display(), failure.error));
        }
    }
    out
}
