//! Artifact Record - files written by an experiment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an artifact file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// `metrics_{label}.csv`
    MetricsTable,
    /// `pred_vs_actual_{model}_{label}.json`
    PredVsActual,
    /// `residuals_{label}_residuals_vs_fitted.json`
    ResidualScatter,
    /// `residuals_{label}_residuals_hist.json`
    ResidualHistogram,
    /// `feature_importance_{model}_{label}.json`
    ImportanceChart,
    /// `feature_importance_{label}.csv`
    ImportanceTable,
    /// Cross-experiment importance summaries
    ImportanceSummary,
}

/// A file written under the results directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    experiment_id: String,
    run_id: Option<String>,
    name: String,
    kind: ArtifactKind,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create an artifact record.
    ///
    /// `name` is the file name relative to the results directory.
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        kind: ArtifactKind,
        size_bytes: u64,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            run_id: None,
            name: name.into(),
            kind,
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Tie the artifact to the run that produced it.
    #[must_use]
    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Experiment label.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Producing run, for per-model artifacts.
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// File name relative to the results directory.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Artifact kind.
    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// File size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
