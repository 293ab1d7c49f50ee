//! Experiment Store - in-memory tracking data with a JSON manifest
//!
//! Records are kept in insertion order so the manifest lists experiments and
//! runs in the order they executed.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::metric_record::RMSE;
use super::{ArtifactRecord, ExperimentRecord, MetricRecord, RunRecord};
use crate::Result;

/// In-memory store for experiment tracking data.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentStore {
    experiments: Vec<ExperimentRecord>,
    runs: Vec<RunRecord>,
    metrics: Vec<MetricRecord>,
    artifacts: Vec<ArtifactRecord>,
}

impl ExperimentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
            && self.runs.is_empty()
            && self.metrics.is_empty()
            && self.artifacts.is_empty()
    }

    /// Number of experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Number of runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Number of metric values.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Number of artifacts.
    #[must_use]
    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    /// Add an experiment. A repeated label replaces the earlier record and
    /// drops its runs, metrics and artifacts, matching the files on disk
    /// being overwritten.
    pub fn add_experiment(&mut self, experiment: ExperimentRecord) {
        let id = experiment.experiment_id().to_string();
        if let Some(pos) = self.experiments.iter().position(|e| e.experiment_id() == id) {
            let stale: Vec<String> = self
                .runs
                .iter()
                .filter(|r| r.experiment_id() == id)
                .map(|r| r.run_id().to_string())
                .collect();
            self.runs.retain(|r| r.experiment_id() != id);
            self.metrics.retain(|m| !stale.iter().any(|s| s == m.run_id()));
            self.artifacts.retain(|a| a.experiment_id() != id);
            self.experiments[pos] = experiment;
        } else {
            self.experiments.push(experiment);
        }
    }

    /// Experiment by label.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<&ExperimentRecord> {
        self.experiments
            .iter()
            .find(|e| e.experiment_id() == experiment_id)
    }

    /// All experiments, in insertion order.
    #[must_use]
    pub fn experiments(&self) -> &[ExperimentRecord] {
        &self.experiments
    }

    /// Add a run.
    pub fn add_run(&mut self, run: RunRecord) {
        self.runs.push(run);
    }

    /// Run by ID.
    #[must_use]
    pub fn get_run(&self, run_id: &str) -> Option<&RunRecord> {
        self.runs.iter().find(|r| r.run_id() == run_id)
    }

    /// Mutable run by ID, for lifecycle transitions.
    pub fn get_run_mut(&mut self, run_id: &str) -> Option<&mut RunRecord> {
        self.runs.iter_mut().find(|r| r.run_id() == run_id)
    }

    /// Runs of one experiment, in execution order.
    #[must_use]
    pub fn get_runs_for_experiment(&self, experiment_id: &str) -> Vec<&RunRecord> {
        self.runs
            .iter()
            .filter(|run| run.experiment_id() == experiment_id)
            .collect()
    }

    /// Add a metric value.
    pub fn add_metric(&mut self, metric: MetricRecord) {
        self.metrics.push(metric);
    }

    /// Value of `key` for a run.
    #[must_use]
    pub fn get_metric(&self, run_id: &str, key: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|m| m.run_id() == run_id && m.key() == key)
            .map(MetricRecord::value)
    }

    /// Add an artifact.
    pub fn add_artifact(&mut self, artifact: ArtifactRecord) {
        self.artifacts.push(artifact);
    }

    /// Artifacts of one experiment, in write order.
    #[must_use]
    pub fn get_artifacts_for_experiment(&self, experiment_id: &str) -> Vec<&ArtifactRecord> {
        self.artifacts
            .iter()
            .filter(|a| a.experiment_id() == experiment_id)
            .collect()
    }

    /// Run with the strictly lowest RMSE in an experiment (ties: first run).
    #[must_use]
    pub fn best_run(&self, experiment_id: &str) -> Option<(&RunRecord, f64)> {
        let mut best: Option<(&RunRecord, f64)> = None;
        for run in self.get_runs_for_experiment(experiment_id) {
            let Some(rmse) = self.get_metric(run.run_id(), RMSE) else {
                continue;
            };
            if best.map_or(true, |(_, b)| rmse < b) {
                best = Some((run, rmse));
            }
        }
        best
    }

    /// Write the store as pretty JSON, creating parent directories.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, &json)?;
        Ok(json.len() as u64)
    }

    /// Read a store written by [`Self::save_json`].
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
