//! Run Record - one model fitted within an experiment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Created, not yet fitting
    Pending,
    /// Fit/predict/evaluate in progress
    Running,
    /// Metrics recorded
    Success,
    /// Estimator raised; the experiment was aborted
    Failed,
}

/// A single (experiment, model) execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    model: String,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    error: Option<String>,
}

impl RunRecord {
    /// Create a pending run; the ID is `{experiment_id}/{model}`.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, model: impl Into<String>) -> Self {
        let experiment_id = experiment_id.into();
        let model = model.into();
        Self {
            run_id: Self::compose_id(&experiment_id, &model),
            experiment_id,
            model,
            status: RunStatus::Pending,
            started_at: None,
            ended_at: None,
            error: None,
        }
    }

    /// The run ID of `model` within `experiment_id`.
    #[must_use]
    pub fn compose_id(experiment_id: &str, model: &str) -> String {
        format!("{experiment_id}/{model}")
    }

    /// Run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Parent experiment label.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Start timestamp, once running.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// End timestamp, once finished.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Failure message of a failed run.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Wall-clock duration of a finished run.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.ended_at? - self.started_at?)
    }

    /// Pending → Running.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Running → Success.
    pub fn succeed(&mut self) {
        self.status = RunStatus::Success;
        self.ended_at = Some(Utc::now());
    }

    /// Running → Failed, keeping the error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.ended_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_default() {
        let run = RunRecord::new("baseline", "Ridge");
        assert_eq!(run.status(), RunStatus::Pending);
        assert_eq!(run.run_id(), "baseline/Ridge");
        assert!(run.duration().is_none());
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = RunRecord::new("baseline", "Ridge");
        run.start();
        assert_eq!(run.status(), RunStatus::Running);
        run.succeed();
        assert_eq!(run.status(), RunStatus::Success);
        assert!(run.duration().is_some_and(|d| d >= chrono::Duration::zero()));
    }

    #[test]
    fn test_run_failure_keeps_message() {
        let mut run = RunRecord::new("baseline", "Lasso");
        run.start();
        run.fail("singular design");
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.error(), Some("singular design"));
    }
}
