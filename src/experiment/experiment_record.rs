//! Experiment Record - one per experiment label

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked experiment: one (dataset scope, split configuration) pair.
///
/// Root entity of the tracking schema; runs (one per model) hang off it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRecord {
    experiment_id: String,
    created_at: DateTime<Utc>,
    config: Option<serde_json::Value>,
    train_rows: usize,
    test_rows: usize,
    features: Vec<String>,
}

impl ExperimentRecord {
    /// Create a record for an experiment label with the current timestamp.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>) -> Self {
        Self::builder(experiment_id).build()
    }

    /// Start a builder for the optional fields.
    #[must_use]
    pub fn builder(experiment_id: impl Into<String>) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(experiment_id)
    }

    /// Experiment label.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Serialized experiment configuration, if recorded.
    #[must_use]
    pub const fn config(&self) -> Option<&serde_json::Value> {
        self.config.as_ref()
    }

    /// Training partition size.
    #[must_use]
    pub const fn train_rows(&self) -> usize {
        self.train_rows
    }

    /// Test partition size.
    #[must_use]
    pub const fn test_rows(&self) -> usize {
        self.test_rows
    }

    /// Feature columns the models saw.
    #[must_use]
    pub fn features(&self) -> &[String] {
        &self.features
    }
}

/// Builder for `ExperimentRecord`.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    record: ExperimentRecord,
}

impl ExperimentRecordBuilder {
    /// Create a builder with the required label.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>) -> Self {
        Self {
            record: ExperimentRecord {
                experiment_id: experiment_id.into(),
                created_at: Utc::now(),
                config: None,
                train_rows: 0,
                test_rows: 0,
                features: Vec::new(),
            },
        }
    }

    /// Attach the serialized configuration.
    #[must_use]
    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.record.config = Some(config);
        self
    }

    /// Record partition sizes.
    #[must_use]
    pub const fn rows(mut self, train_rows: usize, test_rows: usize) -> Self {
        self.record.train_rows = train_rows;
        self.record.test_rows = test_rows;
        self
    }

    /// Record the feature columns.
    #[must_use]
    pub fn features(mut self, features: Vec<String>) -> Self {
        self.record.features = features;
        self
    }

    /// Set a custom creation timestamp (deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.record.created_at = created_at;
        self
    }

    /// Build the `ExperimentRecord`.
    #[must_use]
    pub fn build(self) -> ExperimentRecord {
        self.record
    }
}
