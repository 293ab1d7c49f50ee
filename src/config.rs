//! Pipeline configuration
//!
//! [`PipelineConfig::default`] reproduces the standard study: six experiments
//! over all pairs and the EU subset, with the main split (train ≤ 2016, test
//! ≥ 2017) and an earlier robustness split (train ≤ 2012, test ≥ 2013).
//!
//! A TOML file may override any subset of fields:
//!
//! ```toml
//! data_path = "data/raw/gravity_trade.csv"
//! seed = 7
//!
//! [[experiments]]
//! label = "baseline"
//! train_end_year = 2016
//! test_start_year = 2017
//! ```

use crate::panel::YearRange;
use crate::split::FeatureSet;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Which rows of the cleaned panel an experiment uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetScope {
    /// Every pair
    #[default]
    All,
    /// Only pairs where both countries are EU members
    EuOnly,
}

/// One named experiment: dataset scope plus split configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Label used in every artifact name
    pub label: String,
    /// Dataset scope
    #[serde(default)]
    pub scope: DatasetScope,
    /// Add the three interaction features
    #[serde(default)]
    pub use_interactions: bool,
    /// Last training year (inclusive)
    pub train_end_year: i64,
    /// First test year (inclusive)
    pub test_start_year: i64,
}

impl ExperimentConfig {
    /// Start a builder (all pairs, no interactions, train ≤ 2016, test ≥ 2017).
    #[must_use]
    pub fn builder(label: impl Into<String>) -> ExperimentConfigBuilder {
        ExperimentConfigBuilder::new(label)
    }

    /// Feature set implied by the interactions flag.
    #[must_use]
    pub const fn feature_set(&self) -> FeatureSet {
        FeatureSet::from_flag(self.use_interactions)
    }

    /// Check the label is usable inside a file name.
    ///
    /// Overlapping year windows are allowed but logged.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for an empty label or one with path separators
    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(Error::Config("experiment label must not be empty".into()));
        }
        if self.label.contains(['/', '\\']) || self.label.contains("..") {
            return Err(Error::Config(format!(
                "experiment label '{}' cannot be used in a file name",
                self.label
            )));
        }
        if self.test_start_year <= self.train_end_year {
            warn!(
                label = %self.label,
                train_end_year = self.train_end_year,
                test_start_year = self.test_start_year,
                "train and test windows overlap"
            );
        }
        Ok(())
    }
}

/// Builder for `ExperimentConfig`.
#[derive(Debug)]
pub struct ExperimentConfigBuilder {
    config: ExperimentConfig,
}

impl ExperimentConfigBuilder {
    /// Create a builder with defaults.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            config: ExperimentConfig {
                label: label.into(),
                scope: DatasetScope::All,
                use_interactions: false,
                train_end_year: 2016,
                test_start_year: 2017,
            },
        }
    }

    /// Set the dataset scope.
    #[must_use]
    pub const fn scope(mut self, scope: DatasetScope) -> Self {
        self.config.scope = scope;
        self
    }

    /// Turn interaction features on or off.
    #[must_use]
    pub const fn interactions(mut self, use_interactions: bool) -> Self {
        self.config.use_interactions = use_interactions;
        self
    }

    /// Set the split years.
    #[must_use]
    pub const fn split(mut self, train_end_year: i64, test_start_year: i64) -> Self {
        self.config.train_end_year = train_end_year;
        self.config.test_start_year = test_start_year;
        self
    }

    /// Build the `ExperimentConfig`.
    #[must_use]
    pub fn build(self) -> ExperimentConfig {
        self.config
    }
}

/// Settings of the importance summarization step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Experiment labels whose importance tables are read
    pub labels: Vec<String>,
    /// Model families kept
    ///
    /// The boosted ensemble is registered as `GradientBoosting`; the default
    /// also keeps `XGBoost` so tables written under that name still count.
    pub keep_models: Vec<String>,
    /// Features kept per (experiment, model)
    pub top_n: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            labels: ["baseline", "interactions", "eu_only_baseline", "eu_only_interactions"]
                .into_iter()
                .map(String::from)
                .collect(),
            keep_models: vec!["RandomForest".into(), "GradientBoosting".into(), "XGBoost".into()],
            top_n: 10,
        }
    }
}

/// Whole-pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw panel file (CSV or Parquet)
    pub data_path: PathBuf,
    /// Directory receiving every artifact
    pub results_dir: PathBuf,
    /// First panel year kept
    pub start_year: i64,
    /// Last panel year kept
    pub end_year: i64,
    /// Seed shared by the stochastic estimators
    pub seed: u64,
    /// Experiments, run in order
    pub experiments: Vec<ExperimentConfig>,
    /// Summarization settings
    pub summary: SummaryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let main = |label: &str, scope, interactions| {
            ExperimentConfig::builder(label)
                .scope(scope)
                .interactions(interactions)
                .split(2016, 2017)
                .build()
        };
        let alt = |label: &str, scope| {
            ExperimentConfig::builder(label)
                .scope(scope)
                .split(2012, 2013)
                .build()
        };
        Self {
            data_path: PathBuf::from("data/raw/gravity_trade.csv"),
            results_dir: PathBuf::from("results"),
            start_year: 2000,
            end_year: 2020,
            seed: 42,
            experiments: vec![
                main("baseline", DatasetScope::All, false),
                main("interactions", DatasetScope::All, true),
                main("eu_only_baseline", DatasetScope::EuOnly, false),
                main("eu_only_interactions", DatasetScope::EuOnly, true),
                alt("baseline_alt_split", DatasetScope::All),
                alt("eu_only_baseline_alt_split", DatasetScope::EuOnly),
            ],
            summary: SummaryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse TOML; absent fields keep their defaults.
    ///
    /// # Errors
    /// Returns error on malformed TOML or an invalid configuration
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    /// Returns [`Error::MissingInput`] if the file does not exist, or a parse
    /// or validation error
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// The inclusive year range kept by the loader.
    #[must_use]
    pub const fn years(&self) -> YearRange {
        YearRange::new(self.start_year, self.end_year)
    }

    /// Check year range, experiment labels and summary settings.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.start_year > self.end_year {
            return Err(Error::Config(format!(
                "start_year {} is after end_year {}",
                self.start_year, self.end_year
            )));
        }
        let mut seen = HashSet::new();
        for experiment in &self.experiments {
            experiment.validate()?;
            if !seen.insert(experiment.label.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate experiment label '{}'",
                    experiment.label
                )));
            }
        }
        if self.summary.top_n == 0 {
            return Err(Error::Config("summary.top_n must be positive".into()));
        }
        Ok(())
    }
}
