//! Experiment Runner
//!
//! Orchestrates one experiment end to end:
//!
//! 1. Split the dataset along the configured year boundary
//! 2. Fit, predict and score every registry entry in registry order
//! 3. Track the best model (strictly lower RMSE; ties keep the first seen)
//! 4. Write a top-15 importance chart for each importance-capable model
//! 5. Write the metrics table (ascending RMSE)
//! 6. Write prediction/residual diagnostics for the best model only
//! 7. Write the combined importance table if any model produced one
//!
//! Estimator failures are not retried: the run is marked failed and the error
//! propagates, leaving artifacts already written in place.

use crate::artifacts::ArtifactWriter;
use crate::config::{DatasetScope, ExperimentConfig, PipelineConfig};
use crate::evaluation::{
    evaluate_regression, rank_importances, top_k, ImportanceChart, ImportanceRecord,
    MetricsTable, PredVsActual, RegressionMetrics, ResidualDiagnostics, IMPORTANCE_TOP_K,
};
use crate::experiment::{ArtifactRecord, ExperimentRecord, ExperimentStore, MetricRecord, RunRecord};
use crate::models::{get_models, Estimator, ModelRegistry};
use crate::panel::{self, columns, ModelingDataset};
use crate::split::{temporal_split, Split};
use crate::{Error, Result};
use std::path::PathBuf;
use tracing::info;

/// File name of the tracking manifest
pub const MANIFEST_FILE: &str = "experiments.json";

/// Best model of an experiment and its test predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct BestModel {
    /// Model name
    pub name: String,
    /// Test RMSE
    pub rmse: f64,
    /// Test predictions
    pub predictions: Vec<f64>,
}

/// Running minimum over model RMSEs.
#[derive(Debug, Default)]
pub struct BestModelTracker {
    best: Option<BestModel>,
}

impl BestModelTracker {
    /// Create an empty tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self { best: None }
    }

    /// Offer a result; kept only if its RMSE is finite and strictly lower.
    ///
    /// Returns whether the offer became the new best.
    pub fn offer(&mut self, name: &str, rmse: f64, predictions: &[f64]) -> bool {
        let better = rmse.is_finite() && self.best.as_ref().map_or(true, |b| rmse < b.rmse);
        if better {
            self.best = Some(BestModel {
                name: name.to_string(),
                rmse,
                predictions: predictions.to_vec(),
            });
        }
        better
    }

    /// Current best, if any result was offered.
    #[must_use]
    pub const fn best(&self) -> Option<&BestModel> {
        self.best.as_ref()
    }

    /// Take the final best.
    #[must_use]
    pub fn into_best(self) -> Option<BestModel> {
        self.best
    }
}

/// Everything one experiment produced.
#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    /// Experiment label
    pub label: String,
    /// Metrics in registry order
    pub metrics: MetricsTable,
    /// Best model by test RMSE
    pub best: Option<BestModel>,
    /// Full importance rankings of all importance-capable models
    pub importances: Vec<ImportanceRecord>,
    /// Files written, in write order
    pub artifacts: Vec<ArtifactRecord>,
}

/// Result of scoring one model.
struct Scored {
    predictions: Vec<f64>,
    metrics: RegressionMetrics,
    importances: Option<Vec<ImportanceRecord>>,
}

/// Runs experiments and records them in an [`ExperimentStore`].
#[derive(Debug)]
pub struct ExperimentRunner {
    writer: ArtifactWriter,
    seed: u64,
    store: ExperimentStore,
}

impl ExperimentRunner {
    /// Create a runner writing below `results_dir`.
    #[must_use]
    pub fn new(results_dir: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            writer: ArtifactWriter::new(results_dir),
            seed,
            store: ExperimentStore::new(),
        }
    }

    /// Artifact writer.
    #[must_use]
    pub const fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    /// Tracking data recorded so far.
    #[must_use]
    pub const fn store(&self) -> &ExperimentStore {
        &self.store
    }

    /// Take the tracking data.
    #[must_use]
    pub fn into_store(self) -> ExperimentStore {
        self.store
    }

    /// Run one experiment with a fresh standard registry.
    ///
    /// # Errors
    /// Returns a configuration error for invalid labels or an empty split,
    /// the first estimator failure, or an I/O error while writing artifacts
    pub fn run(&mut self, dataset: &ModelingDataset, config: &ExperimentConfig) -> Result<ExperimentOutcome> {
        self.run_with_models(dataset, config, get_models(self.seed))
    }

    /// Run one experiment with a caller-supplied registry.
    ///
    /// # Errors
    /// Same as [`Self::run`]
    pub fn run_with_models(
        &mut self,
        dataset: &ModelingDataset,
        config: &ExperimentConfig,
        registry: ModelRegistry,
    ) -> Result<ExperimentOutcome> {
        config.validate()?;
        let label = config.label.as_str();
        let split = temporal_split(
            dataset,
            config.train_end_year,
            config.test_start_year,
            columns::TARGET,
            config.feature_set(),
        )?;

        info!(
            label,
            train_end_year = config.train_end_year,
            test_start_year = config.test_start_year,
            interactions = config.use_interactions,
            train_rows = split.train_len(),
            test_rows = split.test_len(),
            "=== Experiment ==="
        );
        self.store.add_experiment(
            ExperimentRecord::builder(label)
                .config(serde_json::to_value(config)?)
                .rows(split.train_len(), split.test_len())
                .features(split.feature_names().to_vec())
                .build(),
        );

        let mut metrics = MetricsTable::new();
        let mut tracker = BestModelTracker::new();
        let mut importances = Vec::new();
        let mut artifacts = Vec::new();

        for mut entry in registry {
            let run = RunRecord::new(label, &entry.name);
            let run_id = run.run_id().to_string();
            self.store.add_run(run);
            if let Some(run) = self.store.get_run_mut(&run_id) {
                run.start();
            }

            let scored = match score_model(&mut entry.estimator, &entry.name, &split) {
                Ok(scored) => scored,
                Err(err) => {
                    if let Some(run) = self.store.get_run_mut(&run_id) {
                        run.fail(err.to_string());
                    }
                    return Err(err);
                }
            };

            info!(
                model = %entry.name,
                rmse = scored.metrics.rmse,
                r2 = scored.metrics.r2,
                "{:>16} | RMSE={:.4} | R2={:.4}",
                entry.name,
                scored.metrics.rmse,
                scored.metrics.r2
            );
            metrics.push(entry.name.as_str(), scored.metrics);
            for metric in MetricRecord::from_metrics(&run_id, &scored.metrics) {
                self.store.add_metric(metric);
            }
            tracker.offer(&entry.name, scored.metrics.rmse, &scored.predictions);

            if let Some(ranked) = scored.importances {
                let chart = ImportanceChart::new(&entry.name, label, top_k(&ranked, IMPORTANCE_TOP_K)?);
                artifacts.push(self.writer.write_importance_chart(&chart)?);
                importances.extend(ranked);
            }

            if let Some(run) = self.store.get_run_mut(&run_id) {
                run.succeed();
            }
        }

        artifacts.push(self.writer.write_metrics(label, &metrics)?);

        let best = tracker.into_best();
        if let Some(best) = &best {
            info!(label, model = %best.name, rmse = best.rmse, "best model");
            let pva = PredVsActual::new(&best.name, &split.y_test, &best.predictions)?;
            artifacts.push(self.writer.write_pred_vs_actual(label, &pva)?);
            let diagnostics = ResidualDiagnostics::compute(&best.name, &split.y_test, &best.predictions)?;
            artifacts.extend(self.writer.write_residuals(label, &diagnostics)?);
        }

        if !importances.is_empty() {
            artifacts.push(self.writer.write_importance_table(label, &importances)?);
        }

        for artifact in &artifacts {
            self.store.add_artifact(artifact.clone());
        }

        Ok(ExperimentOutcome {
            label: label.to_string(),
            metrics,
            best,
            importances,
            artifacts,
        })
    }
}

fn score_model(estimator: &mut Estimator, name: &str, split: &Split) -> Result<Scored> {
    estimator.fit(&split.x_train, &split.y_train)?;
    let predictions = estimator.predict(&split.x_test)?;
    if predictions.len() != split.test_len() {
        return Err(Error::estimator(
            name,
            format!(
                "returned {} predictions for {} test rows",
                predictions.len(),
                split.test_len()
            ),
        ));
    }
    if let Some(row) = predictions.iter().position(|p| !p.is_finite()) {
        return Err(Error::estimator(
            name,
            format!("non-finite prediction at test row {row}"),
        ));
    }
    let metrics = evaluate_regression(&split.y_test, &predictions)?;
    let importances = match estimator.feature_importances() {
        Some(scores) => Some(rank_importances(split.feature_names(), &scores?, name)?),
        None => None,
    };
    Ok(Scored {
        predictions,
        metrics,
        importances,
    })
}

/// Run every configured experiment and write the tracking manifest.
///
/// Loads and cleans the panel once and derives the EU subset at most once.
///
/// # Errors
/// Returns [`Error::MissingInput`] if the data file does not exist, any
/// configuration error, or the first experiment failure
pub fn run_pipeline(config: &PipelineConfig) -> Result<ExperimentStore> {
    config.validate()?;
    if !config.data_path.exists() {
        return Err(Error::MissingInput(config.data_path.clone()));
    }

    let dataset = panel::load_gravity_data(&config.data_path, config.years())?;
    info!(
        path = %config.data_path.display(),
        rows = dataset.num_rows(),
        years = ?dataset.year_span(),
        "loaded modeling dataset"
    );

    let manifest = config.results_dir.join(MANIFEST_FILE);
    let mut eu_dataset: Option<ModelingDataset> = None;
    let mut runner = ExperimentRunner::new(&config.results_dir, config.seed);

    for experiment in &config.experiments {
        let data = match experiment.scope {
            DatasetScope::All => &dataset,
            DatasetScope::EuOnly => {
                if eu_dataset.is_none() {
                    eu_dataset = Some(panel::filter_eu_pairs(&dataset)?);
                }
                eu_dataset.as_ref().unwrap_or(&dataset)
            }
        };
        if let Err(err) = runner.run(data, experiment) {
            // the manifest still records the failed run
            runner.store().save_json(&manifest)?;
            return Err(err);
        }
    }

    let store = runner.into_store();
    store.save_json(&manifest)?;
    info!(path = %manifest.display(), experiments = store.experiment_count(), "saved manifest");
    Ok(store)
}
