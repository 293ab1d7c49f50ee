//! End-to-end pipeline tests
//!
//! Raw panel CSV on disk → cleaning → temporal split → estimators →
//! artifacts and tracking manifest, all inside `tempfile` directories.

use gravity_lab::config::{DatasetScope, ExperimentConfig, PipelineConfig, SummaryConfig};
use gravity_lab::experiment::{ExperimentStore, RunStatus};
use gravity_lab::models::{ModelRegistry, Regressor};
use gravity_lab::panel::{self, columns, YearRange};
use gravity_lab::runner::{run_pipeline, ExperimentRunner, MANIFEST_FILE};
use gravity_lab::split::{temporal_split, FeatureMatrix, FeatureSet};
use gravity_lab::storage::{load_table, string_column};
use gravity_lab::{summary, Error, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const HEADER: &str = "year,iso3_o,iso3_d,tradeflow_comtrade_o,dist,contig,comlang_off,pop_o,pop_d,gdp_o,gdp_d,eu_o,eu_d";

/// One raw panel row; values are written verbatim.
#[derive(Clone, Copy)]
struct Row {
    year: i64,
    pair: usize,
    exports: f64,
    dist: f64,
    eu: (u8, u8),
}

#[allow(clippy::cast_precision_loss)]
fn write_panel(dir: &Path, rows: &[Row]) -> PathBuf {
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for r in rows {
        let p = r.pair as f64;
        let t = (r.year - 2000) as f64;
        writeln!(
            csv,
            "{},O{},D{},{},{},{},{},{},{},{},{},{},{}",
            r.year,
            r.pair,
            r.pair,
            r.exports,
            r.dist,
            r.pair % 2,
            u8::from(r.pair % 3 == 0),
            1.0e6 * (1.0 + p),
            2.0e6 + 1.0e5 * p,
            1.0e9 * (1.0 + p) * 1.03_f64.powf(t),
            5.0e9 * (1.0 + 0.2 * p) * 1.01_f64.powf(t),
            r.eu.0,
            r.eu.1,
        )
        .unwrap();
    }
    let path = dir.join("panel.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

/// Six pairs over the given years; pairs 0–2 are EU→EU.
#[allow(clippy::cast_precision_loss)]
fn gravity_rows(years: std::ops::RangeInclusive<i64>) -> Vec<Row> {
    let mut rows = Vec::new();
    for year in years {
        for pair in 0..6 {
            let p = pair as f64;
            let t = (year - 2000) as f64;
            let dist = 300.0 + 450.0 * p;
            let exports = 1.0e5 * (1.0 + p).powf(0.8) * 1.02_f64.powf(t) / (dist / 300.0).powf(1.1);
            let eu = if pair < 3 { (1, 1) } else { (0, 1) };
            rows.push(Row { year, pair, exports, dist, eu });
        }
    }
    rows
}

fn all_years() -> YearRange {
    YearRange::new(2000, 2020)
}

#[test]
#[allow(clippy::cast_precision_loss)]
fn scenario_a_tertiary_export_column() {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<Row> = [2010, 2010, 2011, 2012, 2012]
        .into_iter()
        .enumerate()
        .map(|(pair, year)| Row {
            year,
            pair,
            exports: 100.0 * (pair as f64 + 1.0),
            dist: 500.0,
            eu: (0, 0),
        })
        .collect();
    let path = write_panel(dir.path(), &rows);

    let dataset = panel::load_gravity_data(&path, all_years()).unwrap();
    assert_eq!(dataset.num_rows(), 5);

    let log_exports = dataset.numeric(columns::LOG_EXPORTS).unwrap();
    for (i, row) in rows.iter().enumerate() {
        assert!((log_exports.value(i) - row.exports.ln()).abs() < 1e-12);
    }

    let schema = dataset.batch().schema();
    for name in [
        columns::LOG_EXPORTS,
        columns::LOG_DIST,
        columns::LOG_GDP_O,
        columns::LOG_GDP_D,
        columns::LOG_POP_O,
        columns::LOG_POP_D,
        columns::LOG_GDP_O_X_LOG_GDP_D,
        columns::LOG_DIST_X_CONTIG,
        columns::LOG_DIST_X_COMLANG,
    ] {
        assert!(schema.column_with_name(name).is_some(), "missing {name}");
    }
}

#[test]
fn scenario_b_split_is_disjoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_panel(dir.path(), &gravity_rows(2010..=2020));
    let dataset = panel::load_gravity_data(&path, all_years()).unwrap();

    let split = temporal_split(&dataset, 2016, 2017, columns::TARGET, FeatureSet::Base).unwrap();
    assert_eq!(split.train_len(), 7 * 6);
    assert_eq!(split.test_len(), 4 * 6);
    assert_eq!(split.train_len() + split.test_len(), dataset.num_rows());
    assert_eq!(split.feature_names().len(), 7);
}

#[test]
fn scenario_c_empty_train_partition() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_panel(dir.path(), &gravity_rows(2010..=2012));
    let dataset = panel::load_gravity_data(&path, all_years()).unwrap();

    let err = temporal_split(&dataset, 2005, 2006, columns::TARGET, FeatureSet::Base).unwrap_err();
    assert!(err.is_configuration());
    match err {
        Error::EmptySplit { train_rows, test_rows } => {
            assert_eq!(train_rows, 0);
            assert_eq!(test_rows, 18);
        }
        other => panic!("expected EmptySplit, got {other:?}"),
    }
}

#[test]
fn scenario_d_eu_filter() {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<Row> = (0..10)
        .map(|pair| Row {
            year: 2015,
            pair,
            exports: 1000.0,
            dist: 800.0,
            eu: match pair {
                0..=2 => (1, 1),
                3 | 4 => (1, 0),
                5 => (0, 1),
                _ => (0, 0),
            },
        })
        .collect();
    let path = write_panel(dir.path(), &rows);
    let dataset = panel::load_gravity_data(&path, all_years()).unwrap();
    assert_eq!(dataset.num_rows(), 10);

    let eu = panel::filter_eu_pairs(&dataset).unwrap();
    assert_eq!(eu.num_rows(), 3);
}

/// Predicts `log_dist + offset`; with exports equal to distance its RMSE
/// is exactly `|offset|`.
#[derive(Debug)]
struct Offset {
    offset: f64,
    column: Option<usize>,
}

impl Offset {
    const fn new(offset: f64) -> Self {
        Self { offset, column: None }
    }
}

impl Regressor for Offset {
    fn fit(&mut self, x: &FeatureMatrix, _y: &[f64]) -> Result<()> {
        self.column = x.names().iter().position(|n| n == columns::LOG_DIST);
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let column = self.column.ok_or(Error::NotFitted("Offset"))?;
        Ok(x.rows().map(|row| row[column] + self.offset).collect())
    }
}

#[test]
fn scenario_e_best_model_feeds_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<Row> = gravity_rows(2010..=2014)
        .into_iter()
        .map(|r| Row { exports: r.dist, ..r })
        .collect();
    let path = write_panel(dir.path(), &rows);
    let dataset = panel::load_gravity_data(&path, all_years()).unwrap();

    let results = dir.path().join("results");
    let mut runner = ExperimentRunner::new(&results, 42);
    let config = ExperimentConfig::builder("stub").split(2012, 2013).build();
    let registry = ModelRegistry::new()
        .with_linear("X", Offset::new(0.5))
        .with_linear("Y", Offset::new(-0.3));

    let outcome = runner.run_with_models(&dataset, &config, registry).unwrap();

    let best = outcome.best.unwrap();
    assert_eq!(best.name, "Y");
    assert!((best.rmse - 0.3).abs() < 1e-9);
    assert!((outcome.metrics.rows()[0].rmse - 0.5).abs() < 1e-9);

    assert!(results.join("pred_vs_actual_Y_stub.json").exists());
    assert!(!results.join("pred_vs_actual_X_stub.json").exists());

    let scatter: serde_json::Value = serde_json::from_slice(
        &std::fs::read(results.join("residuals_stub_residuals_vs_fitted.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(scatter["model"], "Y");
    let residuals = scatter["residuals"].as_array().unwrap();
    assert_eq!(residuals.len(), 12);
    assert!(residuals.iter().all(|r| (r.as_f64().unwrap() - 0.3).abs() < 1e-9));

    let metrics = load_table(results.join("metrics_stub.csv")).unwrap();
    let models = string_column(&metrics, "model").unwrap();
    assert_eq!(models.value(0), "Y");
    assert_eq!(models.value(1), "X");

    let (run, rmse) = runner.store().best_run("stub").unwrap();
    assert_eq!(run.model(), "Y");
    assert!((rmse - 0.3).abs() < 1e-9);
}

#[test]
fn full_pipeline_writes_artifacts_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = write_panel(dir.path(), &gravity_rows(2006..=2014));
    let results_dir = dir.path().join("results");
    let config = PipelineConfig {
        data_path,
        results_dir: results_dir.clone(),
        experiments: vec![
            ExperimentConfig::builder("baseline").split(2011, 2012).build(),
            ExperimentConfig::builder("eu_only_interactions")
                .scope(DatasetScope::EuOnly)
                .interactions(true)
                .split(2011, 2012)
                .build(),
        ],
        ..PipelineConfig::default()
    };

    let store = run_pipeline(&config).unwrap();
    assert_eq!(store.experiment_count(), 2);
    assert_eq!(store.run_count(), 10);
    assert!(store
        .get_runs_for_experiment("baseline")
        .iter()
        .all(|r| r.status() == RunStatus::Success));

    let eu = store.get_experiment("eu_only_interactions").unwrap();
    assert_eq!(eu.train_rows(), 6 * 3);
    assert_eq!(eu.features().len(), 10);

    for name in [
        "metrics_baseline.csv",
        "feature_importance_baseline.csv",
        "feature_importance_RandomForest_baseline.json",
        "feature_importance_GradientBoosting_baseline.json",
        "residuals_baseline_residuals_vs_fitted.json",
        "residuals_baseline_residuals_hist.json",
        "metrics_eu_only_interactions.csv",
        MANIFEST_FILE,
    ] {
        assert!(results_dir.join(name).exists(), "missing {name}");
    }

    let importances = load_table(results_dir.join("feature_importance_baseline.csv")).unwrap();
    assert_eq!(importances.num_rows(), 2 * 7);

    let reloaded = ExperimentStore::load_json(results_dir.join(MANIFEST_FILE)).unwrap();
    assert_eq!(reloaded.run_count(), 10);
    assert_eq!(reloaded.artifact_count(), store.artifact_count());

    let summary_config = SummaryConfig {
        labels: vec!["baseline".into(), "eu_only_interactions".into(), "interactions".into()],
        ..SummaryConfig::default()
    };
    let written = summary::summarize(&results_dir, &summary_config).unwrap();
    assert_eq!(written.len(), 2);
    let long = load_table(results_dir.join(summary::SUMMARY_TOP_FILE)).unwrap();
    // 7 base features → all kept; 10 with interactions → top 10
    assert_eq!(long.num_rows(), 2 * 7 + 2 * 10);
}

#[test]
fn missing_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        data_path: dir.path().join("nope.csv"),
        results_dir: dir.path().join("results"),
        ..PipelineConfig::default()
    };
    let err = run_pipeline(&config).unwrap_err();
    assert!(matches!(err, Error::MissingInput(_)));
    assert!(!dir.path().join("results").exists());
}

#[test]
fn rerun_with_same_seed_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_panel(dir.path(), &gravity_rows(2008..=2013));
    let dataset = panel::load_gravity_data(&path, all_years()).unwrap();
    let config = ExperimentConfig::builder("repeat").interactions(true).split(2011, 2012).build();

    let mut runner = ExperimentRunner::new(dir.path().join("results"), 7);
    let first = runner.run(&dataset, &config).unwrap();
    let second = runner.run(&dataset, &config).unwrap();

    assert_eq!(first.metrics.rows(), second.metrics.rows());
    assert_eq!(first.importances, second.importances);
    assert_eq!(first.best, second.best);
    // the rerun replaced the earlier tracking records for the label
    assert_eq!(runner.store().experiment_count(), 1);
    assert_eq!(runner.store().run_count(), 5);
}
