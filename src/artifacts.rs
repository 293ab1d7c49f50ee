//! Artifact persistence
//!
//! Every experiment writes into one results directory. Tables go out as
//! headed CSV through [`crate::storage`]; diagnostic plots go out as
//! plot-friendly JSON data products (rendering is left to whatever reads
//! them). Each write returns an [`ArtifactRecord`] for the tracking store.
//!
//! File names are fixed per experiment label, so rerunning a label overwrites
//! its previous files and nothing else.

use crate::evaluation::{
    Histogram, ImportanceChart, ImportanceRecord, MetricsTable, PredVsActual, ResidualDiagnostics,
};
use crate::experiment::{ArtifactKind, ArtifactRecord, RunRecord};
use crate::storage;
use crate::Result;
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// `metrics_{label}.csv`
#[must_use]
pub fn metrics_file(label: &str) -> String {
    format!("metrics_{label}.csv")
}

/// `feature_importance_{label}.csv`
#[must_use]
pub fn importance_table_file(label: &str) -> String {
    format!("feature_importance_{label}.csv")
}

/// `feature_importance_{model}_{label}.json`
#[must_use]
pub fn importance_chart_file(model: &str, label: &str) -> String {
    format!("feature_importance_{model}_{label}.json")
}

/// `pred_vs_actual_{model}_{label}.json`
#[must_use]
pub fn pred_vs_actual_file(model: &str, label: &str) -> String {
    format!("pred_vs_actual_{model}_{label}.json")
}

/// Residual diagnostics share the prefix `residuals_{label}`.
#[must_use]
pub fn residual_files(label: &str) -> (String, String) {
    (
        format!("residuals_{label}_residuals_vs_fitted.json"),
        format!("residuals_{label}_residuals_hist.json"),
    )
}

/// Residual histogram as written to disk.
#[derive(Debug, Serialize)]
struct HistogramArtifact<'a> {
    model: &'a str,
    #[serde(flatten)]
    histogram: &'a Histogram,
}

/// Writes experiment artifacts below one directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    /// Create a writer; the directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Results directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of an artifact name.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Write the metrics table, ascending by RMSE.
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn write_metrics(&self, label: &str, table: &MetricsTable) -> Result<ArtifactRecord> {
        let rows = table.sorted();
        let schema = Arc::new(Schema::new(vec![
            Field::new("model", DataType::Utf8, false),
            Field::new("rmse", DataType::Float64, false),
            Field::new("r2", DataType::Float64, false),
        ]));
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.model.as_str()))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.rmse))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.r2))),
        ];
        let batch = RecordBatch::try_new(schema, columns)?;
        self.write_table(label, &metrics_file(label), ArtifactKind::MetricsTable, &batch)
    }

    /// Write a full (untruncated) importance table for one experiment.
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn write_importance_table(
        &self,
        label: &str,
        records: &[ImportanceRecord],
    ) -> Result<ArtifactRecord> {
        let batch = importance_batch(records)?;
        self.write_table(
            label,
            &importance_table_file(label),
            ArtifactKind::ImportanceTable,
            &batch,
        )
    }

    /// Write a top-K importance chart for one model.
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn write_importance_chart(&self, chart: &ImportanceChart) -> Result<ArtifactRecord> {
        let name = importance_chart_file(&chart.model, &chart.experiment);
        Ok(self
            .write_json(&chart.experiment, &name, ArtifactKind::ImportanceChart, chart)?
            .with_run(RunRecord::compose_id(&chart.experiment, &chart.model)))
    }

    /// Write the predicted-vs-actual scatter of the best model.
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn write_pred_vs_actual(&self, label: &str, data: &PredVsActual) -> Result<ArtifactRecord> {
        let name = pred_vs_actual_file(&data.model, label);
        Ok(self
            .write_json(label, &name, ArtifactKind::PredVsActual, data)?
            .with_run(RunRecord::compose_id(label, &data.model)))
    }

    /// Write both residual diagnostics of the best model.
    ///
    /// # Errors
    /// Returns error if either file cannot be written
    pub fn write_residuals(
        &self,
        label: &str,
        diagnostics: &ResidualDiagnostics,
    ) -> Result<[ArtifactRecord; 2]> {
        let (scatter_name, hist_name) = residual_files(label);
        let model = diagnostics.scatter.model.as_str();
        let run_id = RunRecord::compose_id(label, model);

        let scatter = self
            .write_json(label, &scatter_name, ArtifactKind::ResidualScatter, &diagnostics.scatter)?
            .with_run(&run_id);
        let histogram = HistogramArtifact {
            model,
            histogram: &diagnostics.histogram,
        };
        let hist = self
            .write_json(label, &hist_name, ArtifactKind::ResidualHistogram, &histogram)?
            .with_run(run_id);
        Ok([scatter, hist])
    }

    /// Write any batch as CSV under `name`.
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn write_table(
        &self,
        experiment: &str,
        name: &str,
        kind: ArtifactKind,
        batch: &RecordBatch,
    ) -> Result<ArtifactRecord> {
        let path = self.path(name);
        let bytes = storage::write_csv(&path, batch)?;
        info!(path = %path.display(), rows = batch.num_rows(), "saved table");
        Ok(ArtifactRecord::new(experiment, name, kind, bytes))
    }

    fn write_json<T: Serialize + ?Sized>(
        &self,
        experiment: &str,
        name: &str,
        kind: ArtifactKind,
        value: &T,
    ) -> Result<ArtifactRecord> {
        let path = self.path(name);
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(value)?;
        std::fs::write(&path, &json)?;
        info!(path = %path.display(), "saved plot data");
        Ok(ArtifactRecord::new(experiment, name, kind, json.len() as u64))
    }
}

/// Long-format importance table: `feature, importance, model`.
///
/// # Errors
/// Returns error if the batch cannot be assembled
pub fn importance_batch(records: &[ImportanceRecord]) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("feature", DataType::Utf8, false),
        Field::new("importance", DataType::Float64, false),
        Field::new("model", DataType::Utf8, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.feature.as_str()))),
        Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.importance))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.model.as_str()))),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}
