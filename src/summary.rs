//! Cross-experiment importance summary
//!
//! Re-aggregates the per-experiment `feature_importance_{label}.csv` tables
//! into a long top-N table and a feature × `experiment:model` pivot.

use crate::artifacts::{importance_table_file, ArtifactWriter};
use crate::config::SummaryConfig;
use crate::experiment::{ArtifactKind, ArtifactRecord};
use crate::storage::{self, cell, numeric_column, string_column};
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Long-format summary file
pub const SUMMARY_TOP_FILE: &str = "feature_importance_summary_top10.csv";
/// Pivoted summary file
pub const SUMMARY_WIDE_FILE: &str = "feature_importance_summary_wide.csv";

/// Experiment ID used for summary artifacts in the tracking store.
const SUMMARY_EXPERIMENT: &str = "summary";

/// One importance row tagged with its experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    /// Feature name
    pub feature: String,
    /// Importance score
    pub importance: f64,
    /// Model name
    pub model: String,
    /// Experiment label
    pub experiment: String,
}

/// Features × (experiment, model) mean importances.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    /// Row keys, ascending
    pub features: Vec<String>,
    /// Column keys `experiment:model`, ascending by (experiment, model)
    pub columns: Vec<String>,
    /// `values[row][col]`; absent cells are 0.0
    pub values: Vec<Vec<f64>>,
}

/// Read every configured importance table that exists.
///
/// Rows of models outside `keep_models` are dropped.
///
/// # Errors
/// Returns [`Error::NoImportanceTables`] if no table was found, or a read
/// error for a table that exists but cannot be parsed
pub fn collect_importances(dir: &Path, config: &SummaryConfig) -> Result<Vec<SummaryRow>> {
    let keep: BTreeSet<&str> = config.keep_models.iter().map(String::as_str).collect();
    let mut rows = Vec::new();
    let mut found = 0usize;

    for label in &config.labels {
        let path = dir.join(importance_table_file(label));
        if !path.exists() {
            warn!(path = %path.display(), "missing importance table, skipped");
            continue;
        }
        found += 1;

        let batch = storage::load_table(&path)?;
        let features = string_column(&batch, "feature")?;
        let models = string_column(&batch, "model")?;
        let scores = numeric_column(&batch, "importance")?;
        for row in 0..batch.num_rows() {
            if models.is_null(row) || features.is_null(row) {
                continue;
            }
            let model = models.value(row);
            let Some(importance) = cell(&scores, row) else {
                continue;
            };
            if keep.contains(model) {
                rows.push(SummaryRow {
                    feature: features.value(row).to_string(),
                    importance,
                    model: model.to_string(),
                    experiment: label.clone(),
                });
            }
        }
    }

    if found == 0 {
        return Err(Error::NoImportanceTables);
    }
    Ok(rows)
}

/// Top `n` rows per (experiment, model), ordered by experiment and model
/// ascending then importance descending.
#[must_use]
pub fn top_n_per_group(mut rows: Vec<SummaryRow>, n: usize) -> Vec<SummaryRow> {
    rows.sort_by(|a, b| {
        a.experiment
            .cmp(&b.experiment)
            .then_with(|| a.model.cmp(&b.model))
            .then_with(|| b.importance.total_cmp(&a.importance))
    });

    let mut taken: BTreeMap<(String, String), usize> = BTreeMap::new();
    rows.retain(|r| {
        let count = taken
            .entry((r.experiment.clone(), r.model.clone()))
            .or_insert(0);
        *count += 1;
        *count <= n
    });
    rows
}

/// Pivot rows to features × `experiment:model`, averaging duplicates.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn pivot_wide(rows: &[SummaryRow]) -> WideTable {
    let mut cells: BTreeMap<(&str, (&str, &str)), (f64, usize)> = BTreeMap::new();
    let mut features = BTreeSet::new();
    let mut groups = BTreeSet::new();
    for r in rows {
        let group = (r.experiment.as_str(), r.model.as_str());
        features.insert(r.feature.as_str());
        groups.insert(group);
        let acc = cells.entry((r.feature.as_str(), group)).or_insert((0.0, 0));
        acc.0 += r.importance;
        acc.1 += 1;
    }

    let values = features
        .iter()
        .map(|&f| {
            groups
                .iter()
                .map(|&g| cells.get(&(f, g)).map_or(0.0, |&(sum, n)| sum / n as f64))
                .collect()
        })
        .collect();

    WideTable {
        features: features.into_iter().map(String::from).collect(),
        columns: groups.into_iter().map(|(e, m)| format!("{e}:{m}")).collect(),
        values,
    }
}

/// Run the summary over `results_dir` and write both tables there.
///
/// # Errors
/// Returns [`Error::NoImportanceTables`] if nothing was found, or an I/O
/// error while reading or writing
pub fn summarize(results_dir: &Path, config: &SummaryConfig) -> Result<Vec<ArtifactRecord>> {
    let rows = collect_importances(results_dir, config)?;
    let top = top_n_per_group(rows, config.top_n);
    let wide = pivot_wide(&top);
    info!(
        rows = top.len(),
        features = wide.features.len(),
        groups = wide.columns.len(),
        "summarized feature importances"
    );

    let writer = ArtifactWriter::new(results_dir);
    Ok(vec![
        writer.write_table(
            SUMMARY_EXPERIMENT,
            SUMMARY_TOP_FILE,
            ArtifactKind::ImportanceSummary,
            &long_batch(&top)?,
        )?,
        writer.write_table(
            SUMMARY_EXPERIMENT,
            SUMMARY_WIDE_FILE,
            ArtifactKind::ImportanceSummary,
            &wide_batch(&wide)?,
        )?,
    ])
}

fn long_batch(rows: &[SummaryRow]) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("feature", DataType::Utf8, false),
        Field::new("importance", DataType::Float64, false),
        Field::new("model", DataType::Utf8, false),
        Field::new("experiment", DataType::Utf8, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.feature.as_str()))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.importance))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.model.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.experiment.as_str()))),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}

fn wide_batch(table: &WideTable) -> Result<RecordBatch> {
    let mut fields = vec![Field::new("feature", DataType::Utf8, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from_iter_values(
        table.features.iter().map(String::as_str),
    ))];
    for (j, name) in table.columns.iter().enumerate() {
        fields.push(Field::new(name.as_str(), DataType::Float64, false));
        columns.push(Arc::new(Float64Array::from_iter_values(
            table.values.iter().map(|row| row[j]),
        )));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::importance_batch;
    use crate::evaluation::ImportanceRecord;
    use crate::storage::load_table;

    fn record(feature: &str, importance: f64, model: &str) -> ImportanceRecord {
        ImportanceRecord {
            feature: feature.into(),
            importance,
            model: model.into(),
        }
    }

    fn write(dir: &Path, label: &str, records: &[ImportanceRecord]) {
        storage::write_csv(
            dir.join(importance_table_file(label)),
            &importance_batch(records).unwrap(),
        )
        .unwrap();
    }

    fn config(labels: &[&str], top_n: usize) -> SummaryConfig {
        SummaryConfig {
            labels: labels.iter().map(|s| (*s).to_string()).collect(),
            top_n,
            ..SummaryConfig::default()
        }
    }

    #[test]
    fn test_no_tables_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = summarize(dir.path(), &SummaryConfig::default()).unwrap_err();
        assert!(matches!(err, Error::NoImportanceTables));
    }

    #[test]
    fn test_filters_models_and_tags_experiment() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "baseline",
            &[
                record("log_dist", 0.6, "RandomForest"),
                record("contig", 0.4, "RandomForest"),
                record("log_dist", 0.9, "ExtraTrees"),
            ],
        );

        let rows = collect_importances(dir.path(), &config(&["baseline", "absent"], 10)).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.experiment == "baseline" && r.model == "RandomForest"));
    }

    #[test]
    fn test_default_keeps_xgboost_tables() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "baseline",
            &[
                record("log_gdp_o", 0.7, "XGBoost"),
                record("log_gdp_o", 0.5, "GradientBoosting"),
                record("log_gdp_o", 0.2, "Lasso"),
            ],
        );

        let rows = collect_importances(dir.path(), &config(&["baseline"], 10)).unwrap();
        let models: Vec<&str> = rows.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(models, vec!["XGBoost", "GradientBoosting"]);
    }

    #[test]
    fn test_top_n_per_group_ordering() {
        let rows = vec![
            SummaryRow { feature: "a".into(), importance: 0.1, model: "RandomForest".into(), experiment: "x".into() },
            SummaryRow { feature: "b".into(), importance: 0.7, model: "RandomForest".into(), experiment: "x".into() },
            SummaryRow { feature: "c".into(), importance: 0.2, model: "RandomForest".into(), experiment: "x".into() },
            SummaryRow { feature: "a".into(), importance: 0.5, model: "GradientBoosting".into(), experiment: "x".into() },
        ];
        let top = top_n_per_group(rows, 2);
        let got: Vec<(&str, &str)> = top.iter().map(|r| (r.model.as_str(), r.feature.as_str())).collect();
        assert_eq!(
            got,
            vec![("GradientBoosting", "a"), ("RandomForest", "b"), ("RandomForest", "c")]
        );
    }

    #[test]
    fn test_pivot_fills_missing_with_zero() {
        let rows = vec![
            SummaryRow { feature: "log_dist".into(), importance: 0.6, model: "RandomForest".into(), experiment: "interactions".into() },
            SummaryRow { feature: "contig".into(), importance: 0.3, model: "GradientBoosting".into(), experiment: "baseline".into() },
        ];
        let wide = pivot_wide(&rows);
        assert_eq!(wide.features, vec!["contig", "log_dist"]);
        assert_eq!(wide.columns, vec!["baseline:GradientBoosting", "interactions:RandomForest"]);
        assert_eq!(wide.values, vec![vec![0.3, 0.0], vec![0.0, 0.6]]);
    }

    #[test]
    fn test_summarize_writes_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        let ranked: Vec<_> = (0..12)
            .map(|i| record(&format!("f{i:02}"), f64::from(i) / 100.0, "RandomForest"))
            .collect();
        write(dir.path(), "baseline", &ranked);
        write(dir.path(), "interactions", &[record("f00", 1.0, "GradientBoosting")]);

        let records = summarize(dir.path(), &config(&["baseline", "interactions"], 10)).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind() == ArtifactKind::ImportanceSummary));

        let long = load_table(dir.path().join(SUMMARY_TOP_FILE)).unwrap();
        assert_eq!(long.num_rows(), 11);
        let first = string_column(&long, "feature").unwrap();
        assert_eq!(first.value(0), "f11");

        let wide = load_table(dir.path().join(SUMMARY_WIDE_FILE)).unwrap();
        assert_eq!(wide.num_columns(), 3);
        assert_eq!(wide.schema().field(1).name(), "baseline:RandomForest");
        assert_eq!(wide.num_rows(), 11);
    }
}
