//! Evaluation and diagnostics
//!
//! Pure computations over paired true/predicted vectors:
//! - accuracy metrics (RMSE, R²) and the per-experiment metrics table
//! - residual diagnostics (residual vs fitted, fixed-bin histogram)
//! - feature-importance ranking and top-K selection
//!
//! The structs here are plot-friendly data products; writing them to disk is
//! [`crate::artifacts`]' job.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Bars kept in a per-model importance chart
pub const IMPORTANCE_TOP_K: usize = 15;

/// Bin count of the residual histogram
pub const RESIDUAL_HIST_BINS: usize = 50;

fn check_pair(y_true: &[f64], y_pred: &[f64]) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(Error::LengthMismatch {
            expected: y_true.len(),
            actual: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(Error::InvalidInput(
            "metrics need at least one observation".to_string(),
        ));
    }
    Ok(())
}

/// Root mean squared error.
///
/// # Errors
/// Returns error if lengths differ or the vectors are empty
#[allow(clippy::cast_precision_loss)]
pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_pair(y_true, y_pred)?;
    let sse: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Ok((sse / y_true.len() as f64).sqrt())
}

/// Coefficient of determination `1 − SS_res / SS_tot`.
///
/// NaN when the true values have zero variance; callers must tolerate it.
///
/// # Errors
/// Returns error if lengths differ or the vectors are empty
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Result<f64> {
    check_pair(y_true, y_pred)?;
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return Ok(f64::NAN);
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// RMSE and R² of one prediction vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Root mean squared error
    pub rmse: f64,
    /// Coefficient of determination
    pub r2: f64,
}

/// Compute both accuracy metrics.
///
/// # Errors
/// Returns error if lengths differ or the vectors are empty
pub fn evaluate_regression(y_true: &[f64], y_pred: &[f64]) -> Result<RegressionMetrics> {
    Ok(RegressionMetrics {
        rmse: rmse(y_true, y_pred)?,
        r2: r2_score(y_true, y_pred)?,
    })
}

/// One row of a metrics table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    /// Model name
    pub model: String,
    /// Root mean squared error
    pub rmse: f64,
    /// Coefficient of determination
    pub r2: f64,
}

/// Per-experiment metrics, one row per model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsTable {
    rows: Vec<MetricRow>,
}

impl MetricsTable {
    /// Create an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Append a model's metrics.
    pub fn push(&mut self, model: impl Into<String>, metrics: RegressionMetrics) {
        self.rows.push(MetricRow {
            model: model.into(),
            rmse: metrics.rmse,
            r2: metrics.r2,
        });
    }

    /// Rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    /// Rows ascending by RMSE; ties keep insertion order.
    #[must_use]
    pub fn sorted(&self) -> Vec<MetricRow> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| a.rmse.total_cmp(&b.rmse));
        rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// `true − predicted`, elementwise.
///
/// # Errors
/// Returns error if lengths differ
pub fn residuals(y_true: &[f64], y_pred: &[f64]) -> Result<Vec<f64>> {
    if y_true.len() != y_pred.len() {
        return Err(Error::LengthMismatch {
            expected: y_true.len(),
            actual: y_pred.len(),
        });
    }
    Ok(y_true.iter().zip(y_pred).map(|(t, p)| t - p).collect())
}

/// Equal-width frequency histogram (plot-friendly JSON).
///
/// `edges` has `counts.len() + 1` entries. Every bin is half-open except the
/// last, which includes its right edge. A constant sample is centered in a
/// unit-wide range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin edges, ascending
    pub edges: Vec<f64>,
    /// Observations per bin
    pub counts: Vec<u64>,
}

impl Histogram {
    /// Bin finite `values` into `bins` equal-width bins.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if `bins` is zero or no value is finite
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::float_cmp
    )]
    pub fn new(values: &[f64], bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(Error::InvalidInput("histogram needs at least one bin".to_string()));
        }
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let (mut lo, mut hi) = finite
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if finite.is_empty() {
            return Err(Error::InvalidInput("histogram needs finite values".to_string()));
        }
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0u64; bins];
        for v in finite {
            let idx = (((v - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Ok(Self { edges, counts })
    }

    /// Total observations binned.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Residual-vs-fitted scatter data (plot-friendly JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualScatter {
    /// Model the residuals belong to
    pub model: String,
    /// Predicted values (x axis)
    pub fitted: Vec<f64>,
    /// `true − predicted` (y axis)
    pub residuals: Vec<f64>,
}

/// Both residual diagnostics of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualDiagnostics {
    /// Residual vs fitted scatter
    pub scatter: ResidualScatter,
    /// Residual frequency histogram
    pub histogram: Histogram,
}

impl ResidualDiagnostics {
    /// Compute residual diagnostics with [`RESIDUAL_HIST_BINS`] bins.
    ///
    /// # Errors
    /// Returns error if lengths differ or there are no finite residuals
    pub fn compute(model: &str, y_true: &[f64], y_pred: &[f64]) -> Result<Self> {
        let res = residuals(y_true, y_pred)?;
        let histogram = Histogram::new(&res, RESIDUAL_HIST_BINS)?;
        Ok(Self {
            scatter: ResidualScatter {
                model: model.to_string(),
                fitted: y_pred.to_vec(),
                residuals: res,
            },
            histogram,
        })
    }
}

/// Predicted-vs-actual scatter data (plot-friendly JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredVsActual {
    /// Model the predictions belong to
    pub model: String,
    /// True values (x axis)
    pub actual: Vec<f64>,
    /// Predicted values (y axis)
    pub predicted: Vec<f64>,
}

impl PredVsActual {
    /// Pair actual and predicted values.
    ///
    /// # Errors
    /// Returns error if lengths differ
    pub fn new(model: &str, actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(Error::LengthMismatch {
                expected: actual.len(),
                actual: predicted.len(),
            });
        }
        Ok(Self {
            model: model.to_string(),
            actual: actual.to_vec(),
            predicted: predicted.to_vec(),
        })
    }
}

/// One feature's importance score under one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceRecord {
    /// Feature name
    pub feature: String,
    /// Importance score
    pub importance: f64,
    /// Model name
    pub model: String,
}

/// Rank features by descending importance; equal scores keep column order.
///
/// # Errors
/// Returns error if the name and score counts differ
pub fn rank_importances(
    features: &[String],
    scores: &[f64],
    model: &str,
) -> Result<Vec<ImportanceRecord>> {
    if features.len() != scores.len() {
        return Err(Error::LengthMismatch {
            expected: features.len(),
            actual: scores.len(),
        });
    }
    let mut ranked: Vec<ImportanceRecord> = features
        .iter()
        .zip(scores)
        .map(|(f, &s)| ImportanceRecord {
            feature: f.clone(),
            importance: s,
            model: model.to_string(),
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    Ok(ranked)
}

/// First `k` records of a ranking (fewer if the ranking is shorter).
///
/// # Errors
/// Returns [`Error::InvalidInput`] if `k` is zero
pub fn top_k(ranked: &[ImportanceRecord], k: usize) -> Result<&[ImportanceRecord]> {
    if k == 0 {
        return Err(Error::InvalidInput("k must be positive".to_string()));
    }
    Ok(&ranked[..k.min(ranked.len())])
}

/// Horizontal bar-chart data for a top-K ranking (plot-friendly JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceChart {
    /// Model name
    pub model: String,
    /// Experiment label
    pub experiment: String,
    /// Feature names, most important first
    pub features: Vec<String>,
    /// Scores aligned with `features`
    pub importances: Vec<f64>,
}

impl ImportanceChart {
    /// Build chart data from ranked records.
    #[must_use]
    pub fn new(model: &str, experiment: &str, records: &[ImportanceRecord]) -> Self {
        let mut features = Vec::with_capacity(records.len());
        let mut importances = Vec::with_capacity(records.len());
        for r in records {
            features.push(r.feature.clone());
            importances.push(r.importance);
        }
        Self {
            model: model.to_string(),
            experiment: experiment.to_string(),
            features,
            importances,
        }
    }
}
