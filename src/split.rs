//! Temporal Splitter
//!
//! Partitions the modeling dataset by year: training rows have
//! `year <= train_end_year`, test rows have `year >= test_start_year`.
//! There is no shuffling. A time boundary is the leakage guard (Poka-Yoke):
//! nothing dated after the training window can reach a model evaluated on it.
//! Two bounds rather than one cutoff let callers leave a gap between windows.

use crate::panel::columns;
use crate::panel::ModelingDataset;
use crate::storage::cell;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gravity covariates every experiment uses.
pub const BASE_FEATURES: [&str; 7] = [
    columns::LOG_GDP_O,
    columns::LOG_GDP_D,
    columns::LOG_DIST,
    columns::CONTIG,
    columns::COMLANG,
    columns::LOG_POP_O,
    columns::LOG_POP_D,
];

/// Interaction terms added when interactions are on.
pub const INTERACTION_FEATURES: [&str; 3] = [
    columns::LOG_GDP_O_X_LOG_GDP_D,
    columns::LOG_DIST_X_CONTIG,
    columns::LOG_DIST_X_COMLANG,
];

/// Which feature columns a split exposes.
///
/// A pure function of the interactions flag; never inferred from data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSet {
    /// The seven base covariates
    Base,
    /// Base covariates followed by the three interaction terms
    WithInteractions,
}

impl FeatureSet {
    /// Map the interactions flag to a feature set.
    #[must_use]
    pub const fn from_flag(use_interactions: bool) -> Self {
        if use_interactions {
            Self::WithInteractions
        } else {
            Self::Base
        }
    }

    /// Whether interaction terms are included.
    #[must_use]
    pub const fn uses_interactions(self) -> bool {
        matches!(self, Self::WithInteractions)
    }

    /// Column names, in model input order.
    #[must_use]
    pub fn columns(self) -> Vec<&'static str> {
        let mut cols = BASE_FEATURES.to_vec();
        if self.uses_interactions() {
            cols.extend_from_slice(&INTERACTION_FEATURES);
        }
        cols
    }
}

/// Dense row-major feature table with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    values: Vec<f64>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Build from row-major values.
    ///
    /// # Errors
    /// Returns error if there are no columns or `values` is not a whole
    /// number of rows
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::InvalidInput(
                "feature matrix needs at least one column".to_string(),
            ));
        }
        if values.len() % names.len() != 0 {
            return Err(Error::InvalidInput(format!(
                "{} values do not fill rows of {} columns",
                values.len(),
                names.len()
            )));
        }
        let n_rows = values.len() / names.len();
        Ok(Self {
            names,
            values,
            n_rows,
        })
    }

    /// Build from a list of rows.
    ///
    /// # Errors
    /// Returns error if any row length differs from the column count
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let width = names.len();
        let mut values = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                return Err(Error::LengthMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
            values.extend_from_slice(row);
        }
        Self::new(names, values)
    }

    /// Column names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of rows.
    #[must_use]
    pub const fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    /// Whether the matrix has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// One row.
    ///
    /// # Panics
    /// Panics if `i >= n_rows()`
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        let width = self.n_cols();
        &self.values[i * width..(i + 1) * width]
    }

    /// Iterate rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.n_cols())
    }

    /// Copy out one column.
    #[must_use]
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows().map(|r| r[j]).collect()
    }
}

/// Train/test partition of one experiment.
#[derive(Debug, Clone)]
pub struct Split {
    /// Feature set the matrices were built with
    pub feature_set: FeatureSet,
    /// Training features (`year <= train_end_year`)
    pub x_train: FeatureMatrix,
    /// Training target
    pub y_train: Vec<f64>,
    /// Test features (`year >= test_start_year`)
    pub x_test: FeatureMatrix,
    /// Test target
    pub y_test: Vec<f64>,
}

impl Split {
    /// Feature column names, shared by both partitions.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        self.x_train.names()
    }

    /// Training row count.
    #[must_use]
    pub fn train_len(&self) -> usize {
        self.y_train.len()
    }

    /// Test row count.
    #[must_use]
    pub fn test_len(&self) -> usize {
        self.y_test.len()
    }
}

/// Split the modeling dataset along a year boundary.
///
/// Rows missing any selected feature or the target are dropped first.
///
/// # Errors
/// Returns [`Error::EmptySplit`] with both partition sizes if either
/// partition is empty, or [`Error::MissingColumn`] if `target` is not a
/// float column of the dataset
pub fn temporal_split(
    dataset: &ModelingDataset,
    train_end_year: i64,
    test_start_year: i64,
    target: &str,
    feature_set: FeatureSet,
) -> Result<Split> {
    let feature_cols = feature_set.columns();
    let features = feature_cols
        .iter()
        .map(|name| dataset.numeric(name))
        .collect::<Result<Vec<_>>>()?;
    let target_col = dataset.numeric(target)?;
    let years = dataset.years();

    let mut train = PartitionBuilder::default();
    let mut test = PartitionBuilder::default();
    let mut incomplete = 0usize;
    let mut row_buf = Vec::with_capacity(features.len());

    for row in 0..dataset.num_rows() {
        row_buf.clear();
        row_buf.extend(features.iter().filter_map(|col| cell(col, row)));
        let y = cell(target_col, row);
        let (Some(y), true) = (y, row_buf.len() == features.len()) else {
            incomplete += 1;
            continue;
        };

        let year = years.value(row);
        if year <= train_end_year {
            train.push(&row_buf, y);
        }
        if year >= test_start_year {
            test.push(&row_buf, y);
        }
    }

    debug!(
        train_rows = train.targets.len(),
        test_rows = test.targets.len(),
        dropped_incomplete = incomplete,
        train_end_year,
        test_start_year,
        "temporal split"
    );

    if train.targets.is_empty() || test.targets.is_empty() {
        return Err(Error::EmptySplit {
            train_rows: train.targets.len(),
            test_rows: test.targets.len(),
        });
    }

    let names: Vec<String> = feature_cols.iter().map(ToString::to_string).collect();
    Ok(Split {
        feature_set,
        x_train: FeatureMatrix::new(names.clone(), train.values)?,
        y_train: train.targets,
        x_test: FeatureMatrix::new(names, test.values)?,
        y_test: test.targets,
    })
}

#[derive(Default)]
struct PartitionBuilder {
    values: Vec<f64>,
    targets: Vec<f64>,
}

impl PartitionBuilder {
    fn push(&mut self, row: &[f64], target: f64) {
        self.values.extend_from_slice(row);
        self.targets.push(target);
    }
}
