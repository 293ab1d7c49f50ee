//! Panel Loader/Cleaner
//!
//! Turns a raw (origin, destination, year) gravity panel into the modeling
//! dataset: one row per observation with log-transformed covariates and
//! three gravity interaction terms.
//!
//! Cleaning policy:
//! - Rows outside the requested year range are dropped
//! - `exports` comes from the first trade-flow column present, see
//!   [`columns::EXPORT_CANDIDATES`]
//! - Cells that fail numeric coercion become missing
//! - Rows missing exports, distance, either GDP or either population are dropped
//! - Rows where any of those is not strictly positive (or not finite) are dropped
//!
//! Dropped rows are not errors. They only show up as a smaller row count.

pub mod columns;
mod eu;

pub use eu::filter_eu_pairs;

use crate::storage::{self, cell};
use crate::{Error, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float64Array, Float64Builder, Int64Array, Int64Builder,
    StringArray, StringBuilder,
};
use arrow::compute::filter_record_batch;
use arrow::datatypes::{DataType, Field, Int64Type, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Inclusive range of panel years to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    /// First year kept
    pub start: i64,
    /// Last year kept
    pub end: i64,
}

impl YearRange {
    /// Create an inclusive year range.
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Whether `year` lies inside the range.
    #[must_use]
    pub const fn contains(&self, year: i64) -> bool {
        self.start <= year && year <= self.end
    }
}

/// Pick the trade-flow column that becomes `exports`.
///
/// Candidates are tried in preference order; the first present wins.
///
/// # Errors
/// Returns [`Error::MissingTargetColumn`] if no candidate is present
pub fn resolve_export_column(schema: &Schema) -> Result<&'static str> {
    columns::EXPORT_CANDIDATES
        .iter()
        .copied()
        .find(|name| schema.column_with_name(name).is_some())
        .ok_or_else(|| Error::MissingTargetColumn {
            candidates: columns::EXPORT_CANDIDATES
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
}

/// Load a gravity panel from disk and clean it.
///
/// # Errors
/// Returns [`Error::MissingInput`] if `path` does not exist, a storage error
/// if it cannot be parsed, or a column error if the schema lacks a required
/// column
pub fn load_gravity_data<P: AsRef<Path>>(path: P, years: YearRange) -> Result<ModelingDataset> {
    let raw = storage::load_table(path.as_ref())?;
    debug!(path = %path.as_ref().display(), rows = raw.num_rows(), "loaded raw panel");
    clean(&raw, years)
}

/// Clean an in-memory raw panel.
///
/// # Errors
/// Returns a column error if the schema lacks a required column, or
/// [`Error::MissingTargetColumn`] if no trade-flow column is present
pub fn clean(raw: &RecordBatch, years: YearRange) -> Result<ModelingDataset> {
    let export_column = resolve_export_column(raw.schema().as_ref())?;
    let raw_columns = RawColumns::extract(raw, export_column)?;

    let in_range: Vec<RawObservation> = (0..raw.num_rows())
        .map(|row| raw_columns.observation(row))
        .filter(|obs| obs.year.is_some_and(|y| years.contains(y)))
        .collect();

    let records: Vec<ModelingRecord> = in_range
        .into_iter()
        .filter_map(ModelingRecord::derive)
        .collect();

    debug!(
        export_column,
        raw_rows = raw.num_rows(),
        kept_rows = records.len(),
        start_year = years.start,
        end_year = years.end,
        "cleaned panel"
    );

    ModelingDataset::from_records(&records)
}

/// Raw columns after numeric coercion.
struct RawColumns {
    year: Int64Array,
    iso3_o: StringArray,
    iso3_d: StringArray,
    exports: Float64Array,
    dist: Float64Array,
    contig: Float64Array,
    comlang: Float64Array,
    pop_o: Float64Array,
    pop_d: Float64Array,
    gdp_o: Float64Array,
    gdp_d: Float64Array,
    eu_o: Float64Array,
    eu_d: Float64Array,
}

impl RawColumns {
    fn extract(raw: &RecordBatch, export_column: &str) -> Result<Self> {
        Ok(Self {
            year: storage::integer_column(raw, columns::YEAR)?,
            iso3_o: storage::string_column(raw, columns::ISO3_O)?,
            iso3_d: storage::string_column(raw, columns::ISO3_D)?,
            exports: storage::numeric_column(raw, export_column)?,
            dist: storage::numeric_column(raw, columns::DIST)?,
            contig: storage::numeric_column(raw, columns::CONTIG)?,
            comlang: storage::numeric_column(raw, columns::COMLANG)?,
            pop_o: storage::numeric_column(raw, columns::POP_O)?,
            pop_d: storage::numeric_column(raw, columns::POP_D)?,
            gdp_o: storage::numeric_column(raw, columns::GDP_O)?,
            gdp_d: storage::numeric_column(raw, columns::GDP_D)?,
            eu_o: storage::numeric_column(raw, columns::EU_O)?,
            eu_d: storage::numeric_column(raw, columns::EU_D)?,
        })
    }

    fn observation(&self, row: usize) -> RawObservation {
        let text = |array: &StringArray| (!array.is_null(row)).then(|| array.value(row).to_string());
        RawObservation {
            year: (!self.year.is_null(row)).then(|| self.year.value(row)),
            iso3_o: text(&self.iso3_o),
            iso3_d: text(&self.iso3_d),
            exports: cell(&self.exports, row),
            dist: cell(&self.dist, row),
            contig: cell(&self.contig, row),
            comlang_off: cell(&self.comlang, row),
            pop_o: cell(&self.pop_o, row),
            pop_d: cell(&self.pop_d, row),
            gdp_o: cell(&self.gdp_o, row),
            gdp_d: cell(&self.gdp_d, row),
            eu_o: cell(&self.eu_o, row),
            eu_d: cell(&self.eu_d, row),
        }
    }
}

/// One raw panel observation after coercion; `None` marks a missing cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawObservation {
    /// Observation year
    pub year: Option<i64>,
    /// Origin ISO3 code
    pub iso3_o: Option<String>,
    /// Destination ISO3 code
    pub iso3_d: Option<String>,
    /// Canonical exports value
    pub exports: Option<f64>,
    /// Bilateral distance
    pub dist: Option<f64>,
    /// Contiguity flag
    pub contig: Option<f64>,
    /// Common official language flag
    pub comlang_off: Option<f64>,
    /// Origin population
    pub pop_o: Option<f64>,
    /// Destination population
    pub pop_d: Option<f64>,
    /// Origin GDP
    pub gdp_o: Option<f64>,
    /// Destination GDP
    pub gdp_d: Option<f64>,
    /// Origin EU membership flag
    pub eu_o: Option<f64>,
    /// Destination EU membership flag
    pub eu_d: Option<f64>,
}

/// One row of the modeling dataset.
///
/// Log features are only ever computed from strictly positive, finite raw
/// values. Flags and the two flag interactions stay `None` when the raw
/// flag was missing; the splitter drops such rows when it needs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelingRecord {
    /// Observation year
    pub year: i64,
    /// Origin ISO3 code
    pub iso3_o: Option<String>,
    /// Destination ISO3 code
    pub iso3_d: Option<String>,
    /// Origin EU membership flag
    pub eu_o: Option<f64>,
    /// Destination EU membership flag
    pub eu_d: Option<f64>,
    /// Contiguity flag
    pub contig: Option<f64>,
    /// Common official language flag
    pub comlang_off: Option<f64>,
    /// ln(exports), the default target
    pub log_exports: f64,
    /// ln(distance)
    pub log_dist: f64,
    /// ln(origin GDP)
    pub log_gdp_o: f64,
    /// ln(destination GDP)
    pub log_gdp_d: f64,
    /// ln(origin population)
    pub log_pop_o: f64,
    /// ln(destination population)
    pub log_pop_d: f64,
    /// ln(GDP origin) × ln(GDP destination)
    pub log_gdp_o_x_log_gdp_d: f64,
    /// ln(distance) × contiguity
    pub log_dist_x_contig: Option<f64>,
    /// ln(distance) × common language
    pub log_dist_x_comlang: Option<f64>,
}

impl ModelingRecord {
    /// Derive a modeling row, or `None` if the observation must be excluded.
    #[must_use]
    pub fn derive(raw: RawObservation) -> Option<Self> {
        let positive = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);

        let year = raw.year?;
        let exports = positive(raw.exports)?;
        let dist = positive(raw.dist)?;
        let gdp_o = positive(raw.gdp_o)?;
        let gdp_d = positive(raw.gdp_d)?;
        let pop_o = positive(raw.pop_o)?;
        let pop_d = positive(raw.pop_d)?;

        let log_dist = dist.ln();
        let log_gdp_o = gdp_o.ln();
        let log_gdp_d = gdp_d.ln();

        Some(Self {
            year,
            iso3_o: raw.iso3_o,
            iso3_d: raw.iso3_d,
            eu_o: raw.eu_o,
            eu_d: raw.eu_d,
            contig: raw.contig,
            comlang_off: raw.comlang_off,
            log_exports: exports.ln(),
            log_dist,
            log_gdp_o,
            log_gdp_d,
            log_pop_o: pop_o.ln(),
            log_pop_d: pop_d.ln(),
            log_gdp_o_x_log_gdp_d: log_gdp_o * log_gdp_d,
            log_dist_x_contig: raw.contig.map(|c| log_dist * c),
            log_dist_x_comlang: raw.comlang_off.map(|c| log_dist * c),
        })
    }
}

/// The cleaned modeling table, held as a single Arrow batch.
///
/// Only the finalized columns exist; raw and intermediate columns are never
/// exposed downstream.
#[derive(Debug, Clone)]
pub struct ModelingDataset {
    batch: RecordBatch,
}

impl ModelingDataset {
    /// The fixed modeling schema.
    #[must_use]
    pub fn schema() -> SchemaRef {
        static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
        SCHEMA
            .get_or_init(|| {
                let mut fields = vec![
                    Field::new(columns::YEAR, DataType::Int64, false),
                    Field::new(columns::ISO3_O, DataType::Utf8, true),
                    Field::new(columns::ISO3_D, DataType::Utf8, true),
                ];
                fields.extend(
                    columns::NUMERIC
                        .iter()
                        .map(|name| Field::new(*name, DataType::Float64, true)),
                );
                Arc::new(Schema::new(fields))
            })
            .clone()
    }

    /// Build from modeling rows.
    ///
    /// # Errors
    /// Returns error if the Arrow batch cannot be assembled
    pub fn from_records(records: &[ModelingRecord]) -> Result<Self> {
        let n = records.len();
        let mut year = Int64Builder::with_capacity(n);
        let mut iso3_o = StringBuilder::with_capacity(n, n * 3);
        let mut iso3_d = StringBuilder::with_capacity(n, n * 3);
        let mut numeric: Vec<Float64Builder> = (0..columns::NUMERIC.len())
            .map(|_| Float64Builder::with_capacity(n))
            .collect();

        for r in records {
            year.append_value(r.year);
            iso3_o.append_option(r.iso3_o.as_deref());
            iso3_d.append_option(r.iso3_d.as_deref());

            // Same order as columns::NUMERIC
            let values = [
                r.eu_o,
                r.eu_d,
                r.contig,
                r.comlang_off,
                Some(r.log_exports),
                Some(r.log_dist),
                Some(r.log_gdp_o),
                Some(r.log_gdp_d),
                Some(r.log_pop_o),
                Some(r.log_pop_d),
                Some(r.log_gdp_o_x_log_gdp_d),
                r.log_dist_x_contig,
                r.log_dist_x_comlang,
            ];
            for (builder, value) in numeric.iter_mut().zip(values) {
                builder.append_option(value);
            }
        }

        let mut arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(year.finish()),
            Arc::new(iso3_o.finish()),
            Arc::new(iso3_d.finish()),
        ];
        arrays.extend(
            numeric
                .iter_mut()
                .map(|b| Arc::new(b.finish()) as Arc<dyn Array>),
        );

        let batch = RecordBatch::try_new(Self::schema(), arrays)?;
        Ok(Self { batch })
    }

    /// Wrap an existing batch, checking it carries the modeling schema.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] on a schema mismatch
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        if batch.schema() != Self::schema() {
            return Err(Error::InvalidInput(format!(
                "Schema mismatch: expected modeling schema, got {:?}",
                batch.schema()
            )));
        }
        Ok(Self { batch })
    }

    /// Underlying Arrow batch.
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Whether the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// The `year` column (column 0 of the fixed schema).
    #[must_use]
    pub fn years(&self) -> &Int64Array {
        self.batch.column(0).as_primitive::<Int64Type>()
    }

    /// A float column by name.
    ///
    /// # Errors
    /// Returns [`Error::MissingColumn`] if the name is not a float column
    pub fn numeric(&self, name: &str) -> Result<&Float64Array> {
        self.batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /// Smallest and largest year present.
    #[must_use]
    pub fn year_span(&self) -> Option<(i64, i64)> {
        let years = self.years();
        let min = years.values().iter().min()?;
        let max = years.values().iter().max()?;
        Some((*min, *max))
    }

    /// Keep the rows where `mask` is true.
    ///
    /// # Errors
    /// Returns error if the mask length differs from the row count
    pub fn filter(&self, mask: &BooleanArray) -> Result<Self> {
        if mask.len() != self.num_rows() {
            return Err(Error::LengthMismatch {
                expected: self.num_rows(),
                actual: mask.len(),
            });
        }
        Ok(Self {
            batch: filter_record_batch(&self.batch, mask)?,
        })
    }
}
