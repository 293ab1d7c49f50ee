//! Storage backend (Arrow CSV/Parquet)
//!
//! Raw panel files are read whole into a single Arrow `RecordBatch`:
//! - `.parquet` files keep their physical column types
//! - anything else is read as CSV with every column as nullable `Utf8`, so
//!   type coercion happens later and unparseable cells become nulls instead
//!   of aborting the load
//!
//! Result tables are written back as headed CSV.

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::compute::{cast_with_options, concat_batches, CastOptions};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

/// Rows per Arrow batch while streaming CSV input
const CSV_BATCH_ROWS: usize = 64 * 1024;

/// Load a raw table, dispatching on file extension.
///
/// # Errors
/// Returns [`Error::MissingInput`] if the path does not exist, or a storage
/// error if the file cannot be parsed.
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingInput(path.to_path_buf()));
    }

    let is_parquet = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"));

    if is_parquet {
        load_parquet(path)
    } else {
        load_csv(path)
    }
}

/// Load a Parquet file into one batch
///
/// # Errors
/// Returns error if file cannot be read or parsed
pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = File::open(path.as_ref())
        .map_err(|e| Error::StorageError(format!("Failed to open Parquet file: {e}")))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;
    let schema = builder.schema().clone();

    let reader = builder
        .build()
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch
            .map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))?;
        batches.push(batch);
    }

    Ok(concat_batches(&schema, &batches)?)
}

/// Load a headed CSV file into one batch with every column typed `Utf8`.
///
/// # Errors
/// Returns error if the file cannot be read or a record is malformed
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let mut file = File::open(path.as_ref())
        .map_err(|e| Error::StorageError(format!("Failed to open CSV file: {e}")))?;

    let format = Format::default().with_header(true);
    let (inferred, _) = format.infer_schema(&mut file, Some(1))?;
    let schema = Arc::new(Schema::new(
        inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    file.rewind()?;
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_format(format)
        .with_batch_size(CSV_BATCH_ROWS)
        .build(file)?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Write a batch as headed CSV, creating parent directories on demand.
///
/// Returns the number of bytes written.
///
/// # Errors
/// Returns error if the file cannot be created or written
pub fn write_csv<P: AsRef<Path>>(path: P, batch: &RecordBatch) -> Result<u64> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(batch)?;
    drop(writer);

    Ok(std::fs::metadata(path)?.len())
}

/// Look up a column by name.
///
/// # Errors
/// Returns [`Error::MissingColumn`] if the batch has no such column
pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::MissingColumn(name.to_string()))
}

/// Coerce a column to `Float64`; cells that fail to parse become nulls.
///
/// # Errors
/// Returns error if the column is missing or its type cannot be cast at all
pub fn numeric_column(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let casted = cast_with_options(column(batch, name)?, &DataType::Float64, &CastOptions::default())?;
    Ok(casted.as_primitive::<Float64Type>().clone())
}

/// Coerce a column to `Int64`; cells that fail to parse become nulls.
///
/// # Errors
/// Returns error if the column is missing or its type cannot be cast at all
pub fn integer_column(batch: &RecordBatch, name: &str) -> Result<Int64Array> {
    let col = column(batch, name)?;
    // Utf8 "2010.0" does not parse as an integer; go through Float64 first.
    let as_float = cast_with_options(col, &DataType::Float64, &CastOptions::default())?;
    let casted = cast_with_options(&as_float, &DataType::Int64, &CastOptions::default())?;
    Ok(casted.as_primitive::<Int64Type>().clone())
}

/// Coerce a column to `Utf8`.
///
/// # Errors
/// Returns error if the column is missing or cannot be rendered as text
pub fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let casted = cast_with_options(column(batch, name)?, &DataType::Utf8, &CastOptions::default())?;
    Ok(casted.as_string::<i32>().clone())
}

/// Value of a float cell, treating null and NaN alike as missing.
#[inline]
#[must_use]
pub fn cell(array: &Float64Array, row: usize) -> Option<f64> {
    if array.is_null(row) {
        return None;
    }
    let value = array.value(row);
    (!value.is_nan()).then_some(value)
}
