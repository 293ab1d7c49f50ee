//! EU Subset Filter

use super::{columns, ModelingDataset};
use crate::storage::cell;
use crate::Result;
use arrow::array::BooleanArray;
use tracing::debug;

/// Keep only EU→EU pairs: rows where both membership flags equal 1.
///
/// A missing flag counts as non-EU, so such rows are excluded.
///
/// # Errors
/// Returns error only if the dataset lacks the EU flag columns, which the
/// modeling schema rules out
pub fn filter_eu_pairs(dataset: &ModelingDataset) -> Result<ModelingDataset> {
    let eu_o = dataset.numeric(columns::EU_O)?;
    let eu_d = dataset.numeric(columns::EU_D)?;

    let is_member = |v: Option<f64>| v == Some(1.0);
    let mask: BooleanArray = (0..dataset.num_rows())
        .map(|row| Some(is_member(cell(eu_o, row)) && is_member(cell(eu_d, row))))
        .collect();

    let filtered = dataset.filter(&mask)?;
    debug!(
        rows = dataset.num_rows(),
        eu_rows = filtered.num_rows(),
        "filtered EU pairs"
    );
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::ModelingRecord;

    fn record(eu_o: Option<f64>, eu_d: Option<f64>) -> ModelingRecord {
        ModelingRecord {
            year: 2015,
            iso3_o: None,
            iso3_d: None,
            eu_o,
            eu_d,
            contig: Some(0.0),
            comlang_off: Some(0.0),
            log_exports: 1.0,
            log_dist: 1.0,
            log_gdp_o: 1.0,
            log_gdp_d: 1.0,
            log_pop_o: 1.0,
            log_pop_d: 1.0,
            log_gdp_o_x_log_gdp_d: 1.0,
            log_dist_x_contig: Some(0.0),
            log_dist_x_comlang: Some(0.0),
        }
    }

    #[test]
    fn test_keeps_only_both_member_rows() {
        let dataset = ModelingDataset::from_records(&[
            record(Some(1.0), Some(1.0)),
            record(Some(1.0), Some(0.0)),
            record(Some(0.0), Some(1.0)),
            record(None, Some(1.0)),
            record(Some(1.0), None),
            record(Some(1.0), Some(1.0)),
        ])
        .unwrap();

        let eu = filter_eu_pairs(&dataset).unwrap();
        assert_eq!(eu.num_rows(), 2);
    }

    #[test]
    fn test_empty_input_stays_empty() {
        let dataset = ModelingDataset::from_records(&[]).unwrap();
        assert!(filter_eu_pairs(&dataset).unwrap().is_empty());
    }
}
