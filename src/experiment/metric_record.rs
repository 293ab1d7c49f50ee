//! Metric Record - accuracy values of a run

use crate::evaluation::RegressionMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Key of the RMSE metric
pub const RMSE: &str = "rmse";
/// Key of the R² metric
pub const R2: &str = "r2";

/// One named metric value of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    run_id: String,
    key: String,
    // JSON has no NaN: an undefined R² is written as null
    #[serde(deserialize_with = "nan_from_null")]
    value: f64,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a metric record with the current timestamp.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, value: f64) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            value,
            timestamp: Utc::now(),
        }
    }

    /// Both accuracy metrics of a run, RMSE first.
    #[must_use]
    pub fn from_metrics(run_id: &str, metrics: &RegressionMetrics) -> [Self; 2] {
        [
            Self::new(run_id, RMSE, metrics.rmse),
            Self::new(run_id, R2, metrics.r2),
        ]
    }

    /// Run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Metric key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Recording timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_record_new() {
        let metric = MetricRecord::new("baseline/Ridge", RMSE, 0.5);
        assert_eq!(metric.run_id(), "baseline/Ridge");
        assert_eq!(metric.key(), "rmse");
        assert!((metric.value() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_metrics() {
        let [rmse, r2] = MetricRecord::from_metrics(
            "baseline/Ridge",
            &RegressionMetrics { rmse: 1.2, r2: 0.7 },
        );
        assert_eq!(rmse.key(), RMSE);
        assert_eq!(r2.key(), R2);
        assert!((r2.value() - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_nan_value_survives_json() {
        let metric = MetricRecord::new("constant/Ridge", R2, f64::NAN);
        let json = serde_json::to_string(&metric).unwrap();
        assert!(json.contains("\"value\":null"));
        let back: MetricRecord = serde_json::from_str(&json).unwrap();
        assert!(back.value().is_nan());
    }
}
