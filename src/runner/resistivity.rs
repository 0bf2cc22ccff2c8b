//! Aggregation of repeated resistivity readings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One field of a bridge reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    /// Numeric measurement.
    Number(f64),
    /// Anything else the device reports (status words, units, ...).
    Text(String),
}

impl ReadingValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            ReadingValue::Number(value) => Some(*value),
            ReadingValue::Text(_) => None,
        }
    }
}

impl From<f64> for ReadingValue {
    fn from(value: f64) -> Self {
        ReadingValue::Number(value)
    }
}

impl From<&str> for ReadingValue {
    fn from(value: &str) -> Self {
        ReadingValue::Text(value.to_string())
    }
}

/// A single flat reading from the bridge, keyed by field name.
pub type Reading = BTreeMap<String, ReadingValue>;

/// Per-field statistics over a series of readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Fields with at least one non-numeric value, passed through unchanged.
    pub non_numeric: BTreeMap<String, Vec<ReadingValue>>,
    /// Arithmetic mean per numeric field.
    pub mean: BTreeMap<String, f64>,
    /// Median per numeric field.
    pub median: BTreeMap<String, f64>,
    /// Population standard deviation per numeric field.
    pub stddev: BTreeMap<String, f64>,
}

/// Result of aggregating a reading series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateReport {
    /// Statistics for every intact field.
    pub aggregate: Aggregate,
    /// Fields of the first reading missing from at least one later reading.
    pub corrupted: Vec<String>,
}

/// Transpose `readings` per field and compute statistics.
///
/// The field set is taken from the first reading. A field absent from any
/// other reading is reported as corrupted and left out of the aggregate.
pub fn aggregate(readings: &[Reading]) -> AggregateReport {
    let mut report = AggregateReport::default();
    let Some(first) = readings.first() else {
        return report;
    };

    for key in first.keys() {
        let column: Option<Vec<ReadingValue>> =
            readings.iter().map(|reading| reading.get(key).cloned()).collect();
        let Some(column) = column else {
            report.corrupted.push(key.clone());
            continue;
        };

        let numbers: Option<Vec<f64>> = column.iter().map(ReadingValue::as_number).collect();
        match numbers {
            Some(numbers) => {
                let stats = &mut report.aggregate;
                stats.mean.insert(key.clone(), mean(&numbers));
                stats.median.insert(key.clone(), median(&numbers));
                stats.stddev.insert(key.clone(), population_stddev(&numbers));
            }
            None => {
                report.aggregate.non_numeric.insert(key.clone(), column);
            }
        }
    }
    report
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn population_stddev(values: &[f64]) -> f64 {
    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(fields: &[(&str, ReadingValue)]) -> Reading {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn statistics_over_numeric_fields() {
        let readings: Vec<Reading> = [1.0, 2.0, 3.0]
            .into_iter()
            .map(|r: f64| reading(&[("res1", ReadingValue::from(r))]))
            .collect();
        let report = aggregate(&readings);
        assert!(report.corrupted.is_empty());
        assert_eq!(report.aggregate.mean["res1"], 2.0);
        assert_eq!(report.aggregate.median["res1"], 2.0);
        assert!((report.aggregate.stddev["res1"] - 0.816_496_580_927_726).abs() < 1e-12);
    }

    #[test]
    fn non_numeric_fields_pass_through() {
        let readings = vec![
            reading(&[("status", "ok".into()), ("res1", ReadingValue::Number(4.0))]),
            reading(&[("status", ReadingValue::Number(1.0)), ("res1", ReadingValue::Number(6.0))]),
        ];
        let report = aggregate(&readings);
        assert_eq!(
            report.aggregate.non_numeric["status"],
            vec![ReadingValue::Text("ok".into()), ReadingValue::Number(1.0)]
        );
        assert_eq!(report.aggregate.median["res1"], 5.0);
        assert!(!report.aggregate.mean.contains_key("status"));
    }

    #[test]
    fn missing_fields_are_reported_per_field() {
        let readings = vec![
            reading(&[("res1", ReadingValue::Number(1.0)), ("exc1", ReadingValue::Number(10.0))]),
            reading(&[("res1", ReadingValue::Number(3.0))]),
        ];
        let report = aggregate(&readings);
        assert_eq!(report.corrupted, vec!["exc1".to_string()]);
        assert_eq!(report.aggregate.mean["res1"], 2.0);
        assert!(!report.aggregate.mean.contains_key("exc1"));
    }

    #[test]
    fn empty_series_yields_empty_aggregate() {
        let report = aggregate(&[]);
        assert_eq!(report, AggregateReport::default());
    }

    #[test]
    fn readings_deserialize_from_mixed_json() {
        let reading: Reading = serde_json::from_str(r#"{"res1": 5.0, "unit": "ohm"}"#).unwrap();
        assert_eq!(reading["res1"], ReadingValue::Number(5.0));
        assert_eq!(reading["unit"], ReadingValue::Text("ohm".into()));
    }
}
