//! Per-field descriptive statistics.

use std::collections::BTreeMap;

use tracing::info;

use super::models::{AnalysisKind, AnalysisResult, MetricValue};
use super::stats::{NumericSummary, extract_numeric, summarize};
use super::Analyzer;
use crate::error::{PipelineError, Result};
use crate::model::{Dataset, Value};

/// Computes numeric statistics for numeric fields and frequency statistics
/// for every other field.
///
/// A field is numeric when it has at least one present value and every
/// present value coerces to a finite number.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneralStatistics;

impl Analyzer for GeneralStatistics {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::General
    }

    fn analyze(&self, dataset: &Dataset) -> Result<AnalysisResult> {
        if dataset.is_empty() {
            return Err(PipelineError::empty_dataset("general statistics"));
        }

        let mut result = AnalysisResult::new(self.kind(), dataset.name(), dataset.len());
        let mut fields = BTreeMap::new();
        let mut numeric_fields = Vec::new();

        for field in dataset.fields() {
            let present = dataset.present_values(field)?;
            let numeric = extract_numeric(present.iter().copied());

            let stats = if !present.is_empty() && numeric.len() == present.len() {
                numeric_fields.push(MetricValue::from(field.as_str()));
                summarize(&numeric).map_or_else(|| categorical(&present), |s| numeric_metrics(&s))
            } else {
                categorical(&present)
            };
            fields.insert(field.clone(), stats);
        }

        result.insert("field_count", dataset.fields().len());
        result.insert("numeric_fields", MetricValue::List(numeric_fields));
        result.insert("fields", MetricValue::Map(fields));

        info!(
            "General statistics for '{}': {} records, {} fields",
            dataset.name(),
            dataset.len(),
            dataset.fields().len()
        );
        Ok(result)
    }
}

/// Names of the numeric fields of a dataset, in schema order.
pub fn numeric_fields(dataset: &Dataset) -> Vec<String> {
    dataset
        .fields()
        .iter()
        .filter(|field| {
            dataset.present_values(field).is_ok_and(|present| {
                !present.is_empty() && present.iter().all(|v| v.as_f64().is_some())
            })
        })
        .cloned()
        .collect()
}

fn numeric_metrics(summary: &NumericSummary) -> MetricValue {
    let mut map = BTreeMap::new();
    map.insert("type".to_string(), MetricValue::from("numeric"));
    map.insert("count".to_string(), MetricValue::from(summary.count));
    map.insert("sum".to_string(), MetricValue::from(summary.sum));
    map.insert("mean".to_string(), MetricValue::from(summary.mean));
    map.insert("median".to_string(), MetricValue::from(summary.median));
    map.insert("mode".to_string(), MetricValue::from(summary.mode));
    map.insert("min".to_string(), MetricValue::from(summary.min));
    map.insert("max".to_string(), MetricValue::from(summary.max));
    if let (Some(variance), Some(std_dev)) = (summary.variance, summary.std_dev) {
        map.insert("variance".to_string(), MetricValue::from(variance));
        map.insert("std_dev".to_string(), MetricValue::from(std_dev));
    }
    MetricValue::Map(map)
}

fn categorical(present: &[&Value]) -> MetricValue {
    let mut frequencies: BTreeMap<String, u64> = BTreeMap::new();
    for value in present {
        *frequencies.entry(value.label()).or_insert(0) += 1;
    }

    let mut map = BTreeMap::new();
    map.insert("type".to_string(), MetricValue::from("categorical"));
    map.insert("count".to_string(), MetricValue::from(present.len()));
    map.insert("unique".to_string(), MetricValue::from(frequencies.len()));

    // BTreeMap iterates in text order, so the first maximum is the smallest text
    let mut most_common: Option<(&String, u64)> = None;
    for (value, count) in &frequencies {
        if most_common.is_none_or(|(_, best)| *count > best) {
            most_common = Some((value, *count));
        }
    }
    if let Some((value, count)) = most_common {
        map.insert("most_common".to_string(), MetricValue::from(value.as_str()));
        map.insert("most_common_count".to_string(), MetricValue::Count(count));
    }

    map.insert(
        "distribution".to_string(),
        MetricValue::Map(
            frequencies
                .into_iter()
                .map(|(value, count)| (value, MetricValue::Count(count)))
                .collect(),
        ),
    );
    MetricValue::Map(map)
}
