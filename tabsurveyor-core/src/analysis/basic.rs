//! Basic dataset report: name, size and field list.

use super::Analyzer;
use super::models::{AnalysisKind, AnalysisResult, MetricValue};
use crate::error::Result;
use crate::model::Dataset;

/// Describes the shape of a dataset without computing statistics.
///
/// Accepts an empty dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetProfile;

impl Analyzer for DatasetProfile {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Basic
    }

    fn analyze(&self, dataset: &Dataset) -> Result<AnalysisResult> {
        let mut result = AnalysisResult::new(self.kind(), dataset.name(), dataset.len());
        result.insert("dataset_name", dataset.name());
        result.insert("record_count", dataset.len());
        result.insert("field_count", dataset.fields().len());
        result.insert(
            "fields",
            MetricValue::List(
                dataset
                    .fields()
                    .iter()
                    .map(|field| MetricValue::from(field.as_str()))
                    .collect(),
            ),
        );
        Ok(result)
    }
}
