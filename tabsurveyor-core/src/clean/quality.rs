//! Data quality reporting.
//!
//! Completeness measures the share of present values per field; numeric
//! validation counts values that should be numbers but do not coerce.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::model::Dataset;

/// Completeness of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCompleteness {
    pub field: String,
    pub missing: usize,
    pub present: usize,
    /// Percentage of present values (0-100, two decimals)
    pub completeness: f64,
}

impl FieldCompleteness {
    fn new(field: &str, missing: usize, total: usize) -> Self {
        let present = total - missing;
        Self {
            field: field.to_string(),
            missing,
            present,
            completeness: percentage(present, total),
        }
    }
}

/// Completeness report over a whole dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub dataset: String,
    pub record_count: usize,
    pub field_count: usize,
    /// Per-field completeness in schema order
    pub fields: Vec<FieldCompleteness>,
    pub total_missing: usize,
    /// Present values over all cells, as a percentage
    pub overall_completeness: f64,
}

impl QualityReport {
    /// Fields with at least one missing value.
    pub fn incomplete_fields(&self) -> impl Iterator<Item = &FieldCompleteness> {
        self.fields.iter().filter(|f| f.missing > 0)
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Overall completeness: {:.2}%", self.overall_completeness)?;
        for field in self.incomplete_fields() {
            writeln!(
                f,
                "  {}: {} missing ({:.2}% complete)",
                field.field, field.missing, field.completeness
            )?;
        }
        Ok(())
    }
}

/// Per-field count of present values that fail numeric coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericValidation {
    pub record_count: usize,
    pub invalid_by_field: BTreeMap<String, usize>,
}

impl NumericValidation {
    /// Returns true if every checked field coerces everywhere.
    pub fn is_clean(&self) -> bool {
        self.invalid_by_field.values().all(|count| *count == 0)
    }
}

impl fmt::Display for NumericValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Numeric validation over {} records",
            self.record_count
        )?;
        for (field, invalid) in &self.invalid_by_field {
            write!(f, "\n  {}: {} non-numeric", field, invalid)?;
        }
        Ok(())
    }
}

/// Builds the completeness report.
///
/// # Errors
/// `EmptyDataset` when the dataset has no records.
pub fn quality_report(dataset: &Dataset) -> Result<QualityReport> {
    if dataset.is_empty() {
        return Err(PipelineError::empty_dataset("quality report"));
    }

    let total = dataset.len();
    let fields: Vec<FieldCompleteness> = dataset
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let missing = dataset
                .records()
                .iter()
                .filter(|record| record.get(index).is_none_or(|v| v.is_missing()))
                .count();
            FieldCompleteness::new(field, missing, total)
        })
        .collect();

    let total_missing: usize = fields.iter().map(|f| f.missing).sum();
    let cells = total * fields.len();

    Ok(QualityReport {
        dataset: dataset.name().to_string(),
        record_count: total,
        field_count: fields.len(),
        fields,
        total_missing,
        overall_completeness: percentage(cells - total_missing, cells),
    })
}

/// Counts present values in `fields` that are not numeric.
///
/// # Errors
/// `UnknownField` if a requested field is not in the schema.
pub fn validate_numeric(dataset: &Dataset, fields: &[String]) -> Result<NumericValidation> {
    let mut invalid_by_field = BTreeMap::new();
    for field in fields {
        let invalid = dataset
            .present_values(field)?
            .into_iter()
            .filter(|v| v.as_f64().is_none())
            .count();
        invalid_by_field.insert(field.clone(), invalid);
    }

    Ok(NumericValidation {
        record_count: dataset.len(),
        invalid_by_field,
    })
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    ((part as f64 / total as f64) * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_dataset() -> Dataset {
        Dataset::from_rows(
            "quality",
            ["id", "name", "price"],
            [
                vec!["1", "Ana", "10"],
                vec!["2", "", "abc"],
                vec!["3", "NULL", ""],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_completeness_per_field() {
        let report = quality_report(&create_dataset()).unwrap();

        assert_eq!(report.record_count, 3);
        assert_eq!(report.field_count, 3);
        assert_eq!(report.fields[0].missing, 0);
        assert!((report.fields[0].completeness - 100.0).abs() < 1e-9);
        assert_eq!(report.fields[1].missing, 2);
        assert!((report.fields[1].completeness - 33.33).abs() < 1e-9);
        assert_eq!(report.total_missing, 3);
        assert!((report.overall_completeness - 66.67).abs() < 1e-9);
        assert_eq!(report.incomplete_fields().count(), 2);
    }

    #[test]
    fn test_quality_report_empty_dataset() {
        let dataset = Dataset::from_rows("e", ["a"], Vec::<Vec<&str>>::new()).unwrap();
        assert!(matches!(
            quality_report(&dataset),
            Err(PipelineError::EmptyDataset { .. })
        ));
    }

    #[test]
    fn test_numeric_validation() {
        let result =
            validate_numeric(&create_dataset(), &["id".to_string(), "price".to_string()]).unwrap();

        assert_eq!(result.invalid_by_field["id"], 0);
        assert_eq!(result.invalid_by_field["price"], 1);
        assert!(!result.is_clean());
        assert_eq!(
            result.to_string(),
            "Numeric validation over 3 records\n  id: 0 non-numeric\n  price: 1 non-numeric"
        );
    }

    #[test]
    fn test_quality_report_lists_incomplete_fields() {
        let text = quality_report(&create_dataset()).unwrap().to_string();
        assert!(text.starts_with("Overall completeness: 66.67%\n"));
        assert!(text.contains("  name: 2 missing (33.33% complete)"));
        assert!(text.contains("  price: 1 missing (66.67% complete)"));
        assert!(!text.contains("  id:"));
    }

    #[test]
    fn test_numeric_validation_unknown_field() {
        let result = validate_numeric(&create_dataset(), &["cost".to_string()]);
        assert!(matches!(result, Err(PipelineError::UnknownField { .. })));
    }
}
