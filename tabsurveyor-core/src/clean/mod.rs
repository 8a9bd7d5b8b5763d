//! Dataset cleaning operators.
//!
//! Each operator takes a dataset and returns a new one together with a
//! [`CleanSummary`]. The input is never modified, and an empty result is
//! valid output. Operators compose freely; [`run_pipeline`] executes an
//! explicit list of steps in exactly the given order.

pub mod quality;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{CaseFold, CleanConfig};
use crate::error::{PipelineError, Result};
use crate::model::{Dataset, Record, Value, collapse_whitespace};

pub use quality::{
    FieldCompleteness, NumericValidation, QualityReport, quality_report, validate_numeric,
};

/// Outcome counters of one cleaning step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanSummary {
    /// Step name
    pub operation: String,
    /// Records before the step
    pub records_in: usize,
    /// Records after the step
    pub records_out: usize,
    /// Values replaced or rewritten in surviving records
    pub values_changed: usize,
}

impl CleanSummary {
    fn new(operation: &str, records_in: usize, records_out: usize, values_changed: usize) -> Self {
        Self {
            operation: operation.to_string(),
            records_in,
            records_out,
            values_changed,
        }
    }

    /// Number of records dropped by the step.
    pub fn records_removed(&self) -> usize {
        self.records_in.saturating_sub(self.records_out)
    }
}

impl fmt::Display for CleanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} records ({} removed, {} values changed)",
            self.operation,
            self.records_in,
            self.records_out,
            self.records_removed(),
            self.values_changed
        )
    }
}

/// How missing values are handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullStrategy {
    /// Drop every record that has at least one missing value
    Drop,
    /// Substitute missing values
    Fill {
        /// Per-field replacement text
        defaults: BTreeMap<String, String>,
        /// Replacement for fields without an explicit default
        fallback: Option<String>,
    },
}

impl NullStrategy {
    /// Fill every missing value with the same text.
    pub fn fill_all(value: impl Into<String>) -> Self {
        Self::Fill {
            defaults: BTreeMap::new(),
            fallback: Some(value.into()),
        }
    }
}

/// One step of a cleaning pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanStep {
    RemoveEmpty,
    Deduplicate,
    HandleNulls(NullStrategy),
    NormalizeText(Option<CaseFold>),
}

impl CleanStep {
    /// Short name used in summaries and history parameters.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RemoveEmpty => "remove_empty",
            Self::Deduplicate => "deduplicate",
            Self::HandleNulls(NullStrategy::Drop) => "drop_nulls",
            Self::HandleNulls(NullStrategy::Fill { .. }) => "fill_nulls",
            Self::NormalizeText(_) => "normalize_text",
        }
    }

    /// Applies the step to a dataset.
    pub fn apply(&self, dataset: &Dataset) -> Result<(Dataset, CleanSummary)> {
        match self {
            Self::RemoveEmpty => Ok(remove_empty(dataset)),
            Self::Deduplicate => Ok(deduplicate(dataset)),
            Self::HandleNulls(strategy) => handle_nulls(dataset, strategy),
            Self::NormalizeText(case_fold) => Ok(normalize_text(dataset, *case_fold)),
        }
    }
}

/// Removes records equal to an earlier one after normalization.
///
/// Text is compared trimmed, whitespace-collapsed and case-folded; numbers by
/// value; missing values equal each other. The first occurrence survives and
/// survivor order is preserved, so applying this twice changes nothing.
pub fn deduplicate(dataset: &Dataset) -> (Dataset, CleanSummary) {
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let survivors: Vec<Record> = dataset
        .records()
        .iter()
        .filter(|record| seen.insert(record.normalized_key()))
        .cloned()
        .collect();

    finish(dataset, "deduplicate", survivors, 0)
}

/// Removes records whose every value is missing.
pub fn remove_empty(dataset: &Dataset) -> (Dataset, CleanSummary) {
    let survivors: Vec<Record> = dataset
        .records()
        .iter()
        .filter(|record| !record.is_blank())
        .cloned()
        .collect();

    finish(dataset, "remove_empty", survivors, 0)
}

/// Drops or fills missing values.
///
/// # Errors
/// `UnknownField` if a fill default names a field outside the schema.
pub fn handle_nulls(dataset: &Dataset, strategy: &NullStrategy) -> Result<(Dataset, CleanSummary)> {
    match strategy {
        NullStrategy::Drop => Ok(drop_nulls(dataset)),
        NullStrategy::Fill { defaults, fallback } => {
            for field in defaults.keys() {
                dataset.schema().require(field)?;
            }

            let replacements: Vec<Option<&String>> = dataset
                .fields()
                .iter()
                .map(|field| defaults.get(field).or(fallback.as_ref()))
                .collect();

            let mut changed = 0;
            let records = dataset
                .records()
                .iter()
                .map(|record| {
                    let values = record
                        .values()
                        .iter()
                        .zip(&replacements)
                        .map(|(value, replacement)| match replacement {
                            Some(text) if value.is_missing() => {
                                changed += 1;
                                Value::text(text.as_str())
                            }
                            _ => value.clone(),
                        })
                        .collect();
                    Record::new(values)
                })
                .collect();

            Ok(finish(dataset, "fill_nulls", records, changed))
        }
    }
}

/// Trims and collapses whitespace in text values, optionally folding case.
///
/// Fields whose non-missing values are all numeric or all ISO dates
/// (`YYYY-MM-DD`) are left untouched, as are missing values.
pub fn normalize_text(dataset: &Dataset, case_fold: Option<CaseFold>) -> (Dataset, CleanSummary) {
    let eligible: Vec<bool> = dataset
        .fields()
        .iter()
        .map(|field| is_free_text_field(dataset, field))
        .collect();

    let mut changed = 0;
    let records = dataset
        .records()
        .iter()
        .map(|record| {
            let values = record
                .values()
                .iter()
                .zip(&eligible)
                .map(|(value, eligible)| match value {
                    Value::Text(text) if *eligible && !value.is_missing() => {
                        let normalized = normalize_one(text, case_fold);
                        if normalized != *text {
                            changed += 1;
                        }
                        Value::Text(normalized)
                    }
                    _ => value.clone(),
                })
                .collect();
            Record::new(values)
        })
        .collect();

    finish(dataset, "normalize_text", records, changed)
}

/// Remove-empty, deduplicate, drop nulls, then normalize text.
pub fn full_clean(dataset: &Dataset, config: &CleanConfig) -> (Dataset, Vec<CleanSummary>) {
    let (after_empty, empty_summary) = remove_empty(dataset);
    let (after_dedup, dedup_summary) = deduplicate(&after_empty);
    let (after_nulls, null_summary) = drop_nulls(&after_dedup);
    let (cleaned, normalize_summary) = normalize_text(&after_nulls, config.case_fold);

    info!(
        "Full clean of '{}': {} -> {} records",
        dataset.name(),
        dataset.len(),
        cleaned.len()
    );
    (
        cleaned,
        vec![empty_summary, dedup_summary, null_summary, normalize_summary],
    )
}

/// Runs `steps` in the given order.
pub fn run_pipeline(dataset: &Dataset, steps: &[CleanStep]) -> Result<(Dataset, Vec<CleanSummary>)> {
    let mut current = dataset.clone();
    let mut summaries = Vec::with_capacity(steps.len());

    for step in steps {
        let (next, summary) = step.apply(&current)?;
        summaries.push(summary);
        current = next;
    }

    Ok((current, summaries))
}

fn drop_nulls(dataset: &Dataset) -> (Dataset, CleanSummary) {
    let survivors: Vec<Record> = dataset
        .records()
        .iter()
        .filter(|record| !record.has_missing())
        .cloned()
        .collect();
    finish(dataset, "drop_nulls", survivors, 0)
}

fn finish(
    dataset: &Dataset,
    operation: &str,
    records: Vec<Record>,
    values_changed: usize,
) -> (Dataset, CleanSummary) {
    let summary = CleanSummary::new(operation, dataset.len(), records.len(), values_changed);
    debug!("{}", summary);
    (dataset.derive(records), summary)
}

fn normalize_one(text: &str, case_fold: Option<CaseFold>) -> String {
    let collapsed = collapse_whitespace(text);
    match case_fold {
        Some(CaseFold::Lower) => collapsed.to_lowercase(),
        Some(CaseFold::Upper) => collapsed.to_uppercase(),
        None => collapsed,
    }
}

fn is_free_text_field(dataset: &Dataset, field: &str) -> bool {
    let Ok(values) = dataset.present_values(field) else {
        return false;
    };
    if values.is_empty() {
        return false;
    }
    let all_numeric = values.iter().all(|v| v.as_f64().is_some());
    let all_dates = values.iter().all(|v| v.as_text().is_some_and(is_iso_date));
    !(all_numeric || all_dates)
}

fn is_iso_date(text: &str) -> bool {
    let text = text.trim();
    text.len() == 10 && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}
