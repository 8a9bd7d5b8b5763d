//! Dataset transformation operators: filtering, sorting, grouping,
//! projection and truncation.
//!
//! Like the cleaning operators, every transformation derives a new dataset
//! and leaves its input untouched.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::model::{Dataset, Record, Schema, SortDirection, Value, compare_text};

/// Group key used for records whose group value is missing.
pub const NULL_GROUP: &str = "<null>";

/// Condition a field value must satisfy to keep its record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "value")]
pub enum Predicate {
    /// Trimmed text equality, or numeric equality when both sides coerce
    Equals(String),
    NotEquals(String),
    /// Case-insensitive substring
    Contains(String),
    /// Regular expression match against the raw text
    Matches(String),
    GreaterThan(f64),
    AtLeast(f64),
    LessThan(f64),
    AtMost(f64),
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(v) => write!(f, "= {}", v),
            Self::NotEquals(v) => write!(f, "!= {}", v),
            Self::Contains(v) => write!(f, "contains {}", v),
            Self::Matches(v) => write!(f, "matches {}", v),
            Self::GreaterThan(v) => write!(f, "> {}", v),
            Self::AtLeast(v) => write!(f, ">= {}", v),
            Self::LessThan(v) => write!(f, "< {}", v),
            Self::AtMost(v) => write!(f, "<= {}", v),
        }
    }
}

/// A predicate with its pattern compiled once per filter call.
enum Matcher<'a> {
    Equals(&'a str, Option<f64>),
    NotEquals(&'a str, Option<f64>),
    Contains(String),
    Regex(Regex),
    Compare(Ordering, bool, f64),
}

impl<'a> Matcher<'a> {
    fn compile(predicate: &'a Predicate) -> Result<Self> {
        let number = |s: &str| Value::text(s).as_f64();
        Ok(match predicate {
            Predicate::Equals(target) => Self::Equals(target.trim(), number(target)),
            Predicate::NotEquals(target) => Self::NotEquals(target.trim(), number(target)),
            Predicate::Contains(needle) => Self::Contains(needle.to_lowercase()),
            Predicate::Matches(pattern) => Self::Regex(Regex::new(pattern).map_err(|e| {
                PipelineError::invalid_argument(format!("Invalid pattern '{}': {}", pattern, e))
            })?),
            Predicate::GreaterThan(bound) => Self::Compare(Ordering::Greater, false, finite(*bound)?),
            Predicate::AtLeast(bound) => Self::Compare(Ordering::Greater, true, finite(*bound)?),
            Predicate::LessThan(bound) => Self::Compare(Ordering::Less, false, finite(*bound)?),
            Predicate::AtMost(bound) => Self::Compare(Ordering::Less, true, finite(*bound)?),
        })
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Equals(target, numeric) => text_or_number_eq(value, target, *numeric),
            Self::NotEquals(target, numeric) => !text_or_number_eq(value, target, *numeric),
            Self::Contains(needle) => display_text(value).to_lowercase().contains(needle.as_str()),
            Self::Regex(regex) => !value.is_missing() && regex.is_match(&value.label()),
            Self::Compare(wanted, inclusive, bound) => value.as_f64().is_some_and(|v| {
                let ordering = v.total_cmp(bound);
                ordering == *wanted || (*inclusive && ordering == Ordering::Equal)
            }),
        }
    }
}

fn finite(bound: f64) -> Result<f64> {
    if bound.is_finite() {
        Ok(bound)
    } else {
        Err(PipelineError::invalid_argument(format!(
            "Bound {} is not a finite number",
            bound
        )))
    }
}

fn display_text(value: &Value) -> String {
    if value.is_missing() {
        String::new()
    } else {
        value.label()
    }
}

fn text_or_number_eq(value: &Value, target: &str, numeric_target: Option<f64>) -> bool {
    if let (Some(left), Some(right)) = (value.as_f64(), numeric_target) {
        return left == right;
    }
    display_text(value).trim() == target
}

/// Keeps records whose `field` satisfies `predicate`.
///
/// # Errors
/// `UnknownField` if the field is not in the schema; `InvalidArgument` for a
/// bad regular expression or a non-finite comparison bound.
pub fn filter_by_field(dataset: &Dataset, field: &str, predicate: &Predicate) -> Result<Dataset> {
    let index = dataset.schema().require(field)?;
    let matcher = Matcher::compile(predicate)?;

    let kept: Vec<Record> = dataset
        .records()
        .iter()
        .filter(|record| record.get(index).is_some_and(|v| matcher.matches(v)))
        .cloned()
        .collect();

    debug!(
        "Filter {} {}: kept {} of {} records",
        field,
        predicate,
        kept.len(),
        dataset.len()
    );
    Ok(dataset.derive(kept))
}

/// Keeps records whose `field` coerces to a number within `[min, max]`.
///
/// # Errors
/// `InvalidArgument` if either bound is not finite or `min > max`;
/// `UnknownField` if the field is not in the schema.
pub fn filter_by_range(dataset: &Dataset, field: &str, min: f64, max: f64) -> Result<Dataset> {
    let min = finite(min)?;
    let max = finite(max)?;
    if min > max {
        return Err(PipelineError::invalid_argument(format!(
            "Range minimum {} is greater than maximum {}",
            min, max
        )));
    }
    let index = dataset.schema().require(field)?;

    let kept: Vec<Record> = dataset
        .records()
        .iter()
        .filter(|record| {
            record
                .get(index)
                .and_then(Value::as_f64)
                .is_some_and(|v| (min..=max).contains(&v))
        })
        .cloned()
        .collect();

    debug!(
        "Range filter {} in [{}, {}]: kept {} of {} records",
        field,
        min,
        max,
        kept.len(),
        dataset.len()
    );
    Ok(dataset.derive(kept))
}

/// Stable sort on one field.
///
/// Values compare numerically when every record's value coerces, otherwise
/// as text with missing values sorting as empty text. Records with equal keys
/// keep their input order in both directions.
pub fn sort_by_field(dataset: &Dataset, field: &str, direction: SortDirection) -> Result<Dataset> {
    let index = dataset.schema().require(field)?;
    let mut records = dataset.records().to_vec();

    let numeric: Option<Vec<f64>> = records
        .iter()
        .map(|record| record.get(index).and_then(Value::as_f64))
        .collect();

    let compare = |a: &Record, b: &Record| -> Ordering {
        let (left, right) = (a.get(index), b.get(index));
        match (numeric.is_some(), left, right) {
            (true, Some(l), Some(r)) => match (l.as_f64(), r.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => Ordering::Equal,
            },
            (false, Some(l), Some(r)) => compare_text(l, r),
            _ => Ordering::Equal,
        }
    };

    match direction {
        SortDirection::Ascending => records.sort_by(compare),
        SortDirection::Descending => records.sort_by(|a, b| compare(b, a)),
    }

    debug!(
        "Sorted {} records by {} ({}, {})",
        records.len(),
        field,
        direction,
        if numeric.is_some() { "numeric" } else { "text" }
    );
    Ok(dataset.derive(records))
}

/// Record count and numeric total of one group.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupTotal {
    /// Records in the group
    pub count: u64,
    /// Sum of the coercible amounts
    pub total: f64,
}

/// Groups records by `group_field` and sums `amount_field` per group.
///
/// Every record counts towards its group; amounts that do not coerce are
/// left out of the sum. Missing group values collect under [`NULL_GROUP`].
pub fn group_and_total(
    dataset: &Dataset,
    group_field: &str,
    amount_field: &str,
) -> Result<BTreeMap<String, GroupTotal>> {
    let group_index = dataset.schema().require(group_field)?;
    let amount_index = dataset.schema().require(amount_field)?;

    let mut groups: BTreeMap<String, GroupTotal> = BTreeMap::new();
    let mut skipped = 0usize;
    for record in dataset.records() {
        let key = match record.get(group_index) {
            Some(value) if !value.is_missing() => value.label(),
            _ => NULL_GROUP.to_string(),
        };
        let entry = groups.entry(key).or_default();
        entry.count += 1;
        match record.get(amount_index).and_then(Value::as_f64) {
            Some(amount) => entry.total += amount,
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(
            "Skipped {} non-numeric values of {} while totalling",
            skipped, amount_field
        );
    }
    Ok(groups)
}

/// First `n` records; the whole dataset when `n` exceeds its size.
///
/// # Errors
/// `InvalidArgument` if `n` is negative.
pub fn head(dataset: &Dataset, n: i64) -> Result<Dataset> {
    let n = usize::try_from(n).map_err(|_| {
        PipelineError::invalid_argument(format!("Record count must not be negative, got {}", n))
    })?;
    Ok(dataset.derive(dataset.records().iter().take(n).cloned().collect()))
}

/// Projects the dataset onto `fields`, in the requested order.
///
/// # Errors
/// `UnknownField` for a field outside the schema; `InvalidArgument` for an
/// empty or repeated field list.
pub fn select_fields(dataset: &Dataset, fields: &[String]) -> Result<Dataset> {
    if fields.is_empty() {
        return Err(PipelineError::invalid_argument("At least one field must be selected"));
    }
    let indices = fields
        .iter()
        .map(|field| dataset.schema().require(field))
        .collect::<Result<Vec<usize>>>()?;
    let schema = Schema::new(fields).map_err(|_| {
        PipelineError::invalid_argument(format!("Field list {:?} repeats a field", fields))
    })?;

    let records = dataset
        .records()
        .iter()
        .map(|record| {
            Record::new(
                indices
                    .iter()
                    .map(|i| record.get(*i).cloned().unwrap_or(Value::Null))
                    .collect(),
            )
        })
        .collect();

    Dataset::new(dataset.name(), schema, records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> Dataset {
        Dataset::from_rows(
            "sales",
            ["id", "product", "region", "total"],
            [
                vec!["1", "Laptop Pro", "North", "1200"],
                vec!["2", "Mouse", "South", "25.5"],
                vec!["3", "laptop air", "North", "900"],
                vec!["4", "Cable", "", "n/a"],
                vec!["5", "Monitor", "South", "300"],
            ],
        )
        .unwrap()
    }

    fn ids(dataset: &Dataset) -> Vec<String> {
        dataset
            .records()
            .iter()
            .map(|r| r.get(0).map(Value::label).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_filter_equals_and_not_equals() {
        let north = filter_by_field(&sales(), "region", &Predicate::Equals(" North ".into())).unwrap();
        assert_eq!(ids(&north), vec!["1", "3"]);

        let other = filter_by_field(&sales(), "region", &Predicate::NotEquals("North".into())).unwrap();
        assert_eq!(ids(&other), vec!["2", "4", "5"]);

        let numeric = filter_by_field(&sales(), "total", &Predicate::Equals("300.0".into())).unwrap();
        assert_eq!(ids(&numeric), vec!["5"]);
    }

    #[test]
    fn test_filter_contains_is_case_insensitive() {
        let laptops = filter_by_field(&sales(), "product", &Predicate::Contains("LAPTOP".into())).unwrap();
        assert_eq!(ids(&laptops), vec!["1", "3"]);
    }

    #[test]
    fn test_filter_regex() {
        let result = filter_by_field(&sales(), "product", &Predicate::Matches("^M".into())).unwrap();
        assert_eq!(ids(&result), vec!["2", "5"]);

        let invalid = filter_by_field(&sales(), "product", &Predicate::Matches("(".into()));
        assert!(matches!(invalid, Err(PipelineError::InvalidArgument { .. })));
    }

    #[test]
    fn test_filter_numeric_comparisons_exclude_non_numeric() {
        let big = filter_by_field(&sales(), "total", &Predicate::GreaterThan(300.0)).unwrap();
        assert_eq!(ids(&big), vec!["1", "3"]);

        let at_least = filter_by_field(&sales(), "total", &Predicate::AtLeast(300.0)).unwrap();
        assert_eq!(ids(&at_least), vec!["1", "3", "5"]);

        let small = filter_by_field(&sales(), "total", &Predicate::AtMost(300.0)).unwrap();
        assert_eq!(ids(&small), vec!["2", "5"]);
    }

    #[test]
    fn test_filter_unknown_field() {
        let result = filter_by_field(&sales(), "price", &Predicate::Equals("1".into()));
        assert!(matches!(result, Err(PipelineError::UnknownField { .. })));
    }

    #[test]
    fn test_filter_by_range() {
        let result = filter_by_range(&sales(), "total", 25.5, 900.0).unwrap();
        assert_eq!(ids(&result), vec!["2", "3", "5"]);

        assert!(matches!(
            filter_by_range(&sales(), "total", 10.0, 1.0),
            Err(PipelineError::InvalidArgument { .. })
        ));
        assert!(matches!(
            filter_by_range(&sales(), "total", f64::NAN, 1.0),
            Err(PipelineError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_sort_numeric_when_all_values_coerce() {
        let dataset = filter_by_field(&sales(), "total", &Predicate::AtLeast(0.0)).unwrap();
        let sorted = sort_by_field(&dataset, "total", SortDirection::Ascending).unwrap();
        // numeric order, not text order ("1200" < "25.5" as text)
        assert_eq!(ids(&sorted), vec!["2", "5", "3", "1"]);

        let sorted = sort_by_field(&dataset, "total", SortDirection::Descending).unwrap();
        assert_eq!(ids(&sorted), vec!["1", "3", "5", "2"]);
    }

    #[test]
    fn test_sort_falls_back_to_text() {
        let sorted = sort_by_field(&sales(), "total", SortDirection::Ascending).unwrap();
        assert_eq!(ids(&sorted), vec!["1", "2", "5", "3", "4"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let sorted = sort_by_field(&sales(), "region", SortDirection::Ascending).unwrap();
        assert_eq!(ids(&sorted), vec!["4", "1", "3", "2", "5"]);

        let sorted = sort_by_field(&sales(), "region", SortDirection::Descending).unwrap();
        assert_eq!(ids(&sorted), vec!["2", "5", "1", "3", "4"]);
    }

    #[test]
    fn test_group_and_total() {
        let dataset = Dataset::from_rows(
            "g",
            ["category", "amount"],
            [vec!["A", "5"], vec!["A", "7"], vec!["B", "3"]],
        )
        .unwrap();

        let groups = group_and_total(&dataset, "category", "amount").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["A"], GroupTotal { count: 2, total: 12.0 });
        assert_eq!(groups["B"], GroupTotal { count: 1, total: 3.0 });
    }

    #[test]
    fn test_group_null_key_and_skipped_amounts() {
        let groups = group_and_total(&sales(), "region", "total").unwrap();
        assert_eq!(groups[NULL_GROUP], GroupTotal { count: 1, total: 0.0 });
        assert!((groups["South"].total - 325.5).abs() < 1e-9);
    }

    #[test]
    fn test_head() {
        assert!(head(&sales(), 0).unwrap().is_empty());
        assert_eq!(ids(&head(&sales(), 2).unwrap()), vec!["1", "2"]);
        assert_eq!(head(&sales(), 50).unwrap().len(), 5);
        assert!(matches!(
            head(&sales(), -1),
            Err(PipelineError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_select_fields() {
        let projected =
            select_fields(&sales(), &["total".to_string(), "id".to_string()]).unwrap();
        assert_eq!(projected.fields(), &["total".to_string(), "id".to_string()]);
        assert_eq!(projected.records()[0].get(1), Some(&Value::text("1")));

        assert!(select_fields(&sales(), &[]).is_err());
        assert!(matches!(
            select_fields(&sales(), &["nope".to_string()]),
            Err(PipelineError::UnknownField { .. })
        ));
        assert!(matches!(
            select_fields(&sales(), &["id".to_string(), "id".to_string()]),
            Err(PipelineError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let original = sales();
        let _ = sort_by_field(&original, "total", SortDirection::Descending).unwrap();
        let _ = head(&original, 1).unwrap();
        assert_eq!(original, sales());
    }
}
