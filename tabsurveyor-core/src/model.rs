//! Core data model: values, schema, records and datasets.
//!
//! A [`Dataset`] owns one [`Schema`] and an ordered list of [`Record`]s whose
//! values are stored positionally against that schema. Operators never mutate
//! a dataset in place; they derive a new one with [`Dataset::derive`].

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Text markers treated as missing in addition to blank text.
const NULL_MARKER: &str = "NULL";

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value
    Null,
    /// Numeric value
    Number(f64),
    /// Raw text as read from the source
    Text(String),
}

impl Value {
    /// Creates a text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Returns true for `Null`, blank text, or the `NULL` marker.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Number(_) => false,
            Self::Text(s) => {
                let trimmed = s.trim();
                trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NULL_MARKER)
            }
        }
    }

    /// Attempts numeric coercion.
    ///
    /// Only finite values are accepted. Text such as "NaN" or "inf" is
    /// rejected so it cannot poison downstream arithmetic.
    pub fn as_f64(&self) -> Option<f64> {
        let numeric = match self {
            Self::Null => None,
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        };
        numeric.filter(|v| v.is_finite())
    }

    /// Returns the text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical comparison key: whitespace collapsed and case-folded text,
    /// numbers by value, and one shared key for every missing value.
    pub fn normalized_key(&self) -> String {
        if self.is_missing() {
            return "\u{0}null".to_string();
        }
        match self {
            Self::Number(n) => format!("\u{0}num:{}", n),
            Self::Text(s) => collapse_whitespace(s).to_lowercase(),
            Self::Null => "\u{0}null".to_string(),
        }
    }

    /// Display form used for grouping and frequency keys.
    pub fn label(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, ""),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Formats a number without a trailing `.0` for integral values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Trims and collapses runs of inner whitespace into one space.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compares two values as text, treating missing values as empty text.
pub fn compare_text(a: &Value, b: &Value) -> Ordering {
    let left = if a.is_missing() { String::new() } else { a.label() };
    let right = if b.is_missing() { String::new() } else { b.label() };
    left.cmp(&right)
}

/// Ordered list of unique field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    /// Builds a schema from field names.
    ///
    /// Names are trimmed; the list must be non-empty, free of blank names and
    /// free of duplicates.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = Vec::new();
        for (position, raw) in fields.into_iter().enumerate() {
            let name = raw.as_ref().trim().to_string();
            if name.is_empty() {
                return Err(PipelineError::format(format!(
                    "Field name at position {} is empty",
                    position + 1
                )));
            }
            if names.contains(&name) {
                return Err(PipelineError::format(format!(
                    "Duplicate field name '{}'",
                    name
                )));
            }
            names.push(name);
        }

        if names.is_empty() {
            return Err(PipelineError::format("Schema has no fields"));
        }

        Ok(Self { fields: names })
    }

    /// Field names in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false for a constructed schema; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field, if present.
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Position of a field, failing with `UnknownField` if absent.
    pub fn require(&self, field: &str) -> Result<usize> {
        self.index_of(field)
            .ok_or_else(|| PipelineError::unknown_field(field))
    }

    /// Returns true if the field exists.
    pub fn contains(&self, field: &str) -> bool {
        self.index_of(field).is_some()
    }
}

/// One row of values, positionally aligned with a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    /// Creates a record from values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Creates a record from text cells; empty cells become `Null`.
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = cells
            .into_iter()
            .map(|cell| {
                let cell = cell.into();
                if cell.is_empty() {
                    Value::Null
                } else {
                    Value::Text(cell)
                }
            })
            .collect();
        Self { values }
    }

    /// All values in schema order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at a schema position.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns a copy with the value at `index` replaced.
    pub fn with_value(&self, index: usize, value: Value) -> Self {
        let mut values = self.values.clone();
        if let Some(slot) = values.get_mut(index) {
            *slot = value;
        }
        Self { values }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the record holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true if every value is missing.
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(Value::is_missing)
    }

    /// Returns true if any value is missing.
    pub fn has_missing(&self) -> bool {
        self.values.iter().any(Value::is_missing)
    }

    /// Normalized comparison key over all values.
    pub fn normalized_key(&self) -> Vec<String> {
        self.values.iter().map(Value::normalized_key).collect()
    }
}

/// Ordered collection of records sharing one schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    name: String,
    schema: Schema,
    records: Vec<Record>,
}

impl Dataset {
    /// Creates a dataset, checking every record against the schema.
    pub fn new(name: impl Into<String>, schema: Schema, records: Vec<Record>) -> Result<Self> {
        for (position, record) in records.iter().enumerate() {
            if record.len() != schema.len() {
                return Err(PipelineError::format(format!(
                    "Record {} has {} values but the schema has {} fields",
                    position + 1,
                    record.len(),
                    schema.len()
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            schema,
            records,
        })
    }

    /// Builds a dataset from text rows; convenient for callers and tests.
    pub fn from_rows<F, R, C>(name: impl Into<String>, fields: F, rows: R) -> Result<Self>
    where
        F: IntoIterator,
        F::Item: AsRef<str>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let schema = Schema::new(fields)?;
        let records = rows.into_iter().map(Record::from_cells).collect();
        Self::new(name, schema, records)
    }

    /// Derives a dataset with the same name and schema from existing records.
    ///
    /// Callers pass records taken from `self`, so arity is already correct.
    pub fn derive(&self, records: Vec<Record>) -> Self {
        Self {
            name: self.name.clone(),
            schema: self.schema.clone(),
            records,
        }
    }

    /// Dataset identifier (usually the source file stem).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Field names in order.
    pub fn fields(&self) -> &[String] {
        self.schema.fields()
    }

    /// Records in order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the dataset has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Value of a named field in a record.
    pub fn value<'a>(&self, record: &'a Record, field: &str) -> Option<&'a Value> {
        self.schema.index_of(field).and_then(|i| record.get(i))
    }

    /// All values of a field in record order.
    pub fn column(&self, field: &str) -> Result<Vec<&Value>> {
        let index = self.schema.require(field)?;
        Ok(self
            .records
            .iter()
            .filter_map(|record| record.get(index))
            .collect())
    }

    /// Non-missing values of a field in record order.
    pub fn present_values(&self, field: &str) -> Result<Vec<&Value>> {
        Ok(self
            .column(field)?
            .into_iter()
            .filter(|v| !v.is_missing())
            .collect())
    }

    /// Records as JSON objects keyed by field name, in schema order.
    pub fn to_json_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.records
            .iter()
            .map(|record| {
                self.schema
                    .fields()
                    .iter()
                    .zip(record.values())
                    .map(|(field, value)| {
                        let json = match value {
                            Value::Null => serde_json::Value::Null,
                            Value::Number(n) => serde_json::Number::from_f64(*n)
                                .map_or(serde_json::Value::Null, serde_json::Value::Number),
                            Value::Text(s) => serde_json::Value::String(s.clone()),
                        };
                        (field.clone(), json)
                    })
                    .collect()
            })
            .collect()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dataset '{}' with {} records and {} fields",
            self.name,
            self.records.len(),
            self.schema.len()
        )
    }
}

/// Sort direction for ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
