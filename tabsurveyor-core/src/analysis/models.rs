//! Analysis result structures.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::model::format_number;

/// Available analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    /// Per-field descriptive statistics
    General,
    /// Revenue breakdowns over sales columns
    Sales,
    /// Dataset name, record count and field list
    Basic,
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::Sales => write!(f, "sales"),
            Self::Basic => write!(f, "basic"),
        }
    }
}

impl std::str::FromStr for AnalysisKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" | "statistics" | "stats" => Ok(Self::General),
            "sales" => Ok(Self::Sales),
            "basic" | "custom" => Ok(Self::Basic),
            other => Err(PipelineError::invalid_argument(format!(
                "Unknown analysis kind '{}' (expected general, sales or basic)",
                other
            ))),
        }
    }
}

/// One metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(u64),
    Number(f64),
    Text(String),
    List(Vec<MetricValue>),
    Map(BTreeMap<String, MetricValue>),
}

impl MetricValue {
    /// Builds a map value from name/value pairs.
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, MetricValue)>,
        K: Into<String>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Numeric view of counts and numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Count(c) => Some(*c as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Nested map, if this is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, MetricValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// List items, if this is a list.
    pub fn as_list(&self) -> Option<&[MetricValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Text content, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Structural equality with numbers compared within `epsilon`.
    ///
    /// Counts and numbers compare by value so a whole number read back from
    /// JSON still matches.
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.approx_eq(y, epsilon))
            }
            (Self::Map(a), Self::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.approx_eq(w, epsilon)))
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => (a - b).abs() <= epsilon,
                _ => false,
            },
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(c) => write!(f, "{}", c),
            Self::Number(n) if n.fract() == 0.0 => write!(f, "{}", format_number(*n)),
            Self::Number(n) => write!(f, "{:.2}", n),
            Self::Text(t) => write!(f, "{}", t),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        Self::Count(value)
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        Self::Count(value as u64)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Output of one analyzer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub kind: AnalysisKind,
    pub dataset: String,
    pub generated_at: DateTime<Utc>,
    pub record_count: u64,
    pub metrics: BTreeMap<String, MetricValue>,
}

impl AnalysisResult {
    /// Creates an empty result stamped with the current time.
    pub fn new(kind: AnalysisKind, dataset: impl Into<String>, record_count: usize) -> Self {
        Self {
            kind,
            dataset: dataset.into(),
            generated_at: Utc::now(),
            record_count: record_count as u64,
            metrics: BTreeMap::new(),
        }
    }

    /// Adds a metric.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<MetricValue>) {
        self.metrics.insert(name.into(), value.into());
    }

    /// Looks up a metric.
    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    /// Compares metadata exactly and metrics within `epsilon`.
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.kind == other.kind
            && self.dataset == other.dataset
            && self.generated_at == other.generated_at
            && self.record_count == other.record_count
            && MetricValue::Map(self.metrics.clone())
                .approx_eq(&MetricValue::Map(other.metrics.clone()), epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("general".parse::<AnalysisKind>().unwrap(), AnalysisKind::General);
        assert_eq!(" Sales ".parse::<AnalysisKind>().unwrap(), AnalysisKind::Sales);
        assert!("forecast".parse::<AnalysisKind>().is_err());
        assert_eq!(AnalysisKind::Sales.to_string(), "sales");
        assert_eq!("custom".parse::<AnalysisKind>().unwrap(), AnalysisKind::Basic);
        assert_eq!(AnalysisKind::Basic.to_string(), "basic");
    }

    #[test]
    fn test_metric_value_json_shape() {
        let value = MetricValue::map([
            ("count", MetricValue::Count(3)),
            ("mean", MetricValue::Number(20.0)),
            ("name", MetricValue::from("North")),
            ("top", MetricValue::List(vec![MetricValue::from(1.5)])),
        ]);

        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["count"], 3);
        assert_eq!(json["mean"], 20.0);
        assert_eq!(json["name"], "North");
        assert_eq!(json["top"][0], 1.5);
    }

    #[test]
    fn test_metric_value_roundtrip_is_approximately_equal() {
        let value = MetricValue::map([
            ("whole", MetricValue::Number(20.0)),
            ("fraction", MetricValue::Number(0.1 + 0.2)),
            ("count", MetricValue::Count(7)),
        ]);

        let json = serde_json::to_string(&value).unwrap();
        let back: MetricValue = serde_json::from_str(&json).unwrap();
        assert!(value.approx_eq(&back, 1e-9));
    }

    #[test]
    fn test_approx_eq_detects_differences() {
        let a = MetricValue::map([("x", MetricValue::Number(1.0))]);
        let b = MetricValue::map([("x", MetricValue::Number(1.1))]);
        let c = MetricValue::map([("y", MetricValue::Number(1.0))]);
        assert!(!a.approx_eq(&b, 1e-9));
        assert!(!a.approx_eq(&c, 1e-9));
        assert!(!MetricValue::from("1").approx_eq(&MetricValue::Count(1), 1e-9));
    }

    #[test]
    fn test_display() {
        assert_eq!(MetricValue::Number(20.0).to_string(), "20");
        assert_eq!(MetricValue::Number(1.0 / 3.0).to_string(), "0.33");
        assert_eq!(MetricValue::Count(4).to_string(), "4");
    }
}
