//! Pipeline step syntax accepted by `tabsurveyor run --step`.
//!
//! ```text
//! clean:full | clean:dedupe | clean:empty | clean:drop-nulls
//! clean:fill:VALUE | clean:normalize[:lower|:upper]
//! filter:FIELD:OP:VALUE        OP = eq ne contains matches gt ge lt le
//! range:FIELD:MIN:MAX
//! sort:FIELD[:asc|:desc]
//! group:FIELD:AMOUNT
//! head:N
//! select:FIELD,FIELD,...
//! ```

use std::str::FromStr;

use tabsurveyor_core::clean::{CleanStep, NullStrategy};
use tabsurveyor_core::{CaseFold, PipelineError, Predicate, Result, SortDirection};

use crate::session::{CleanMode, TransformStep};

/// One `--step` argument.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStep {
    Clean(CleanMode),
    Transform(TransformStep),
}

impl FromStr for PipelineStep {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let (verb, rest) = s.split_once(':').unwrap_or((s, ""));
        match verb.trim().to_ascii_lowercase().as_str() {
            "clean" => parse_clean(rest).map(PipelineStep::Clean),
            "filter" => parse_filter(rest),
            "range" => {
                let parts = split_exact(rest, 3, "range:FIELD:MIN:MAX")?;
                Ok(PipelineStep::Transform(TransformStep::Range {
                    field: parts[0].to_string(),
                    min: number(parts[1])?,
                    max: number(parts[2])?,
                }))
            }
            "sort" => {
                let (field, direction) = rest.split_once(':').unwrap_or((rest, "asc"));
                let direction = match direction.trim().to_ascii_lowercase().as_str() {
                    "asc" => SortDirection::Ascending,
                    "desc" => SortDirection::Descending,
                    other => return Err(invalid(format!("Unknown sort direction '{}'", other))),
                };
                Ok(PipelineStep::Transform(TransformStep::Sort {
                    field: required(field, "sort:FIELD[:asc|desc]")?,
                    direction,
                }))
            }
            "group" => {
                let parts = split_exact(rest, 2, "group:FIELD:AMOUNT")?;
                Ok(PipelineStep::Transform(TransformStep::Group {
                    field: parts[0].to_string(),
                    amount: parts[1].to_string(),
                }))
            }
            "head" => {
                let n = rest
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| invalid(format!("head expects an integer, got '{}'", rest)))?;
                Ok(PipelineStep::Transform(TransformStep::Head(n)))
            }
            "select" => Ok(PipelineStep::Transform(TransformStep::Select(
                rest.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(String::from)
                    .collect(),
            ))),
            other => Err(invalid(format!("Unknown step '{}'", other))),
        }
    }
}

fn parse_clean(rest: &str) -> Result<CleanMode> {
    let (mode, argument) = match rest.split_once(':') {
        Some((mode, argument)) => (mode, Some(argument)),
        None => (rest, None),
    };
    let step = match mode.trim().to_ascii_lowercase().as_str() {
        "full" => return Ok(CleanMode::Full),
        "dedupe" | "deduplicate" => CleanStep::Deduplicate,
        "empty" | "remove-empty" => CleanStep::RemoveEmpty,
        "drop-nulls" => CleanStep::HandleNulls(NullStrategy::Drop),
        "fill" => CleanStep::HandleNulls(NullStrategy::fill_all(
            argument.ok_or_else(|| invalid("clean:fill needs a value, e.g. clean:fill:0"))?,
        )),
        "normalize" => CleanStep::NormalizeText(match argument.map(str::trim) {
            None | Some("") => None,
            Some("lower") => Some(CaseFold::Lower),
            Some("upper") => Some(CaseFold::Upper),
            Some(other) => return Err(invalid(format!("Unknown case fold '{}'", other))),
        }),
        other => return Err(invalid(format!("Unknown clean mode '{}'", other))),
    };
    Ok(CleanMode::Steps(vec![step]))
}

fn parse_filter(rest: &str) -> Result<PipelineStep> {
    let mut parts = rest.splitn(3, ':');
    let (Some(field), Some(op), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid("Expected filter:FIELD:OP:VALUE"));
    };
    let predicate = match op.trim().to_ascii_lowercase().as_str() {
        "eq" => Predicate::Equals(value.to_string()),
        "ne" => Predicate::NotEquals(value.to_string()),
        "contains" => Predicate::Contains(value.to_string()),
        "matches" => Predicate::Matches(value.to_string()),
        "gt" => Predicate::GreaterThan(number(value)?),
        "ge" => Predicate::AtLeast(number(value)?),
        "lt" => Predicate::LessThan(number(value)?),
        "le" => Predicate::AtMost(number(value)?),
        other => return Err(invalid(format!("Unknown filter operator '{}'", other))),
    };
    Ok(PipelineStep::Transform(TransformStep::Filter {
        field: required(field, "filter:FIELD:OP:VALUE")?,
        predicate,
    }))
}

fn split_exact<'a>(rest: &'a str, count: usize, usage: &str) -> Result<Vec<&'a str>> {
    let parts: Vec<&str> = rest.split(':').map(str::trim).collect();
    if parts.len() != count || parts.iter().any(|p| p.is_empty()) {
        return Err(invalid(format!("Expected {}", usage)));
    }
    Ok(parts)
}

fn required(field: &str, usage: &str) -> Result<String> {
    let field = field.trim();
    if field.is_empty() {
        return Err(invalid(format!("Missing field name, expected {}", usage)));
    }
    Ok(field.to_string())
}

fn number(text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| invalid(format!("'{}' is not a number", text)))
}

fn invalid(message: impl Into<String>) -> PipelineError {
    PipelineError::invalid_argument(message)
}
