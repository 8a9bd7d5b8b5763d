//! Plain text report layout.
//!
//! Scalar metrics are collected into a summary section; every map or list
//! metric gets a section of its own. The layout is produced by the
//! `templates/report.txt` template.

use askama::Template;
use tabsurveyor_core::{AnalysisKind, AnalysisResult, MetricValue, PipelineError, Result};

const RULE_WIDTH: usize = 60;

/// One titled block of report lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub lines: Vec<String>,
}

#[derive(Template)]
#[template(path = "report.txt")]
struct TextReport<'a> {
    rule: String,
    title: &'a str,
    generated_at: String,
    dataset: &'a str,
    record_count: u64,
    sections: Vec<Section>,
}

/// Report title for an analysis kind.
pub fn title_for(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::General => "General statistics report",
        AnalysisKind::Sales => "Sales analysis report",
        AnalysisKind::Basic => "Dataset report",
    }
}

/// Renders an analysis result as sectioned plain text.
pub fn render_text(result: &AnalysisResult) -> Result<String> {
    let report = TextReport {
        rule: "=".repeat(RULE_WIDTH),
        title: title_for(result.kind),
        generated_at: result.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        dataset: &result.dataset,
        record_count: result.record_count,
        sections: sections(result),
    };
    report.render().map_err(|e| PipelineError::render("text", e))
}

/// Splits the metrics into a summary section and one section per
/// structured metric, in metric-name order.
pub fn sections(result: &AnalysisResult) -> Vec<Section> {
    let mut summary = Vec::new();
    let mut structured = Vec::new();

    for (name, value) in &result.metrics {
        match value {
            MetricValue::Map(_) | MetricValue::List(_) => {
                let mut lines = Vec::new();
                write_value(&mut lines, value, 1);
                if lines.is_empty() {
                    lines.push("  (none)".to_string());
                }
                structured.push(Section {
                    heading: humanize(name),
                    lines,
                });
            }
            scalar => summary.push(format!("  • {}: {}", title_case(name), format_scalar(scalar))),
        }
    }

    let mut out = Vec::with_capacity(structured.len() + 1);
    if !summary.is_empty() {
        out.push(Section {
            heading: "Summary".to_string(),
            lines: summary,
        });
    }
    out.extend(structured);
    out
}

fn write_value(lines: &mut Vec<String>, value: &MetricValue, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        MetricValue::Map(map) => {
            for (key, inner) in map {
                match inner {
                    MetricValue::Map(_) | MetricValue::List(_) => {
                        lines.push(format!("{}{}:", indent, key));
                        write_value(lines, inner, depth + 1);
                    }
                    scalar => lines.push(format!("{}• {}: {}", indent, key, format_scalar(scalar))),
                }
            }
        }
        MetricValue::List(items) => {
            for (position, item) in items.iter().enumerate() {
                lines.push(format!("{}{}. {}", indent, position + 1, inline(item)));
            }
        }
        scalar => lines.push(format!("{}{}", indent, format_scalar(scalar))),
    }
}

/// Single-line form of a list item, e.g. `laptop: 2000.00`.
fn inline(item: &MetricValue) -> String {
    match item {
        MetricValue::Map(map) => match (map.get("name"), map.len()) {
            (Some(name), 2) => {
                let rest = map
                    .iter()
                    .find(|(k, _)| k.as_str() != "name")
                    .map(|(_, v)| format_scalar(v))
                    .unwrap_or_default();
                format!("{}: {}", format_scalar(name), rest)
            }
            _ => map
                .iter()
                .map(|(k, v)| format!("{}={}", k, format_scalar(v)))
                .collect::<Vec<_>>()
                .join(", "),
        },
        other => format_scalar(other),
    }
}

/// Counts as integers, numbers with two decimals.
pub fn format_scalar(value: &MetricValue) -> String {
    match value {
        MetricValue::Count(c) => c.to_string(),
        MetricValue::Number(n) => format!("{:.2}", n),
        MetricValue::Text(t) => t.clone(),
        other => other.to_string(),
    }
}

fn humanize(name: &str) -> String {
    name.replace('_', " ")
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
