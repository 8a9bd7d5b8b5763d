//! XML report rendering.
//!
//! Each metric becomes one element. Metric and map keys are sanitized into
//! valid element names; when sanitizing changes a key, the original is kept
//! in a `name` attribute. All text and attribute content is escaped.

use std::fmt::Write as _;

use tabsurveyor_core::{AnalysisResult, MetricValue};

/// Escapes the five XML special characters.
///
/// Control characters outside tab, line feed and carriage return cannot
/// appear in an XML 1.0 document, even as references, and are dropped.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\t' | '\n' | '\r' => out.push(c),
            c if c < '\u{20}' => {}
            '\u{FFFE}' | '\u{FFFF}' => {}
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Turns an arbitrary key into a valid XML element name.
///
/// Letters are lowercased, anything outside `[a-z0-9_.-]` becomes `_`, and a
/// leading `_` is added when the name would start with a digit, a
/// punctuation character, or the reserved `xml` prefix.
pub fn element_name(key: &str) -> String {
    let mut name: String = key
        .trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let needs_prefix = match name.chars().next() {
        None => true,
        Some(first) => !(first.is_ascii_alphabetic() || first == '_') || name.starts_with("xml"),
    };
    if needs_prefix {
        name.insert(0, '_');
    }
    name
}

/// Renders an analysis result as an XML document.
pub fn render_xml(result: &AnalysisResult) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<report kind=\"{}\" dataset=\"{}\">",
        result.kind,
        escape_xml(&result.dataset)
    );
    let _ = writeln!(
        out,
        "  <generated_at>{}</generated_at>",
        result.generated_at.to_rfc3339()
    );
    let _ = writeln!(out, "  <record_count>{}</record_count>", result.record_count);
    out.push_str("  <metrics>\n");
    for (key, value) in &result.metrics {
        write_element(&mut out, key, value, 2);
    }
    out.push_str("  </metrics>\n");
    out.push_str("</report>\n");
    out
}

fn write_element(out: &mut String, key: &str, value: &MetricValue, depth: usize) {
    let indent = "  ".repeat(depth);
    let tag = element_name(key);
    let attribute = if tag == key {
        String::new()
    } else {
        format!(" name=\"{}\"", escape_xml(key))
    };

    match value {
        MetricValue::Map(map) => {
            let _ = writeln!(out, "{}<{}{}>", indent, tag, attribute);
            for (inner_key, inner) in map {
                write_element(out, inner_key, inner, depth + 1);
            }
            let _ = writeln!(out, "{}</{}>", indent, tag);
        }
        MetricValue::List(items) => {
            let _ = writeln!(out, "{}<{}{}>", indent, tag, attribute);
            for item in items {
                write_element(out, "item", item, depth + 1);
            }
            let _ = writeln!(out, "{}</{}>", indent, tag);
        }
        scalar => {
            let _ = writeln!(
                out,
                "{}<{}{}>{}</{}>",
                indent,
                tag,
                attribute,
                escape_xml(&scalar_text(scalar)),
                tag
            );
        }
    }
}

/// Full-precision text of a scalar metric.
fn scalar_text(value: &MetricValue) -> String {
    match value {
        MetricValue::Count(c) => c.to_string(),
        MetricValue::Number(n) => n.to_string(),
        MetricValue::Text(t) => t.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabsurveyor_core::AnalysisKind;

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"Tom & "Jerry" <'s>"#),
            "Tom &amp; &quot;Jerry&quot; &lt;&apos;s&gt;"
        );
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn test_escape_xml_drops_illegal_characters() {
        assert_eq!(escape_xml("a\u{1}b\u{1f}c\u{FFFF}"), "abc");
        assert_eq!(escape_xml("line\tone\r\ntwo"), "line\tone\r\ntwo");
    }

    #[test]
    fn test_render_xml_with_control_characters_in_values() {
        let mut result = AnalysisResult::new(AnalysisKind::General, "bell\u{7}", 1);
        result.insert("note", MetricValue::from("x\u{1}y"));
        result.insert("map", MetricValue::map([("k\u{2}", MetricValue::Count(1))]));

        let xml = render_xml(&result);
        assert!(xml.contains("dataset=\"bell\""));
        assert!(xml.contains("<note>xy</note>"));
        assert!(xml.contains("<k_ name=\"k\">1</k_>"));
        assert!(!xml.chars().any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r')));
    }

    #[test]
    fn test_element_name_sanitizing() {
        assert_eq!(element_name("total_revenue"), "total_revenue");
        assert_eq!(element_name("North America"), "north_america");
        assert_eq!(element_name("2024-01-02"), "_2024-01-02");
        assert_eq!(element_name("<b>"), "_b_");
        assert_eq!(element_name("xmlData"), "_xmldata");
        assert_eq!(element_name(""), "_");
    }

    #[test]
    fn test_render_xml_structure() {
        let mut result = AnalysisResult::new(AnalysisKind::Sales, "Q1 & Q2", 2);
        result.insert("total_revenue", 12.5);
        result.insert(
            "revenue_by_region",
            MetricValue::map([("North <East>", MetricValue::Number(12.5))]),
        );
        result.insert(
            "top_products",
            MetricValue::List(vec![MetricValue::map([("name", MetricValue::from("A&B"))])]),
        );

        let xml = render_xml(&result);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<report kind=\"sales\" dataset=\"Q1 &amp; Q2\">"));
        assert!(xml.contains("<record_count>2</record_count>"));
        assert!(xml.contains("<total_revenue>12.5</total_revenue>"));
        assert!(xml.contains("<north__east_ name=\"North &lt;East&gt;\">12.5</north__east_>"));
        assert!(xml.contains("<item>"));
        assert!(xml.contains("<name>A&amp;B</name>"));
        assert!(xml.trim_end().ends_with("</report>"));
    }
}
