//! Report rendering and file output for tabsurveyor.
//!
//! Rendering is a pure function from an [`AnalysisResult`] to a string in
//! one of the supported [`ReportFormat`]s. [`ReportWriter`] places rendered
//! reports and exported datasets on disk, always through an atomic replace.
//!
//! # Example
//! ```rust
//! use tabsurveyor_core::{AnalysisKind, AnalysisResult};
//! use tabsurveyor_report::{ReportFormat, render};
//!
//! let mut result = AnalysisResult::new(AnalysisKind::Sales, "sales", 3);
//! result.insert("total_revenue", 1500.0);
//!
//! let text = render(&result, ReportFormat::Text)?;
//! assert!(text.contains("Total Revenue: 1500.00"));
//! # Ok::<(), tabsurveyor_core::PipelineError>(())
//! ```

pub mod text;
pub mod writer;
pub mod xml;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tabsurveyor_core::{AnalysisResult, PipelineError, Result};

pub use text::render_text;
pub use writer::{DatasetFormat, ReportWriter};
pub use xml::render_xml;

/// Output format of an analysis report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Sectioned plain text
    #[default]
    Text,
    /// Pretty-printed JSON mirroring the analysis result
    Json,
    /// XML with one element per metric
    Xml,
}

impl ReportFormat {
    /// File extension used for generated report names.
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Xml => "xml",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
            ReportFormat::Xml => "xml",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ReportFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "xml" => Ok(ReportFormat::Xml),
            other => Err(PipelineError::invalid_argument(format!(
                "Unknown report format '{}' (expected text, json or xml)",
                other
            ))),
        }
    }
}

/// Renders an analysis result in the requested format.
pub fn render(result: &AnalysisResult, format: ReportFormat) -> Result<String> {
    tracing::debug!(
        "Rendering {} report for dataset '{}' ({} metrics)",
        format,
        result.dataset,
        result.metrics.len()
    );
    match format {
        ReportFormat::Text => render_text(result),
        ReportFormat::Json => render_json(result),
        ReportFormat::Xml => Ok(render_xml(result)),
    }
}

/// Pretty JSON form of an analysis result; parses back into an equal result.
pub fn render_json(result: &AnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(result)
        .map_err(|e| PipelineError::serialization("Failed to serialize analysis result", e))
}
