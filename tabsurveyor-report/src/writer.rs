//! Report and dataset file output.
//!
//! Generated names follow `<prefix>_<YYYYMMDDTHHMMSS>.<ext>` inside the
//! configured output directory. A generated name never replaces an existing
//! file: when the name is taken, a `_2`, `_3`, ... suffix is added before
//! the extension. A caller-supplied bare file name also lands
//! in the output directory; a path with a directory component is used as
//! given. A missing extension is added from the format.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabsurveyor_core::config::OutputConfig;
use tabsurveyor_core::fsutil::write_atomic;
use tabsurveyor_core::{AnalysisResult, Dataset, PipelineError, Result, Value};
use tracing::{debug, info};

use crate::{ReportFormat, render};

/// Serialization format of an exported dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    #[default]
    Csv,
    Json,
}

impl DatasetFormat {
    /// File extension used for generated export names.
    pub fn extension(&self) -> &'static str {
        match self {
            DatasetFormat::Csv => "csv",
            DatasetFormat::Json => "json",
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DatasetFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(DatasetFormat::Csv),
            "json" => Ok(DatasetFormat::Json),
            other => Err(PipelineError::invalid_argument(format!(
                "Unknown dataset format '{}' (expected csv or json)",
                other
            ))),
        }
    }
}

/// Writes reports and dataset exports below an output directory.
#[derive(Debug, Clone, Default)]
pub struct ReportWriter {
    output: OutputConfig,
}

impl ReportWriter {
    /// Writer placing generated files according to `output`.
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    /// Output directory and file prefix in use.
    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    /// Timestamped file name for the given extension.
    pub fn file_name(&self, extension: &str, at: DateTime<Utc>) -> String {
        format!(
            "{}_{}.{}",
            self.output.prefix,
            at.format("%Y%m%dT%H%M%S"),
            extension
        )
    }

    /// First generated name at `at` that does not exist yet.
    pub fn unused_path(&self, extension: &str, at: DateTime<Utc>) -> PathBuf {
        let base = self.output.directory.join(self.file_name(extension, at));
        if !base.exists() {
            return base;
        }
        let stem = format!("{}_{}", self.output.prefix, at.format("%Y%m%dT%H%M%S"));
        (2u32..)
            .map(|n| {
                self.output
                    .directory
                    .join(format!("{}_{}.{}", stem, n, extension))
            })
            .find(|candidate| !candidate.exists())
            .unwrap_or(base)
    }

    /// Resolves where a file should be written.
    pub fn resolve(&self, destination: Option<&Path>, extension: &str) -> PathBuf {
        let mut path = match destination {
            None => self.unused_path(extension, Utc::now()),
            Some(dest) if is_bare_name(dest) => self.output.directory.join(dest),
            Some(dest) => dest.to_path_buf(),
        };
        if path.extension().is_none() {
            path.set_extension(extension);
        }
        path
    }

    /// Renders `result` and writes it atomically, returning the final path.
    pub fn write_report(
        &self,
        result: &AnalysisResult,
        format: ReportFormat,
        destination: Option<&Path>,
    ) -> Result<PathBuf> {
        let content = render(result, format)?;
        let path = self.resolve(destination, format.extension());
        write_atomic(&path, content.as_bytes())?;
        info!(
            "Wrote {} report for '{}' to {}",
            format,
            result.dataset,
            path.display()
        );
        Ok(path)
    }

    /// Serializes `dataset` and writes it atomically, returning the final path.
    pub fn export_dataset(
        &self,
        dataset: &Dataset,
        format: DatasetFormat,
        destination: Option<&Path>,
    ) -> Result<PathBuf> {
        let content = render_dataset(dataset, format)?;
        let path = self.resolve(destination, format.extension());
        write_atomic(&path, content.as_bytes())?;
        info!(
            "Exported {} records of '{}' as {} to {}",
            dataset.len(),
            dataset.name(),
            format,
            path.display()
        );
        Ok(path)
    }
}

fn is_bare_name(path: &Path) -> bool {
    !path.is_absolute() && path.parent().is_none_or(|p| p.as_os_str().is_empty())
}

/// Serializes a dataset to CSV or JSON text.
pub fn render_dataset(dataset: &Dataset, format: DatasetFormat) -> Result<String> {
    debug!("Serializing {} as {}", dataset, format);
    match format {
        DatasetFormat::Json => {
            let document = serde_json::json!({
                "name": dataset.name(),
                "fields": dataset.fields(),
                "record_count": dataset.len(),
                "records": dataset.to_json_rows(),
            });
            serde_json::to_string_pretty(&document)
                .map_err(|e| PipelineError::serialization("Failed to serialize dataset", e))
        }
        DatasetFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer
                .write_record(dataset.fields())
                .map_err(|e| PipelineError::render("csv", e))?;
            for record in dataset.records() {
                writer
                    .write_record(record.values().iter().map(Value::label))
                    .map_err(|e| PipelineError::render("csv", e))?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| PipelineError::render("csv", e))?;
            String::from_utf8(bytes).map_err(|e| PipelineError::render("csv", e))
        }
    }
}
