//! Pipeline configuration.
//!
//! Groups loader, cleaning, sales analysis, output and history settings.
//! Every section has sensible defaults so an empty JSON object is a valid
//! configuration file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Text encodings the loader can try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    /// Strict UTF-8; a leading BOM is stripped
    Utf8,
    /// ISO-8859-1 (decoded through windows-1252)
    Latin1,
}

impl TextEncoding {
    /// Human-readable label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Latin1 => "Latin-1",
        }
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(PipelineError::configuration(format!(
                "Unsupported encoding '{}'",
                other
            ))),
        }
    }
}

/// Loader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Encodings tried in order
    pub encodings: Vec<TextEncoding>,
    /// Field delimiter (single ASCII character)
    pub delimiter: char,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            encodings: vec![TextEncoding::Utf8, TextEncoding::Latin1],
            delimiter: ',',
        }
    }
}

impl LoaderConfig {
    /// Creates a loader config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the candidate encodings.
    pub fn with_encodings(mut self, encodings: Vec<TextEncoding>) -> Self {
        self.encodings = encodings;
        self
    }

    /// Builder method to set the delimiter.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Delimiter as a byte for the csv reader.
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(|b| b.is_ascii() && *b != b'"' && *b != b'\n' && *b != b'\r')
            .ok_or_else(|| {
                PipelineError::configuration(format!(
                    "Delimiter {:?} must be a single ASCII character other than a quote or newline",
                    self.delimiter
                ))
            })
    }

    /// Validates the loader configuration.
    pub fn validate(&self) -> Result<()> {
        if self.encodings.is_empty() {
            return Err(PipelineError::configuration(
                "At least one encoding must be configured",
            ));
        }
        self.delimiter_byte()?;
        Ok(())
    }
}

/// Case folding applied by text normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseFold {
    Lower,
    Upper,
}

/// Cleaning configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Case folding used by the full clean's normalization step
    pub case_fold: Option<CaseFold>,
}

impl CleanConfig {
    /// Builder method to set case folding.
    pub fn with_case_fold(mut self, case_fold: Option<CaseFold>) -> Self {
        self.case_fold = case_fold;
        self
    }
}

/// Column names consumed by the sales analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesFields {
    pub quantity: String,
    pub unit_price: String,
    pub total: String,
    pub product: String,
    pub category: String,
    pub region: String,
    pub salesperson: String,
    /// Optional; revenue by date is reported only when this field exists
    pub date: String,
}

impl Default for SalesFields {
    fn default() -> Self {
        Self {
            quantity: "quantity".to_string(),
            unit_price: "unit_price".to_string(),
            total: "total".to_string(),
            product: "product".to_string(),
            category: "category".to_string(),
            region: "region".to_string(),
            salesperson: "salesperson".to_string(),
            date: "date".to_string(),
        }
    }
}

impl SalesFields {
    /// Required fields in the order they are checked.
    pub fn required(&self) -> [&str; 7] {
        [
            &self.quantity,
            &self.unit_price,
            &self.total,
            &self.product,
            &self.category,
            &self.region,
            &self.salesperson,
        ]
    }

    /// Validates that no field name is blank.
    pub fn validate(&self) -> Result<()> {
        if self.required().iter().any(|f| f.trim().is_empty()) {
            return Err(PipelineError::configuration(
                "Sales field names must not be empty",
            ));
        }
        Ok(())
    }
}

/// Report and export output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving reports and exports
    pub directory: PathBuf,
    /// Prefix for generated file names
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("reports"),
            prefix: "report".to_string(),
        }
    }
}

impl OutputConfig {
    /// Builder method to set the output directory.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Builder method to set the file name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Validates the output configuration.
    pub fn validate(&self) -> Result<()> {
        let prefix = self.prefix.trim();
        if prefix.is_empty() {
            return Err(PipelineError::configuration("Output prefix must not be empty"));
        }
        if prefix.contains(['/', '\\']) {
            return Err(PipelineError::configuration(
                "Output prefix must not contain path separators",
            ));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyorConfig {
    pub loader: LoaderConfig,
    pub clean: CleanConfig,
    pub sales: SalesFields,
    pub output: OutputConfig,
    /// Location of the operation history file
    pub history_path: PathBuf,
}

impl Default for SurveyorConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            clean: CleanConfig::default(),
            sales: SalesFields::default(),
            output: OutputConfig::default(),
            history_path: PathBuf::from("tabsurveyor_history.json"),
        }
    }
}

impl SurveyorConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a configuration from a JSON file; missing keys take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::not_found(path)
            } else {
                PipelineError::io(format!("Failed to read config {}", path.display()), e)
            }
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            PipelineError::serialization(format!("Invalid config {}", path.display()), e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the loader configuration.
    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    /// Builder method to set the cleaning configuration.
    pub fn with_clean(mut self, clean: CleanConfig) -> Self {
        self.clean = clean;
        self
    }

    /// Builder method to set the sales field names.
    pub fn with_sales(mut self, sales: SalesFields) -> Self {
        self.sales = sales;
        self
    }

    /// Builder method to set the output configuration.
    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    /// Builder method to set the history file location.
    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = path.into();
        self
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.loader.validate()?;
        self.sales.validate()?;
        self.output.validate()?;
        if self.history_path.as_os_str().is_empty() {
            return Err(PipelineError::configuration("History path must not be empty"));
        }
        Ok(())
    }
}
