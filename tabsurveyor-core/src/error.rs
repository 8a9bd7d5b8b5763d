//! Error types for the tabsurveyor pipeline.
//!
//! Every component validates its inputs eagerly and fails with a specific
//! variant instead of surfacing a generic I/O or runtime fault. Callers
//! present the error and carry on; nothing in this crate aborts the process.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for tabsurveyor operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input path does not resolve to a readable file
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Source content is structurally invalid (header or row shape)
    #[error("Invalid file format: {message}")]
    Format { message: String },

    /// None of the candidate encodings could decode the content
    #[error("Could not decode {} with any of: {}", path.display(), tried.join(", "))]
    Encoding { path: PathBuf, tried: Vec<String> },

    /// A named field is not part of the dataset schema
    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    /// A parameter is out of its valid domain
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Analysis requested on a dataset without records
    #[error("Dataset is empty: {operation} requires at least one record")]
    EmptyDataset { operation: String },

    /// A field required by an analysis is absent from the schema
    #[error("Missing required field '{field}'")]
    MissingField { field: String },

    /// No dataset is loaded in the session
    #[error("No dataset loaded")]
    NoDataset,

    /// The operation history could not be persisted
    #[error("History persistence failed: {context}")]
    Persistence {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The operation history on disk cannot be read back
    #[error("History store at {} is corrupt: {reason}", path.display())]
    CorruptHistory { path: PathBuf, reason: String },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed
    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A report or export could not be rendered
    #[error("Failed to render {format} output: {message}")]
    Render { format: String, message: String },

    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Convenience type alias for Results with `PipelineError`
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Creates a not-found error for the given path
    pub fn not_found(path: impl AsRef<Path>) -> Self {
        Self::NotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Creates an unknown field error
    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }

    /// Creates an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an empty dataset error naming the refused operation
    pub fn empty_dataset(operation: impl Into<String>) -> Self {
        Self::EmptyDataset {
            operation: operation.into(),
        }
    }

    /// Creates a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates a persistence error with context
    pub fn persistence<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Persistence {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a serialization error with context
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Creates a render error for the named output format
    pub fn render(format: impl Into<String>, message: impl ToString) -> Self {
        Self::Render {
            format: format.into(),
            message: message.to_string(),
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Short machine-friendly name of the error kind, used in history entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Format { .. } => "format",
            Self::Encoding { .. } => "encoding",
            Self::UnknownField { .. } => "unknown_field",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::EmptyDataset { .. } => "empty_dataset",
            Self::MissingField { .. } => "missing_field",
            Self::NoDataset => "no_dataset",
            Self::Persistence { .. } => "persistence",
            Self::CorruptHistory { .. } => "corrupt_history",
            Self::Io { .. } => "io",
            Self::Serialization { .. } => "serialization",
            Self::Render { .. } => "render",
            Self::Configuration { .. } => "configuration",
        }
    }
}
