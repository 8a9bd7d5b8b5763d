//! Core data structures and processing for tabsurveyor.
//!
//! This crate holds everything between a delimited file on disk and a
//! finished analysis: the dataset model, the loader, cleaning and
//! transformation operators, the statistical analyzers and the durable
//! operation history. Report rendering and the command-line front-end live
//! in the sibling crates.
//!
//! # Guarantees
//! - Operators never mutate their input dataset
//! - Every persisted file is replaced atomically
//! - Fully offline and synchronous
//!
//! # Example
//! ```rust,no_run
//! use tabsurveyor_core::{clean, config::SurveyorConfig, loader};
//!
//! let config = SurveyorConfig::default();
//! let dataset = loader::load_with("sales.csv", &config.loader)?;
//! let (cleaned, summaries) = clean::full_clean(&dataset, &config.clean);
//! for summary in &summaries {
//!     println!("{summary}");
//! }
//! println!("{cleaned}");
//! # Ok::<(), tabsurveyor_core::PipelineError>(())
//! ```

pub mod analysis;
pub mod clean;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod history;
pub mod loader;
pub mod logging;
pub mod model;
pub mod transform;

// Re-export commonly used types
pub use analysis::{AnalysisKind, AnalysisResult, Analyzer, MetricValue};
pub use clean::{CleanStep, CleanSummary, NullStrategy};
pub use config::{CaseFold, LoaderConfig, SalesFields, SurveyorConfig, TextEncoding};
pub use error::{PipelineError, Result};
pub use history::{
    FileStore, LogStore, MemoryStore, NewOperation, OperationEntry, OperationKind, OperationLog,
    Outcome,
};
pub use model::{Dataset, Record, Schema, SortDirection, Value};
pub use transform::{GroupTotal, Predicate};
