//! Statistical analysis of datasets.
//!
//! Analyzers implement [`Analyzer`] and are chosen through the closed
//! [`AnalysisKind`] set:
//! - **General**: per-field descriptive statistics
//! - **Sales**: revenue totals, breakdowns and rankings
//! - **Basic**: dataset name, record count and field list
//!
//! # Example
//! ```rust
//! use tabsurveyor_core::analysis::{AnalysisKind, analyze};
//! use tabsurveyor_core::config::SalesFields;
//! use tabsurveyor_core::model::Dataset;
//!
//! let dataset = Dataset::from_rows("scores", ["score"], [vec!["10"], vec!["20"], vec!["30"]])?;
//! let result = analyze(&dataset, AnalysisKind::General, &SalesFields::default())?;
//! assert_eq!(result.record_count, 3);
//! # Ok::<(), tabsurveyor_core::PipelineError>(())
//! ```

pub mod basic;
pub mod general;
pub mod models;
pub mod sales;
pub mod stats;

pub use basic::DatasetProfile;
pub use general::{GeneralStatistics, numeric_fields};
pub use models::{AnalysisKind, AnalysisResult, MetricValue};
pub use sales::{ProductSummary, SalesAnalyzer};

use crate::config::SalesFields;
use crate::error::Result;
use crate::model::Dataset;

/// A statistics computation over a dataset.
pub trait Analyzer {
    /// Which analysis this is.
    fn kind(&self) -> AnalysisKind;

    /// Runs the analysis.
    ///
    /// # Errors
    /// The statistical analyzers fail with `EmptyDataset` when the dataset
    /// has no records, plus any analyzer-specific schema errors.
    fn analyze(&self, dataset: &Dataset) -> Result<AnalysisResult>;
}

/// Creates the analyzer for `kind`.
pub fn analyzer_for(kind: AnalysisKind, sales_fields: &SalesFields) -> Box<dyn Analyzer> {
    match kind {
        AnalysisKind::General => Box::new(GeneralStatistics),
        AnalysisKind::Sales => Box::new(SalesAnalyzer::new(sales_fields.clone())),
        AnalysisKind::Basic => Box::new(DatasetProfile),
    }
}

/// Runs the analyzer for `kind` over `dataset`.
pub fn analyze(
    dataset: &Dataset,
    kind: AnalysisKind,
    sales_fields: &SalesFields,
) -> Result<AnalysisResult> {
    analyzer_for(kind, sales_fields).analyze(dataset)
}
