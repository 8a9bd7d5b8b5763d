//! Caller-facing operations over one working dataset.
//!
//! A [`Session`] owns the current dataset, the dataset as first loaded, the
//! latest analysis result and the operation log. Every public operation
//! runs to completion and then records exactly one history entry through
//! [`Session::finish`], whether it succeeded or not. A history write that
//! fails is logged and leaves the log flagged untrusted; it never turns a
//! successful operation into a failed one.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tabsurveyor_core::analysis::{self, AnalysisKind, AnalysisResult, ProductSummary, SalesAnalyzer};
use tabsurveyor_core::clean::{self, CleanStep, CleanSummary, NumericValidation, QualityReport};
use tabsurveyor_core::config::SurveyorConfig;
use tabsurveyor_core::history::HistoryStatistics;
use tabsurveyor_core::transform::{self, GroupTotal, Predicate};
use tabsurveyor_core::{
    Dataset, LogStore, NewOperation, OperationEntry, OperationKind, OperationLog, Outcome,
    PipelineError, Result, SortDirection, loader,
};
use tabsurveyor_report::{DatasetFormat, ReportFormat, ReportWriter};
use tracing::{error, info, warn};

/// Records shown by [`Session::summary`].
pub const PREVIEW_RECORDS: usize = 5;

/// How to clean the current dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum CleanMode {
    /// Remove-empty, deduplicate, drop nulls, normalize text
    Full,
    /// The given steps, in exactly this order
    Steps(Vec<CleanStep>),
}

impl CleanMode {
    fn label(&self) -> String {
        match self {
            CleanMode::Full => "full".to_string(),
            CleanMode::Steps(steps) => steps
                .iter()
                .map(CleanStep::name)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// One transformation of the current dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformStep {
    /// Keep records whose field satisfies the predicate
    Filter { field: String, predicate: Predicate },
    /// Keep records whose field lies in `[min, max]`
    Range { field: String, min: f64, max: f64 },
    /// Stable sort on one field
    Sort { field: String, direction: SortDirection },
    /// Replaces the dataset with one record per group: value, count, total
    Group { field: String, amount: String },
    /// First n records
    Head(i64),
    /// Projection to the named fields, in this order
    Select(Vec<String>),
}

impl TransformStep {
    fn name(&self) -> &'static str {
        match self {
            TransformStep::Filter { .. } => "filter",
            TransformStep::Range { .. } => "range",
            TransformStep::Sort { .. } => "sort",
            TransformStep::Group { .. } => "group",
            TransformStep::Head(_) => "head",
            TransformStep::Select(_) => "select",
        }
    }

    fn describe(&self, operation: NewOperation) -> NewOperation {
        let operation = operation.with_parameter("step", self.name());
        match self {
            TransformStep::Filter { field, predicate } => operation
                .with_parameter("field", field)
                .with_parameter("predicate", predicate),
            TransformStep::Range { field, min, max } => operation
                .with_parameter("field", field)
                .with_parameter("min", min)
                .with_parameter("max", max),
            TransformStep::Sort { field, direction } => operation
                .with_parameter("field", field)
                .with_parameter("direction", direction),
            TransformStep::Group { field, amount } => operation
                .with_parameter("field", field)
                .with_parameter("amount", amount),
            TransformStep::Head(n) => operation.with_parameter("n", n),
            TransformStep::Select(fields) => operation.with_parameter("fields", fields.join(",")),
        }
    }
}

/// Where a rendered report goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportDestination {
    /// Returned to the caller for display
    Console,
    /// Written below the output directory, or to the given path
    File(Option<PathBuf>),
}

/// A rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutput {
    /// Rendered text
    Console(String),
    /// Path of the written file
    File(PathBuf),
}

/// What the operation history should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryAction {
    /// Every entry, optionally narrowed to one dataset and/or kind
    List {
        dataset: Option<String>,
        kind: Option<OperationKind>,
    },
    /// The most recent entries, oldest first
    Last(usize),
    /// Counts per kind and outcome
    Stats,
    /// Write the history as text to a file
    Export(PathBuf),
    /// Remove every entry
    Clear,
}

impl HistoryAction {
    /// Every entry, unfiltered.
    pub fn list_all() -> Self {
        HistoryAction::List {
            dataset: None,
            kind: None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            HistoryAction::List { .. } => "list",
            HistoryAction::Last(_) => "last",
            HistoryAction::Stats => "stats",
            HistoryAction::Export(_) => "export",
            HistoryAction::Clear => "clear",
        }
    }
}

/// Result of a history action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutput {
    /// Listed entries
    Entries(Vec<OperationEntry>),
    /// Aggregate counts
    Statistics(HistoryStatistics),
    /// Where the history was written
    Exported(PathBuf),
    /// The log is now empty apart from the clear itself
    Cleared,
}

/// Shape of the current dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    /// Dataset identifier
    pub name: String,
    /// Number of records
    pub record_count: usize,
    /// Field names in schema order
    pub fields: Vec<String>,
}

impl DatasetSummary {
    fn of(dataset: &Dataset) -> Self {
        Self {
            name: dataset.name().to_string(),
            record_count: dataset.len(),
            fields: dataset.fields().to_vec(),
        }
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dataset '{}': {} records, {} fields",
            self.name,
            self.record_count,
            self.fields.len()
        )
    }
}

/// Per-field figures shown in a dataset overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldOverview {
    /// Field name
    pub name: String,
    /// Distinct present values
    pub unique: usize,
    /// Missing values
    pub missing: usize,
}

/// Overview of the current dataset: fields, completeness and a preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetOverview {
    /// Name and size
    pub summary: DatasetSummary,
    /// Per-field figures in schema order
    pub fields: Vec<FieldOverview>,
    /// Absent for an empty dataset
    pub quality: Option<QualityReport>,
    /// First records as (field, value) pairs
    pub preview: Vec<Vec<(String, String)>>,
}

impl fmt::Display for DatasetOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        writeln!(f)?;
        writeln!(f, "FIELDS")?;
        for (position, field) in self.fields.iter().enumerate() {
            writeln!(
                f,
                "  {}. {} ({} unique, {} missing)",
                position + 1,
                field.name,
                field.unique,
                field.missing
            )?;
        }
        if let Some(quality) = &self.quality {
            write!(f, "{}", quality)?;
        }
        for (position, record) in self.preview.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "Record {}:", position + 1)?;
            for (field, value) in record {
                writeln!(f, "  • {}: {}", field, value)?;
            }
        }
        Ok(())
    }
}

/// Working state of one tabsurveyor run.
pub struct Session<S: LogStore> {
    config: SurveyorConfig,
    writer: ReportWriter,
    log: OperationLog<S>,
    dataset: Option<Dataset>,
    original: Option<Dataset>,
    analysis: Option<AnalysisResult>,
}

impl<S: LogStore> Session<S> {
    /// Session with no dataset loaded, recording into `log`.
    pub fn new(config: SurveyorConfig, log: OperationLog<S>) -> Self {
        let writer = ReportWriter::new(config.output.clone());
        Self {
            config,
            writer,
            log,
            dataset: None,
            original: None,
            analysis: None,
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &SurveyorConfig {
        &self.config
    }

    /// The operation history.
    pub fn log(&self) -> &OperationLog<S> {
        &self.log
    }

    /// Mutable access to the operation history and its store.
    pub fn log_mut(&mut self) -> &mut OperationLog<S> {
        &mut self.log
    }

    /// The current dataset, if one is loaded.
    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// The most recent analysis result.
    pub fn last_analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    /// Loads `path`, replacing the current and original dataset.
    pub fn load(&mut self, path: &Path) -> Result<DatasetSummary> {
        let result = loader::load_with(path, &self.config.loader);
        let name = match &result {
            Ok(dataset) => dataset.name().to_string(),
            Err(_) => loader::dataset_name(path),
        };
        let operation = NewOperation::new(OperationKind::Load, name)
            .with_parameter("path", path.display());

        let result = result.map(|dataset| {
            let summary = DatasetSummary::of(&dataset);
            self.original = Some(dataset.clone());
            self.dataset = Some(dataset);
            self.analysis = None;
            summary
        });
        if let Ok(summary) = &result {
            info!("Loaded {}", summary);
        }
        self.finish(operation, result, |s| {
            Some(format!("{} records, {} fields", s.record_count, s.fields.len()))
        })
    }

    /// Reads the field names of `path` without loading its records.
    ///
    /// The current dataset is left untouched.
    pub fn headers(&mut self, path: &Path) -> Result<Vec<String>> {
        let operation = NewOperation::new(OperationKind::Inspect, loader::dataset_name(path))
            .with_parameter("path", path.display());

        let result = loader::read_headers(path, &self.config.loader)
            .map(|schema| schema.fields().to_vec());
        self.finish(operation, result, |fields| Some(format!("{} fields", fields.len())))
    }

    /// Counts the present values of `fields` that are not numeric.
    pub fn validate_numeric(&mut self, fields: &[String]) -> Result<NumericValidation> {
        let operation = self
            .operation(OperationKind::Validate)
            .with_parameter("fields", fields.join(","));

        let result = if fields.is_empty() {
            Err(PipelineError::invalid_argument(
                "Numeric validation needs at least one field",
            ))
        } else {
            self.current()
                .and_then(|dataset| clean::validate_numeric(dataset, fields))
        };
        self.finish(operation, result, |validation| {
            let invalid: usize = validation.invalid_by_field.values().sum();
            Some(format!("{} non-numeric values", invalid))
        })
    }

    /// Sales figures for one product of the current dataset.
    pub fn product_summary(&mut self, product: &str) -> Result<ProductSummary> {
        let operation = self
            .operation(OperationKind::Product)
            .with_parameter("product", product);

        let analyzer = SalesAnalyzer::new(self.config.sales.clone());
        let result = self
            .current()
            .and_then(|dataset| analyzer.product_summary(dataset, product));
        self.finish(operation, result, |summary| {
            Some(format!(
                "{} sales, revenue {}",
                summary.sales_count,
                tabsurveyor_core::model::format_number(summary.revenue)
            ))
        })
    }

    /// Cleans the current dataset.
    pub fn clean(&mut self, mode: &CleanMode) -> Result<Vec<CleanSummary>> {
        let operation = self
            .operation(OperationKind::Clean)
            .with_parameter("mode", mode.label());

        let result = self.current().and_then(|dataset| match mode {
            CleanMode::Full => Ok(clean::full_clean(dataset, &self.config.clean)),
            CleanMode::Steps(steps) => clean::run_pipeline(dataset, steps),
        });
        let result = result.map(|(cleaned, summaries)| {
            self.dataset = Some(cleaned);
            summaries
        });
        self.finish(operation, result, |summaries| {
            let removed: usize = summaries.iter().map(CleanSummary::records_removed).sum();
            let changed: usize = summaries.iter().map(|s| s.values_changed).sum();
            Some(format!("{} records removed, {} values changed", removed, changed))
        })
    }

    /// Applies one transformation to the current dataset.
    pub fn transform(&mut self, step: &TransformStep) -> Result<DatasetSummary> {
        let operation = step.describe(self.operation(OperationKind::Transform));

        let result = self.current().and_then(|dataset| apply_step(dataset, step));
        let result = result.map(|transformed| {
            let summary = DatasetSummary::of(&transformed);
            self.dataset = Some(transformed);
            summary
        });
        self.finish(operation, result, |s| Some(format!("{} records", s.record_count)))
    }

    /// Runs an analysis over the current dataset and keeps its result.
    pub fn analyze(&mut self, kind: AnalysisKind) -> Result<AnalysisResult> {
        let operation = self
            .operation(OperationKind::Analyze)
            .with_parameter("kind", kind);

        let result = self
            .current()
            .and_then(|dataset| analysis::analyze(dataset, kind, &self.config.sales));
        if let Ok(analysis) = &result {
            self.analysis = Some(analysis.clone());
        }
        self.finish(operation, result, |r| Some(format!("{} metrics", r.metrics.len())))
    }

    /// Renders the latest analysis result.
    pub fn report(
        &mut self,
        format: ReportFormat,
        destination: &ReportDestination,
    ) -> Result<ReportOutput> {
        let mut operation = self
            .operation(OperationKind::Report)
            .with_parameter("format", format);
        if let ReportDestination::File(path) = destination {
            operation = operation.with_parameter(
                "destination",
                path.as_ref()
                    .map_or_else(|| "generated".to_string(), |p| p.display().to_string()),
            );
        }

        let result = match &self.analysis {
            None => Err(PipelineError::invalid_argument(
                "No analysis result to report; run an analysis first",
            )),
            Some(analysis) => match destination {
                ReportDestination::Console => {
                    tabsurveyor_report::render(analysis, format).map(ReportOutput::Console)
                }
                ReportDestination::File(path) => self
                    .writer
                    .write_report(analysis, format, path.as_deref())
                    .map(ReportOutput::File),
            },
        };
        self.finish(operation, result, |output| match output {
            ReportOutput::File(path) => Some(format!("written to {}", path.display())),
            ReportOutput::Console(_) => None,
        })
    }

    /// Writes the current dataset to a file.
    pub fn export_dataset(
        &mut self,
        format: DatasetFormat,
        destination: Option<&Path>,
    ) -> Result<PathBuf> {
        let operation = self
            .operation(OperationKind::Export)
            .with_parameter("format", format);

        let result = self
            .current()
            .and_then(|dataset| self.writer.export_dataset(dataset, format, destination));
        self.finish(operation, result, |path| {
            Some(format!("written to {}", path.display()))
        })
    }

    /// Discards every change since the last load.
    pub fn restore(&mut self) -> Result<DatasetSummary> {
        let operation = self.operation(OperationKind::Restore);

        let result = match &self.original {
            None => Err(PipelineError::NoDataset),
            Some(original) => {
                let summary = DatasetSummary::of(original);
                self.dataset = Some(original.clone());
                self.analysis = None;
                Ok(summary)
            }
        };
        self.finish(operation, result, |s| Some(format!("{} records", s.record_count)))
    }

    /// Fields, completeness and the first records of the current dataset.
    pub fn summary(&mut self) -> Result<DatasetOverview> {
        let operation = self.operation(OperationKind::Summary);
        let result = self.current().and_then(overview);
        self.finish(operation, result, |o| {
            Some(format!("{} records previewed", o.preview.len()))
        })
    }

    /// Queries or maintains the operation history.
    ///
    /// Listings reflect the log before this action is recorded. Clearing
    /// leaves exactly one entry behind: the record of the clear itself.
    pub fn history(&mut self, action: &HistoryAction) -> Result<HistoryOutput> {
        let kind = if *action == HistoryAction::Clear {
            OperationKind::HistoryClear
        } else {
            OperationKind::History
        };
        let mut operation = NewOperation::new(kind, "").with_parameter("action", action.name());

        let result = match action {
            HistoryAction::List { dataset, kind } => {
                if let Some(dataset) = dataset {
                    operation = operation.with_parameter("dataset", dataset);
                }
                if let Some(kind) = kind {
                    operation = operation.with_parameter("kind", kind);
                }
                let entries: Vec<OperationEntry> = match (dataset, kind) {
                    (Some(dataset), kind) => self
                        .log
                        .by_dataset(dataset)
                        .into_iter()
                        .filter(|entry| kind.is_none_or(|k| entry.kind == k))
                        .cloned()
                        .collect(),
                    (None, Some(kind)) => self.log.by_kind(*kind).into_iter().cloned().collect(),
                    (None, None) => self.log.all().to_vec(),
                };
                Ok(HistoryOutput::Entries(entries))
            }
            HistoryAction::Last(n) => {
                operation = operation.with_parameter("n", n);
                Ok(HistoryOutput::Entries(self.log.last(*n).to_vec()))
            }
            HistoryAction::Stats => Ok(HistoryOutput::Statistics(self.log.statistics())),
            HistoryAction::Export(path) => {
                operation = operation.with_parameter("path", path.display());
                self.log
                    .export(path)
                    .map(|()| HistoryOutput::Exported(path.clone()))
            }
            HistoryAction::Clear => self.log.clear().map(|()| HistoryOutput::Cleared),
        };
        self.finish(operation, result, |_| None)
    }

    /// Post-operation hook: records the outcome of one operation.
    fn finish<T>(
        &mut self,
        operation: NewOperation,
        result: Result<T>,
        detail: impl FnOnce(&T) -> Option<String>,
    ) -> Result<T> {
        let outcome = match &result {
            Ok(value) => Outcome::success(detail(value)),
            Err(e) => {
                warn!("{} failed: {}", operation.kind, e);
                Outcome::failure(e.to_string())
            }
        };
        if let Err(e) = self.log.append(operation.with_outcome(outcome)) {
            error!(
                "Operation history at {} is out of date: {}",
                self.log.store().location(),
                e
            );
        }
        result
    }

    fn operation(&self, kind: OperationKind) -> NewOperation {
        let dataset = self.dataset.as_ref().map(Dataset::name).unwrap_or_default();
        NewOperation::new(kind, dataset)
    }

    fn current(&self) -> Result<&Dataset> {
        self.dataset.as_ref().ok_or(PipelineError::NoDataset)
    }
}

fn apply_step(dataset: &Dataset, step: &TransformStep) -> Result<Dataset> {
    match step {
        TransformStep::Filter { field, predicate } => {
            transform::filter_by_field(dataset, field, predicate)
        }
        TransformStep::Range { field, min, max } => {
            transform::filter_by_range(dataset, field, *min, *max)
        }
        TransformStep::Sort { field, direction } => {
            transform::sort_by_field(dataset, field, *direction)
        }
        TransformStep::Group { field, amount } => {
            let groups = transform::group_and_total(dataset, field, amount)?;
            grouped(dataset.name(), field, &groups)
        }
        TransformStep::Head(n) => transform::head(dataset, *n),
        TransformStep::Select(fields) => transform::select_fields(dataset, fields),
    }
}

/// Dataset with one record per group, ordered by group value.
///
/// Columns are the group field, `count` and `total`; a column name already
/// taken gets a `_2`, `_3`, ... suffix.
fn grouped(
    name: &str,
    field: &str,
    groups: &std::collections::BTreeMap<String, GroupTotal>,
) -> Result<Dataset> {
    let mut columns = vec![field.to_string()];
    for base in ["count", "total"] {
        let column = free_column(base, &columns);
        columns.push(column);
    }
    let rows = groups.iter().map(|(group, totals)| {
        vec![
            group.clone(),
            totals.count.to_string(),
            tabsurveyor_core::model::format_number(totals.total),
        ]
    });
    Dataset::from_rows(name, columns, rows)
}

fn free_column(base: &str, taken: &[String]) -> String {
    let mut column = base.to_string();
    let mut suffix = 2;
    while taken.contains(&column) {
        column = format!("{}_{}", base, suffix);
        suffix += 1;
    }
    column
}

fn overview(dataset: &Dataset) -> Result<DatasetOverview> {
    let mut fields = Vec::with_capacity(dataset.fields().len());
    for field in dataset.fields() {
        let column = dataset.column(field)?;
        let missing = column.iter().filter(|v| v.is_missing()).count();
        let unique: BTreeSet<String> = column
            .iter()
            .filter(|v| !v.is_missing())
            .map(|v| v.label())
            .collect();
        fields.push(FieldOverview {
            name: field.clone(),
            unique: unique.len(),
            missing,
        });
    }

    let quality = if dataset.is_empty() {
        None
    } else {
        Some(clean::quality_report(dataset)?)
    };

    let preview = dataset
        .records()
        .iter()
        .take(PREVIEW_RECORDS)
        .map(|record| {
            dataset
                .fields()
                .iter()
                .zip(record.values())
                .map(|(field, value)| (field.clone(), value.label()))
                .collect()
        })
        .collect();

    Ok(DatasetOverview {
        summary: DatasetSummary::of(dataset),
        fields,
        quality,
        preview,
    })
}
