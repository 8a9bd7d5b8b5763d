//! Command-line front-end for tabsurveyor.
//!
//! The binary is a thin layer over [`session::Session`]: arguments are
//! parsed and validated here, every operation goes through the session so
//! it lands in the operation history, and results are printed to the given
//! writer.

pub mod session;
pub mod steps;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tabsurveyor_core::config::{SurveyorConfig, TextEncoding};
use tabsurveyor_core::{
    AnalysisKind, FileStore, LogStore, OperationKind, OperationLog, PipelineError,
};
use tabsurveyor_report::{DatasetFormat, ReportFormat};
use tracing::warn;

use crate::session::{HistoryAction, HistoryOutput, ReportDestination, ReportOutput, Session};
use crate::steps::PipelineStep;

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "tabsurveyor")]
#[command(about = "Load, clean, analyze and report on delimited data files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "
tabsurveyor - offline tabular data pipeline

Loads a CSV file, applies cleaning and transformation steps in the order
given, runs general or sales statistics (or a basic dataset report), and
writes text, JSON or XML reports. Every operation is recorded in a local
history file.

STEPS:
  clean:full | clean:dedupe | clean:empty | clean:drop-nulls
  clean:fill:VALUE | clean:normalize[:lower|:upper]
  filter:FIELD:OP:VALUE   (OP: eq ne contains matches gt ge lt le)
  range:FIELD:MIN:MAX | sort:FIELD[:desc] | group:FIELD:AMOUNT
  head:N | select:FIELD,FIELD

EXAMPLES:
  tabsurveyor run --input data/sales.csv --step clean:full --analyze sales --report text
  tabsurveyor run -i sales.csv --step filter:region:eq:North --step sort:total:desc --export csv
  tabsurveyor run -i sales.csv --validate quantity,total --product Laptop
  tabsurveyor run -i sales.csv --analyze basic --report xml
  tabsurveyor fields -i sales.csv
  tabsurveyor history list --dataset sales --kind report
  tabsurveyor history last 10
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a file and run a pipeline over it
    Run(RunArgs),
    /// List the field names of a file without loading it
    Fields(FieldsArgs),
    /// Inspect or maintain the operation history
    History(HistoryArgs),
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all log output except errors")]
    pub quiet: bool,

    /// Structured logs
    #[arg(long, global = true, help = "Emit log lines as JSON")]
    pub log_json: bool,

    /// Configuration file
    #[arg(long, global = true, env = "TABSURVEYOR_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// History file location
    #[arg(long, global = true, env = "TABSURVEYOR_HISTORY", value_name = "FILE")]
    pub history: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Delimited input file
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Pipeline step, applied in the order given
    #[arg(long = "step", value_name = "STEP")]
    pub steps: Vec<PipelineStep>,

    /// Print fields, completeness and the first records after loading
    #[arg(long)]
    pub summary: bool,

    /// Count non-numeric values in these fields after the steps
    #[arg(long, value_delimiter = ',', value_name = "FIELD")]
    pub validate: Vec<String>,

    /// Analysis to run after the steps (general, sales or basic)
    #[arg(short, long, value_name = "KIND")]
    pub analyze: Option<AnalysisKind>,

    /// Print sales figures for a product; repeatable
    #[arg(long, value_name = "NAME")]
    pub product: Vec<String>,

    /// Report format to produce; repeatable
    #[arg(short, long = "report", value_name = "FORMAT")]
    pub reports: Vec<ReportFormat>,

    /// Print reports instead of writing files
    #[arg(long)]
    pub console: bool,

    /// Export the resulting dataset (csv or json)
    #[arg(long, value_name = "FORMAT")]
    pub export: Option<DatasetFormat>,

    /// Directory for reports and exports
    #[arg(long, env = "TABSURVEYOR_OUTPUT_DIR", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Prefix for generated file names
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Field delimiter
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,

    /// Candidate encodings, tried in order
    #[arg(long, value_delimiter = ',', value_name = "ENCODING")]
    pub encoding: Vec<TextEncoding>,
}

#[derive(Debug, Args)]
pub struct FieldsArgs {
    /// Delimited input file
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Field delimiter
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub action: HistoryCommand,

    /// Print listings and statistics as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum HistoryCommand {
    /// All recorded operations
    List {
        /// Only operations on this dataset
        #[arg(long, value_name = "NAME")]
        dataset: Option<String>,
        /// Only operations of this kind (load, clean, report, ...)
        #[arg(long, value_name = "KIND")]
        kind: Option<OperationKind>,
    },
    /// The most recent operations, oldest first
    Last {
        #[arg(default_value_t = 10)]
        n: usize,
    },
    /// Counts per operation kind and outcome
    Stats,
    /// Write the history as text
    Export { path: PathBuf },
    /// Remove every recorded operation
    Clear,
}

impl From<&HistoryCommand> for HistoryAction {
    fn from(command: &HistoryCommand) -> Self {
        match command {
            HistoryCommand::List { dataset, kind } => HistoryAction::List {
                dataset: dataset.clone(),
                kind: *kind,
            },
            HistoryCommand::Last { n } => HistoryAction::Last(*n),
            HistoryCommand::Stats => HistoryAction::Stats,
            HistoryCommand::Export { path } => HistoryAction::Export(path.clone()),
            HistoryCommand::Clear => HistoryAction::Clear,
        }
    }
}

/// Builds the effective configuration: file first, then flags.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<SurveyorConfig> {
    let mut config = match &cli.global.config {
        Some(path) => SurveyorConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => SurveyorConfig::default(),
    };

    if let Some(history) = &cli.global.history {
        config.history_path = history.clone();
    }
    match &cli.command {
        Command::Run(run) => {
            if let Some(dir) = &run.output_dir {
                config.output.directory = dir.clone();
            }
            if let Some(prefix) = &run.prefix {
                config.output.prefix = prefix.clone();
            }
            if let Some(delimiter) = run.delimiter {
                config.loader.delimiter = delimiter;
            }
            if !run.encoding.is_empty() {
                config.loader.encodings = run.encoding.clone();
            }
        }
        Command::Fields(fields) => {
            if let Some(delimiter) = fields.delimiter {
                config.loader.delimiter = delimiter;
            }
        }
        Command::History(_) => {}
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Opens the history file, setting a corrupt one aside.
///
/// A corrupt history never blocks a run: the file is renamed next to its
/// original location and an empty log takes its place. A file that cannot
/// be read at all is left in place and reported as an error.
pub fn open_history(path: &Path) -> anyhow::Result<OperationLog<FileStore>> {
    let store = FileStore::new(path);
    match OperationLog::open(store.clone()) {
        Ok(log) => Ok(log),
        Err(PipelineError::CorruptHistory { reason, .. }) => {
            warn!(
                "History at {} cannot be read ({}); starting a new one",
                path.display(),
                reason
            );
            store
                .quarantine()
                .context("Failed to move the unreadable history aside")?;
            Ok(OperationLog::fresh(store))
        }
        Err(e) => Err(e.into()),
    }
}

/// Runs the `run` command.
///
/// Stops at the first failing operation; that failure is already recorded
/// in the history when it is returned.
pub fn run_pipeline<S: LogStore>(
    session: &mut Session<S>,
    args: &RunArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    if args.analyze.is_none() && !args.reports.is_empty() {
        anyhow::bail!("--report needs an analysis; add --analyze general or --analyze sales");
    }

    let loaded = session
        .load(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    writeln!(out, "{}", loaded)?;

    if args.summary {
        let overview = session.summary()?;
        writeln!(out, "{}", overview)?;
    }

    for step in &args.steps {
        match step {
            PipelineStep::Clean(mode) => {
                for summary in session.clean(mode)? {
                    writeln!(out, "{}", summary)?;
                }
            }
            PipelineStep::Transform(transform) => {
                let summary = session.transform(transform)?;
                writeln!(out, "{}", summary)?;
            }
        }
    }

    if !args.validate.is_empty() {
        let validation = session.validate_numeric(&args.validate)?;
        writeln!(out, "{}", validation)?;
    }

    if let Some(kind) = args.analyze {
        let result = session.analyze(kind)?;
        writeln!(
            out,
            "Computed {} metrics for '{}'",
            result.metrics.len(),
            result.dataset
        )?;
    }

    for product in &args.product {
        let summary = session.product_summary(product)?;
        writeln!(out, "{}", summary)?;
    }

    let destination = if args.console {
        ReportDestination::Console
    } else {
        ReportDestination::File(None)
    };
    for format in &args.reports {
        match session.report(*format, &destination)? {
            ReportOutput::Console(text) => writeln!(out, "{}", text)?,
            ReportOutput::File(path) => writeln!(out, "Report written to {}", path.display())?,
        }
    }

    if let Some(format) = args.export {
        let path = session.export_dataset(format, None)?;
        writeln!(out, "Dataset exported to {}", path.display())?;
    }
    Ok(())
}

/// Runs the `fields` command.
pub fn run_fields<S: LogStore>(
    session: &mut Session<S>,
    args: &FieldsArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let fields = session
        .headers(&args.input)
        .with_context(|| format!("Failed to read fields of {}", args.input.display()))?;
    for (position, field) in fields.iter().enumerate() {
        writeln!(out, "{:>3}. {}", position + 1, field)?;
    }
    Ok(())
}

/// Runs the `history` command.
pub fn run_history<S: LogStore>(
    session: &mut Session<S>,
    args: &HistoryArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match session.history(&HistoryAction::from(&args.action))? {
        HistoryOutput::Entries(entries) => {
            if args.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
            } else if entries.is_empty() {
                writeln!(out, "No operations recorded")?;
            } else {
                write!(out, "{}", tabsurveyor_core::history::render_entries(&entries))?;
            }
        }
        HistoryOutput::Statistics(stats) => {
            if args.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
            } else {
                write!(out, "{}", stats)?;
            }
        }
        HistoryOutput::Exported(path) => writeln!(out, "History exported to {}", path.display())?,
        HistoryOutput::Cleared => writeln!(out, "History cleared")?,
    }
    Ok(())
}
