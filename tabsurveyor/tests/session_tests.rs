//! Session operation tests against an in-memory history.
//!
//! This test suite covers:
//! - Exactly one history entry per caller-facing operation
//! - Failures recorded with their message
//! - History write failures never failing the operation itself
//! - Restore, grouping and explicit cleaning step order
//! - Header inspection, numeric validation, product figures and filtered
//!   history listings

use std::fs;
use std::path::PathBuf;

use tabsurveyor::session::{
    CleanMode, HistoryAction, HistoryOutput, ReportDestination, ReportOutput, Session,
    TransformStep,
};
use tabsurveyor_core::clean::{CleanStep, NullStrategy};
use tabsurveyor_core::history::OperationEntry;
use tabsurveyor_core::config::{CaseFold, OutputConfig, SurveyorConfig};
use tabsurveyor_core::{
    AnalysisKind, MemoryStore, MetricValue, OperationKind, OperationLog, PipelineError,
    SortDirection,
};
use tabsurveyor_report::{DatasetFormat, ReportFormat};
use tempfile::TempDir;

const SALES: &str = "\
product,category,region,salesperson,quantity,unit_price,total
Laptop,Electronics,North,Ana,2,1000,2000
Mouse,Accessories,South,Luis,3,25,75
Laptop,Electronics,North,Ana,2,1000,2000
Desk,Furniture,,Ana,1,350,350
";

struct Fixture {
    dir: TempDir,
    input: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sales.csv");
    fs::write(&input, SALES).unwrap();
    Fixture { dir, input }
}

fn session(fixture: &Fixture) -> Session<MemoryStore> {
    let config = SurveyorConfig::default()
        .with_output(OutputConfig::default().with_directory(fixture.dir.path().join("out")));
    Session::new(config, OperationLog::fresh(MemoryStore::new()))
}

fn kinds(session: &Session<MemoryStore>) -> Vec<OperationKind> {
    session.log().all().iter().map(|e| e.kind).collect()
}

#[test]
fn test_every_operation_records_one_entry() {
    let fx = fixture();
    let mut session = session(&fx);

    session.load(&fx.input).unwrap();
    session.summary().unwrap();
    session.clean(&CleanMode::Full).unwrap();
    session
        .transform(&TransformStep::Sort {
            field: "total".to_string(),
            direction: SortDirection::Descending,
        })
        .unwrap();
    session.analyze(AnalysisKind::Sales).unwrap();
    session
        .report(ReportFormat::Text, &ReportDestination::Console)
        .unwrap();
    session.export_dataset(DatasetFormat::Csv, None).unwrap();
    session.restore().unwrap();
    session.history(&HistoryAction::Stats).unwrap();

    assert_eq!(
        kinds(&session),
        vec![
            OperationKind::Load,
            OperationKind::Summary,
            OperationKind::Clean,
            OperationKind::Transform,
            OperationKind::Analyze,
            OperationKind::Report,
            OperationKind::Export,
            OperationKind::Restore,
            OperationKind::History,
        ]
    );
    assert!(session.log().all().iter().all(|e| e.outcome.is_success()));
    assert!(session.log().all()[1..8].iter().all(|e| e.dataset == "sales"));
    assert_eq!(session.log().store().saved().len(), 9);
}

#[test]
fn test_full_clean_then_sales_analysis() {
    let fx = fixture();
    let mut session = session(&fx);

    let loaded = session.load(&fx.input).unwrap();
    assert_eq!(loaded.record_count, 4);

    let summaries = session.clean(&CleanMode::Full).unwrap();
    let names: Vec<&str> = summaries.iter().map(|s| s.operation.as_str()).collect();
    assert_eq!(names.len(), 4);
    assert_eq!(session.dataset().unwrap().len(), 2);

    let result = session.analyze(AnalysisKind::Sales).unwrap();
    assert_eq!(result.metric("total_revenue"), Some(&MetricValue::Number(2075.0)));
    assert_eq!(session.last_analysis(), Some(&result));

    let entry = &session.log().all()[1];
    assert_eq!(entry.parameters["mode"], "full");
    assert_eq!(
        entry.outcome.message.as_deref(),
        Some("2 records removed, 0 values changed")
    );
}

#[test]
fn test_failures_are_recorded() {
    let fx = fixture();
    let mut session = session(&fx);

    let result = session.clean(&CleanMode::Full);
    assert!(matches!(result, Err(PipelineError::NoDataset)));

    let missing = fx.dir.path().join("absent.csv");
    assert!(matches!(session.load(&missing), Err(PipelineError::NotFound { .. })));

    let entries = session.log().all();
    assert_eq!(entries.len(), 2);
    assert!(!entries[0].outcome.is_success());
    assert_eq!(entries[0].outcome.message.as_deref(), Some("No dataset loaded"));
    assert_eq!(entries[0].dataset, "");
    assert_eq!(entries[1].kind, OperationKind::Load);
    assert_eq!(entries[1].dataset, "absent");
}

#[test]
fn test_report_requires_analysis() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();

    let result = session.report(ReportFormat::Json, &ReportDestination::File(None));
    assert!(matches!(result, Err(PipelineError::InvalidArgument { .. })));
    assert_eq!(session.log().len(), 2);
    assert!(!session.log().all()[1].outcome.is_success());
}

#[test]
fn test_report_file_lands_in_output_directory() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();
    session.analyze(AnalysisKind::General).unwrap();

    let output = session
        .report(
            ReportFormat::Xml,
            &ReportDestination::File(Some(PathBuf::from("weekly"))),
        )
        .unwrap();
    let expected = fx.dir.path().join("out").join("weekly.xml");
    assert_eq!(output, ReportOutput::File(expected.clone()));
    assert!(fs::read_to_string(expected).unwrap().contains("<report kind=\"general\""));
    assert_eq!(session.log().all()[2].parameters["destination"], "weekly");
}

#[test]
fn test_history_write_failure_keeps_operation_result() {
    let fx = fixture();
    let mut session = session(&fx);

    session.log_mut().store_mut().set_fail_writes(true);
    let loaded = session.load(&fx.input).unwrap();
    assert_eq!(loaded.record_count, 4);
    assert!(!session.log().is_trusted());
    assert_eq!(session.log().len(), 1);
    assert!(session.log().store().saved().is_empty());

    session.log_mut().store_mut().set_fail_writes(false);
    session.summary().unwrap();
    assert!(session.log().is_trusted());
    assert_eq!(session.log().store().saved().len(), 2);
}

#[test]
fn test_history_clear_leaves_one_entry() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();
    session.summary().unwrap();

    let output = session.history(&HistoryAction::Clear).unwrap();
    assert_eq!(output, HistoryOutput::Cleared);
    assert_eq!(kinds(&session), vec![OperationKind::HistoryClear]);
    assert_eq!(session.log().store().saved().len(), 1);
}

#[test]
fn test_history_last_lists_before_recording() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();
    session.summary().unwrap();
    session.restore().unwrap();

    match session.history(&HistoryAction::Last(10)).unwrap() {
        HistoryOutput::Entries(entries) => {
            assert_eq!(entries.len(), 3);
            assert_eq!(entries[0].kind, OperationKind::Load);
            assert_eq!(entries[2].kind, OperationKind::Restore);
        }
        other => panic!("expected entries, got {:?}", other),
    }
    assert_eq!(session.log().len(), 4);
    assert_eq!(session.log().all()[3].parameters["n"], "10");
}

#[test]
fn test_restore_discards_changes() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();
    session.transform(&TransformStep::Head(1)).unwrap();
    assert_eq!(session.dataset().unwrap().len(), 1);

    let restored = session.restore().unwrap();
    assert_eq!(restored.record_count, 4);
    assert_eq!(session.dataset().unwrap().len(), 4);
}

#[test]
fn test_restore_without_dataset_fails() {
    let fx = fixture();
    let mut session = session(&fx);
    assert!(matches!(session.restore(), Err(PipelineError::NoDataset)));
}

#[test]
fn test_group_transform_builds_group_dataset() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();

    let summary = session
        .transform(&TransformStep::Group {
            field: "region".to_string(),
            amount: "total".to_string(),
        })
        .unwrap();
    assert_eq!(summary.fields, vec!["region", "count", "total"]);
    assert_eq!(summary.record_count, 3);

    let grouped = session.dataset().unwrap();
    let rows: Vec<Vec<String>> = grouped
        .records()
        .iter()
        .map(|r| r.values().iter().map(|v| v.label()).collect())
        .collect();
    assert_eq!(
        rows,
        vec![
            vec!["<null>", "1", "350"],
            vec!["North", "2", "4000"],
            vec!["South", "1", "75"],
        ]
    );
}

#[test]
fn test_transform_errors_leave_dataset_unchanged() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();

    let result = session.transform(&TransformStep::Range {
        field: "total".to_string(),
        min: 10.0,
        max: 1.0,
    });
    assert!(matches!(result, Err(PipelineError::InvalidArgument { .. })));
    assert_eq!(session.dataset().unwrap().len(), 4);
    assert_eq!(session.log().all()[1].parameters["step"], "range");
}

#[test]
fn test_clean_steps_run_in_given_order() {
    let fx = fixture();
    let fill = CleanStep::HandleNulls(NullStrategy::fill_all("  Unknown  "));
    let normalize = CleanStep::NormalizeText(Some(CaseFold::Lower));

    let mut first = session(&fx);
    first.load(&fx.input).unwrap();
    first
        .clean(&CleanMode::Steps(vec![fill.clone(), normalize.clone()]))
        .unwrap();

    let mut second = session(&fx);
    second.load(&fx.input).unwrap();
    second.clean(&CleanMode::Steps(vec![normalize, fill])).unwrap();

    let region = |s: &Session<MemoryStore>| {
        let dataset = s.dataset().unwrap();
        dataset.value(&dataset.records()[3], "region").unwrap().label()
    };
    assert_eq!(region(&first), "unknown");
    assert_eq!(region(&second), "  Unknown  ");
    assert_eq!(
        first.log().all()[1].parameters["mode"],
        "fill_nulls,normalize_text"
    );
}

#[test]
fn test_summary_overview() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();

    let overview = session.summary().unwrap();
    assert_eq!(overview.summary.record_count, 4);
    assert_eq!(overview.preview.len(), 4);
    let region = overview.fields.iter().find(|f| f.name == "region").unwrap();
    assert_eq!((region.unique, region.missing), (2, 1));
    assert!(overview.quality.is_some());
    assert!(overview.to_string().contains("3. region (2 unique, 1 missing)"));
}

#[test]
fn test_history_export_file() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();

    let target = fx.dir.path().join("history.txt");
    let output = session.history(&HistoryAction::Export(target.clone())).unwrap();
    assert_eq!(output, HistoryOutput::Exported(target.clone()));
    assert!(fs::read_to_string(target).unwrap().contains("load"));
}

#[test]
fn test_group_by_amount_field_renames_output_columns() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();

    let summary = session
        .transform(&TransformStep::Group {
            field: "total".to_string(),
            amount: "total".to_string(),
        })
        .unwrap();
    assert_eq!(summary.fields, vec!["total", "count", "total_2"]);

    let grouped = session.dataset().unwrap();
    let first: Vec<String> = grouped.records()[0].values().iter().map(|v| v.label()).collect();
    assert_eq!(first, vec!["2000", "2", "4000"]);
}

#[test]
fn test_group_by_field_named_count() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("tally.csv");
    fs::write(&input, "count,amount\nA,5\nA,7\nB,3\n").unwrap();
    let mut session = Session::new(SurveyorConfig::default(), OperationLog::fresh(MemoryStore::new()));
    session.load(&input).unwrap();

    let summary = session
        .transform(&TransformStep::Group {
            field: "count".to_string(),
            amount: "amount".to_string(),
        })
        .unwrap();
    assert_eq!(summary.fields, vec!["count", "count_2", "total"]);
    assert_eq!(summary.record_count, 2);
}

#[test]
fn test_headers_leave_dataset_untouched() {
    let fx = fixture();
    let mut session = session(&fx);

    let fields = session.headers(&fx.input).unwrap();
    assert_eq!(fields[0], "product");
    assert_eq!(fields.len(), 7);
    assert!(session.dataset().is_none());

    let missing = fx.dir.path().join("absent.csv");
    assert!(matches!(session.headers(&missing), Err(PipelineError::NotFound { .. })));

    let entries = session.log().all();
    assert_eq!(kinds(&session), vec![OperationKind::Inspect, OperationKind::Inspect]);
    assert_eq!(entries[0].dataset, "sales");
    assert_eq!(entries[0].outcome.message.as_deref(), Some("7 fields"));
    assert!(!entries[1].outcome.is_success());
}

#[test]
fn test_numeric_validation_is_recorded() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();

    let validation = session
        .validate_numeric(&["quantity".to_string(), "region".to_string()])
        .unwrap();
    assert_eq!(validation.invalid_by_field["quantity"], 0);
    assert_eq!(validation.invalid_by_field["region"], 3);

    assert!(matches!(
        session.validate_numeric(&[]),
        Err(PipelineError::InvalidArgument { .. })
    ));
    assert!(matches!(
        session.validate_numeric(&["price".to_string()]),
        Err(PipelineError::UnknownField { .. })
    ));

    let entries = session.log().all();
    assert_eq!(entries[1].kind, OperationKind::Validate);
    assert_eq!(entries[1].parameters["fields"], "quantity,region");
    assert_eq!(entries[1].outcome.message.as_deref(), Some("3 non-numeric values"));
    assert!(entries[2..].iter().all(|e| !e.outcome.is_success()));
}

#[test]
fn test_product_summary_is_recorded() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();

    let summary = session.product_summary("laptop").unwrap();
    assert_eq!(summary.sales_count, 2);
    assert_eq!(summary.revenue, 4000.0);
    assert_eq!(summary.revenue_by_region["North"], 4000.0);

    let entry = &session.log().all()[1];
    assert_eq!(entry.kind, OperationKind::Product);
    assert_eq!(entry.parameters["product"], "laptop");
    assert_eq!(entry.outcome.message.as_deref(), Some("2 sales, revenue 4000"));
}

#[test]
fn test_product_summary_needs_sales_columns() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("scores.csv");
    fs::write(&input, "name,score\nAna,10\n").unwrap();
    let mut session = Session::new(SurveyorConfig::default(), OperationLog::fresh(MemoryStore::new()));
    session.load(&input).unwrap();

    assert!(matches!(
        session.product_summary("Ana"),
        Err(PipelineError::MissingField { .. })
    ));
    assert!(!session.log().all()[1].outcome.is_success());
}

#[test]
fn test_basic_report_of_current_dataset() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();

    let result = session.analyze(AnalysisKind::Basic).unwrap();
    assert_eq!(result.metric("field_count"), Some(&MetricValue::Count(7)));

    let ReportOutput::Console(text) = session
        .report(ReportFormat::Text, &ReportDestination::Console)
        .unwrap()
    else {
        panic!("expected console output");
    };
    assert!(text.contains("DATASET REPORT"));
    assert!(text.contains("Dataset: sales (4 records)"));
    assert!(text.contains("  1. product"));
    assert!(text.contains("  7. total"));
}

#[test]
fn test_history_list_filters() {
    let fx = fixture();
    let mut session = session(&fx);
    session.load(&fx.input).unwrap();
    session.summary().unwrap();
    session.load(&fx.dir.path().join("absent.csv")).unwrap_err();

    let listed = |session: &mut Session<MemoryStore>, action: HistoryAction| -> Vec<OperationEntry> {
        match session.history(&action).unwrap() {
            HistoryOutput::Entries(entries) => entries,
            other => panic!("expected entries, got {:?}", other),
        }
    };

    let by_dataset = listed(
        &mut session,
        HistoryAction::List {
            dataset: Some("sales".to_string()),
            kind: None,
        },
    );
    assert_eq!(by_dataset.len(), 2);

    let by_kind = listed(
        &mut session,
        HistoryAction::List {
            dataset: None,
            kind: Some(OperationKind::Load),
        },
    );
    assert_eq!(by_kind.len(), 2);
    assert_eq!(by_kind[1].dataset, "absent");

    let both = listed(
        &mut session,
        HistoryAction::List {
            dataset: Some("sales".to_string()),
            kind: Some(OperationKind::Summary),
        },
    );
    assert_eq!(both.len(), 1);

    assert_eq!(listed(&mut session, HistoryAction::list_all()).len(), 6);

    let last = session.log().all().last().unwrap();
    assert_eq!(last.parameters["action"], "list");
    let filtered = &session.log().all()[5];
    assert_eq!(filtered.parameters["dataset"], "sales");
    assert_eq!(filtered.parameters["kind"], "summary");
}
