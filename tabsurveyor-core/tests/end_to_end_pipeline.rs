//! End-to-end pipeline tests over real files.
//!
//! This test suite covers:
//! - Loading a sales file, cleaning it and running both analyzers
//! - Chaining transformations on a loaded dataset
//! - Custom cleaning pipelines in caller-defined order

use std::fs;
use std::path::PathBuf;

use tabsurveyor_core::{
    AnalysisKind, CaseFold, CleanStep, MetricValue, NullStrategy, Predicate, SalesFields,
    SortDirection, SurveyorConfig, Value, analysis, clean, loader, transform,
};
use tempfile::TempDir;

const SALES_CSV: &str = "\
date,product,category,quantity,unit_price,total,region,salesperson
2024-03-01,Laptop,Electronics,1,1200,1200,North,Ana
2024-03-01,Laptop,Electronics,1,1200,1200,North,Ana
2024-03-02,Mouse,Accessories,3,20,60,South,Luis
2024-03-02,  keyboard ,Accessories,2,45,90,South,Luis
,,,,,,,
2024-03-03,Monitor,Electronics,2,300,600,,Marta
2024-03-04,Desk,Furniture,1,250,250,East,Marta
";

fn write_sales(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("march_sales.csv");
    fs::write(&path, SALES_CSV).unwrap();
    path
}

#[test]
fn test_end_to_end_load_clean_analyze() {
    let dir = TempDir::new().unwrap();
    let config = SurveyorConfig::default();

    let dataset = loader::load_with(write_sales(&dir), &config.loader).unwrap();
    assert_eq!(dataset.name(), "march_sales");
    assert_eq!(dataset.len(), 7);

    let (cleaned, summaries) = clean::full_clean(&dataset, &config.clean);
    // blank row, duplicate laptop row and the row without a region are gone
    assert_eq!(cleaned.len(), 4);
    assert_eq!(summaries[0].records_removed(), 1);
    assert_eq!(summaries[1].records_removed(), 1);
    assert_eq!(summaries[2].records_removed(), 1);

    let product = cleaned.column("product").unwrap();
    assert_eq!(product[2], &Value::text("keyboard"));

    let sales = analysis::analyze(&cleaned, AnalysisKind::Sales, &SalesFields::default()).unwrap();
    let revenue = sales.metric("total_revenue").and_then(MetricValue::as_f64).unwrap();
    assert!((revenue - 1600.0).abs() < 1e-9);

    let general = analysis::analyze(&cleaned, AnalysisKind::General, &config.sales).unwrap();
    let fields = general.metric("fields").and_then(MetricValue::as_map).unwrap();
    assert_eq!(fields.len(), 8);
    assert_eq!(
        fields["region"].as_map().unwrap()["type"],
        MetricValue::from("categorical")
    );
}

#[test]
fn test_end_to_end_transform_chain() {
    let dir = TempDir::new().unwrap();
    let dataset = loader::load(write_sales(&dir), &[tabsurveyor_core::TextEncoding::Utf8]).unwrap();

    let (deduped, _) = clean::deduplicate(&dataset);
    let (non_empty, _) = clean::remove_empty(&deduped);
    let accessories =
        transform::filter_by_field(&non_empty, "category", &Predicate::Contains("access".into()))
            .unwrap();
    assert_eq!(accessories.len(), 2);

    let by_total = transform::sort_by_field(&non_empty, "total", SortDirection::Descending).unwrap();
    let top = transform::head(&by_total, 2).unwrap();
    let totals: Vec<String> = top
        .column("total")
        .unwrap()
        .iter()
        .map(|v| v.label())
        .collect();
    assert_eq!(totals, vec!["1200", "600"]);

    let groups = transform::group_and_total(&non_empty, "salesperson", "total").unwrap();
    assert_eq!(groups["Marta"].count, 2);
    assert!((groups["Marta"].total - 850.0).abs() < 1e-9);

    let projected =
        transform::select_fields(&top, &["product".to_string(), "total".to_string()]).unwrap();
    assert_eq!(projected.schema().len(), 2);
    assert_eq!(dataset.len(), 7);
}

#[test]
fn test_end_to_end_custom_pipeline_fill_then_normalize() {
    let dir = TempDir::new().unwrap();
    let dataset = loader::load_with(write_sales(&dir), &SurveyorConfig::default().loader).unwrap();

    let steps = vec![
        CleanStep::RemoveEmpty,
        CleanStep::HandleNulls(NullStrategy::fill_all("unassigned")),
        CleanStep::NormalizeText(Some(CaseFold::Upper)),
        CleanStep::Deduplicate,
    ];
    let (cleaned, summaries) = clean::run_pipeline(&dataset, &steps).unwrap();

    assert_eq!(summaries.len(), 4);
    assert_eq!(summaries[1].values_changed, 1);
    assert_eq!(cleaned.len(), 5);
    let regions: Vec<String> = cleaned
        .column("region")
        .unwrap()
        .iter()
        .map(|v| v.label())
        .collect();
    assert!(regions.contains(&"UNASSIGNED".to_string()));
}

#[test]
fn test_end_to_end_quality_report() {
    let dir = TempDir::new().unwrap();
    let dataset = loader::load_with(write_sales(&dir), &SurveyorConfig::default().loader).unwrap();

    let report = clean::quality_report(&dataset).unwrap();
    assert_eq!(report.record_count, 7);
    let region = report.fields.iter().find(|f| f.field == "region").unwrap();
    assert_eq!(region.missing, 2);

    let numeric = clean::validate_numeric(
        &dataset,
        &["quantity".to_string(), "total".to_string()],
    )
    .unwrap();
    assert!(numeric.is_clean());
}
