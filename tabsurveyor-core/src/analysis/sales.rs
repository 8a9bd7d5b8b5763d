//! Revenue analysis over sales transactions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Analyzer;
use super::models::{AnalysisKind, AnalysisResult, MetricValue};
use crate::config::SalesFields;
use crate::error::{PipelineError, Result};
use crate::model::{Dataset, Value};

/// Number of entries in the top products / top salespeople rankings.
pub const TOP_N: usize = 5;

/// Sales analyzer over configurable column names.
#[derive(Debug, Clone, Default)]
pub struct SalesAnalyzer {
    fields: SalesFields,
}

impl SalesAnalyzer {
    /// Creates an analyzer reading the given columns.
    pub fn new(fields: SalesFields) -> Self {
        Self { fields }
    }

    /// Column names in use.
    pub fn fields(&self) -> &SalesFields {
        &self.fields
    }

    fn check_schema(&self, dataset: &Dataset) -> Result<()> {
        match self
            .fields
            .required()
            .into_iter()
            .find(|field| !dataset.schema().contains(field))
        {
            Some(missing) => Err(PipelineError::missing_field(missing)),
            None => Ok(()),
        }
    }

    /// Sales figures for one product, matched case-insensitively.
    ///
    /// # Errors
    /// `MissingField` if a required sales column is absent; `EmptyDataset`
    /// when there are no records.
    pub fn product_summary(&self, dataset: &Dataset, product: &str) -> Result<ProductSummary> {
        self.check_schema(dataset)?;
        if dataset.is_empty() {
            return Err(PipelineError::empty_dataset("product summary"));
        }

        let wanted = product.trim().to_lowercase();
        let mut summary = ProductSummary {
            product: product.trim().to_string(),
            sales_count: 0,
            revenue: 0.0,
            average_per_sale: 0.0,
            revenue_by_region: BTreeMap::new(),
        };

        for record in dataset.records() {
            let matches = dataset
                .value(record, &self.fields.product)
                .is_some_and(|v| !v.is_missing() && v.label().trim().to_lowercase() == wanted);
            if !matches {
                continue;
            }
            summary.sales_count += 1;
            if let Some(total) = dataset.value(record, &self.fields.total).and_then(Value::as_f64) {
                summary.revenue += total;
                if let Some(region) = group_key(dataset.value(record, &self.fields.region)) {
                    *summary.revenue_by_region.entry(region).or_insert(0.0) += total;
                }
            }
        }

        if summary.sales_count > 0 {
            summary.average_per_sale = summary.revenue / summary.sales_count as f64;
        }
        Ok(summary)
    }
}

/// Sales figures for a single product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product: String,
    /// Matching records
    pub sales_count: u64,
    pub revenue: f64,
    /// Zero when nothing matched
    pub average_per_sale: f64,
    pub revenue_by_region: BTreeMap<String, f64>,
}

impl fmt::Display for ProductSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Product '{}': {} sales, revenue {:.2}, average {:.2}",
            self.product, self.sales_count, self.revenue, self.average_per_sale
        )?;
        for (region, revenue) in &self.revenue_by_region {
            write!(f, "\n  {}: {:.2}", region, revenue)?;
        }
        Ok(())
    }
}

impl Analyzer for SalesAnalyzer {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Sales
    }

    /// Missing columns are reported before an empty dataset.
    fn analyze(&self, dataset: &Dataset) -> Result<AnalysisResult> {
        self.check_schema(dataset)?;
        if dataset.is_empty() {
            return Err(PipelineError::empty_dataset("sales analysis"));
        }

        let f = &self.fields;
        let mut revenue = 0.0;
        let mut units = 0.0;
        let mut skipped = 0usize;
        for record in dataset.records() {
            match dataset.value(record, &f.total).and_then(Value::as_f64) {
                Some(total) => revenue += total,
                None => skipped += 1,
            }
            if let Some(quantity) = dataset.value(record, &f.quantity).and_then(Value::as_f64) {
                units += quantity;
            }
        }
        if skipped > 0 {
            debug!("Skipped {} records with a non-numeric {}", skipped, f.total);
        }

        let transactions = dataset.len();
        let by_product = revenue_by(dataset, &f.product, &f.total);
        let by_salesperson = revenue_by(dataset, &f.salesperson, &f.total);

        let mut result = AnalysisResult::new(self.kind(), dataset.name(), transactions);
        result.insert("total_revenue", revenue);
        result.insert("transaction_count", transactions);
        result.insert("units_sold", units);
        result.insert("average_ticket", revenue / transactions as f64);
        result.insert("revenue_by_region", to_metric(&revenue_by(dataset, &f.region, &f.total)));
        result.insert("revenue_by_product", to_metric(&by_product));
        result.insert("revenue_by_category", to_metric(&revenue_by(dataset, &f.category, &f.total)));
        result.insert("revenue_by_salesperson", to_metric(&by_salesperson));
        result.insert("top_products", top_n(&by_product, TOP_N));
        result.insert("top_salespeople", top_n(&by_salesperson, TOP_N));
        if dataset.schema().contains(&f.date) {
            result.insert("revenue_by_date", to_metric(&revenue_by(dataset, &f.date, &f.total)));
        }

        info!(
            "Sales analysis for '{}': {} transactions, revenue {:.2}",
            dataset.name(),
            transactions,
            revenue
        );
        Ok(result)
    }
}

/// Present group value as a key; missing values are not grouped.
fn group_key(value: Option<&Value>) -> Option<String> {
    value.filter(|v| !v.is_missing()).map(Value::label)
}

/// Sums coercible amounts per present group value.
fn revenue_by(dataset: &Dataset, group_field: &str, amount_field: &str) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for record in dataset.records() {
        let key = group_key(dataset.value(record, group_field));
        let amount = dataset.value(record, amount_field).and_then(Value::as_f64);
        if let (Some(key), Some(amount)) = (key, amount) {
            *totals.entry(key).or_insert(0.0) += amount;
        }
    }
    totals
}

fn to_metric(totals: &BTreeMap<String, f64>) -> MetricValue {
    MetricValue::Map(
        totals
            .iter()
            .map(|(k, v)| (k.clone(), MetricValue::Number(*v)))
            .collect(),
    )
}

/// Highest totals first; equal totals ordered by name.
fn top_n(totals: &BTreeMap<String, f64>, n: usize) -> MetricValue {
    let mut ranked: Vec<(&String, f64)> = totals.iter().map(|(k, v)| (k, *v)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    MetricValue::List(
        ranked
            .into_iter()
            .take(n)
            .map(|(name, revenue)| {
                MetricValue::map([
                    ("name", MetricValue::from(name.as_str())),
                    ("revenue", MetricValue::Number(revenue)),
                ])
            })
            .collect(),
    )
}
