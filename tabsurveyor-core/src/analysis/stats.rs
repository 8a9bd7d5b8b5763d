//! Descriptive statistics over numeric samples.
//!
//! Inputs are expected to be finite; the extraction helpers below only ever
//! yield finite values.

use std::cmp::Ordering;

use crate::model::Value;

/// Descriptive statistics of one numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    /// Sample variance; `None` with fewer than two values
    pub variance: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// Summarizes a non-empty sample. Returns `None` for an empty one.
pub fn summarize(values: &[f64]) -> Option<NumericSummary> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let sum: f64 = sorted.iter().sum();
    let mean = sum / count as f64;
    let variance = sample_variance(&sorted, mean);

    Some(NumericSummary {
        count,
        sum,
        mean,
        median: median_of_sorted(&sorted),
        mode: mode_of_sorted(&sorted),
        variance,
        std_dev: variance.map(f64::sqrt),
        min: sorted[0],
        max: sorted[count - 1],
    })
}

/// Collects coercible values, skipping everything else.
pub fn extract_numeric<'a, I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Value>,
{
    values.into_iter().filter_map(Value::as_f64).collect()
}

/// Sample variance (divides by n - 1).
fn sample_variance(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let squares: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
    Some(squares / (values.len() - 1) as f64)
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Most frequent value; the smallest one wins a tie.
fn mode_of_sorted(sorted: &[f64]) -> f64 {
    let mut best = sorted[0];
    let mut best_run = 0usize;
    let mut run_start = 0usize;

    for i in 1..=sorted.len() {
        let run_ended =
            i == sorted.len() || sorted[i].total_cmp(&sorted[run_start]) != Ordering::Equal;
        if run_ended {
            let run = i - run_start;
            // Strictly greater keeps the earlier (smaller) value on ties
            if run > best_run {
                best_run = run;
                best = sorted[run_start];
            }
            run_start = i;
        }
    }

    best
}
