use std::collections::HashMap;

use rayon::prelude::*;
use smallvec::SmallVec;

use super::normalize::{finite, memory_usage_label};
use crate::models::{
    BasicStatistics, CategoricalSummary, ColumnClassification, ColumnMap, CorrelationMatrix, DatasetInfo,
    NumericSummary, ValueCount, TOP_VALUE_COUNTS,
};
use crate::services::excel::Dataset;

pub fn basic_statistics(dataset: &Dataset, classification: &ColumnClassification) -> BasicStatistics {
    let start = std::time::Instant::now();

    let dataset_info = dataset_info(dataset);

    let numeric_columns: Vec<(String, Vec<Option<f64>>)> = classification
        .numeric
        .iter()
        .map(|name| (name.clone(), dataset.numeric_values(name).unwrap_or_default()))
        .collect();

    // Per-column work is independent; collect keeps column order.
    let numeric_summary: ColumnMap<NumericSummary> = numeric_columns
        .par_iter()
        .map(|(name, values)| (name.clone(), numeric_summary(values)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    let correlation = correlation_matrix(&numeric_columns);

    let categorical_summary: ColumnMap<CategoricalSummary> = classification
        .categorical
        .par_iter()
        .map(|name| {
            let values = dataset.text_values(name).unwrap_or_default();
            (name.clone(), categorical_summary(&values))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    tracing::info!(
        "Computed statistics for {} numeric and {} categorical columns in {:?}",
        numeric_summary.len(),
        categorical_summary.len(),
        start.elapsed()
    );

    BasicStatistics {
        dataset_info,
        numeric_summary,
        correlation,
        categorical_summary,
    }
}

pub fn dataset_info(dataset: &Dataset) -> DatasetInfo {
    DatasetInfo {
        total_rows: dataset.row_count(),
        total_columns: dataset.column_count(),
        missing_values: dataset
            .column_names()
            .into_iter()
            .map(|name| {
                let missing = dataset.null_count(&name);
                (name, missing)
            })
            .collect(),
        memory_usage: memory_usage_label(dataset.memory_usage_bytes()),
    }
}

/// Present, finite values of a numeric column in ascending order.
pub fn sorted_values(values: &[Option<f64>]) -> Vec<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
    present.sort_by(|a, b| a.total_cmp(b));
    present
}

pub fn numeric_summary(values: &[Option<f64>]) -> NumericSummary {
    let sorted = sorted_values(values);
    let count = sorted.len();

    let mean = mean(&sorted);
    let std = mean.and_then(|mean| sample_std(&sorted, mean));

    NumericSummary {
        count,
        mean,
        std,
        min: sorted.first().copied(),
        p25: percentile(&sorted, 0.25),
        p50: percentile(&sorted, 0.50),
        p75: percentile(&sorted, 0.75),
        max: sorted.last().copied(),
    }
}

/// Arithmetic mean. Falls back to summing pre-divided values when the plain
/// sum overflows, so large finite inputs keep a defined mean.
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let sum: f64 = values.iter().sum();
    if sum.is_finite() {
        return finite(sum / n);
    }
    finite(values.iter().map(|v| v / n).sum())
}

/// Sample standard deviation with Bessel's correction; undefined below two
/// values. Deviations are scaled by the largest one before squaring.
fn sample_std(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let deviations: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let scale = deviations.iter().try_fold(0.0f64, |acc, d| finite(*d).map(|d| acc.max(d.abs())))?;
    if scale == 0.0 {
        return Some(0.0);
    }
    let variance = deviations.iter().map(|d| (d / scale).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    finite(scale * variance.sqrt())
}

/// Linear-interpolated percentile of ascending values, `p` in [0, 1].
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = p.clamp(0.0, 1.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Pearson correlation over rows where both values are present. Undefined
/// with fewer than two such rows or when either side has no variance.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some((*a, *b)),
            _ => None,
        })
        .collect();

    let n = pairs.len();
    if n < 2 {
        return None;
    }

    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut denom_x = 0.0;
    let mut denom_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        num += dx * dy;
        denom_x += dx * dx;
        denom_y += dy * dy;
    }

    if denom_x == 0.0 || denom_y == 0.0 {
        return None;
    }
    finite(num / (denom_x.sqrt() * denom_y.sqrt())).map(|r| r.clamp(-1.0, 1.0))
}

/// Symmetric correlation matrix; `None` with fewer than two numeric columns.
/// Diagonal entries are exactly 1.0 whenever the column's coefficient is
/// defined.
pub fn correlation_matrix(columns: &[(String, Vec<Option<f64>>)]) -> Option<CorrelationMatrix> {
    if columns.len() < 2 {
        return None;
    }

    let n = columns.len();
    let mut cells = vec![vec![None; n]; n];
    for i in 0..n {
        cells[i][i] = pearson(&columns[i].1, &columns[i].1).map(|_| 1.0);
        for j in (i + 1)..n {
            let r = pearson(&columns[i].1, &columns[j].1);
            cells[i][j] = r;
            cells[j][i] = r;
        }
    }

    Some(
        columns
            .iter()
            .zip(cells)
            .map(|((name, _), row)| {
                let row: ColumnMap<Option<f64>> = columns
                    .iter()
                    .map(|(other, _)| other.clone())
                    .zip(row)
                    .collect();
                (name.clone(), row)
            })
            .collect(),
    )
}

/// Frequency of each distinct non-null value, most frequent first. Ties
/// keep the order in which values were first seen.
pub fn value_frequencies(values: &[Option<String>]) -> Vec<ValueCount> {
    let mut seen: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, value) in values.iter().flatten().enumerate() {
        seen.entry(value.as_str()).or_insert((0, position)).0 += 1;
    }

    let mut counts: Vec<(&str, usize, usize)> = seen
        .into_iter()
        .map(|(value, (count, first))| (value, count, first))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    counts
        .into_iter()
        .map(|(value, count, _)| ValueCount {
            value: value.to_string(),
            count,
        })
        .collect()
}

pub fn categorical_summary(values: &[Option<String>]) -> CategoricalSummary {
    let frequencies = value_frequencies(values);

    CategoricalSummary {
        unique_values: frequencies.len(),
        most_frequent: frequencies.first().map(|entry| entry.value.clone()),
        value_counts: frequencies.into_iter().take(TOP_VALUE_COUNTS).collect::<SmallVec<_>>(),
    }
}
