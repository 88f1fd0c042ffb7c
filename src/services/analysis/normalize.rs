//! Conversions applied where computed values leave the analysis engine:
//! JSON cannot carry NaN or infinities, so every float crosses the boundary
//! as `Option<f64>` with `None` as the single undefined sentinel.

use chrono::{DateTime, Local};

/// Finite values pass through; NaN and infinities become the sentinel.
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

pub fn memory_usage_label(bytes: usize) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

pub fn analysis_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Text used for a statistic in tables: two decimals, or `n/a` when the
/// statistic is undefined.
pub fn format_statistic(value: Option<f64>) -> String {
    match value.and_then(finite) {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{:.0}", v),
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    }
}
