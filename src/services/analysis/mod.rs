pub mod classifier;
pub mod normalize;
pub mod stats;

use chrono::Local;

use crate::error::AppError;
use crate::models::AnalysisResult;
use crate::services::charts::{render_charts, ChartTheme};
use crate::services::excel::Dataset;

pub use classifier::classify_columns;
pub use stats::basic_statistics;

/// Classifies columns, computes statistics and renders every chart for a
/// non-empty dataset.
pub fn perform_analysis(dataset: &Dataset, theme: &ChartTheme) -> Result<AnalysisResult, AppError> {
    if dataset.row_count() == 0 {
        return Err(AppError::EmptyDataset);
    }

    let start = std::time::Instant::now();
    tracing::info!(
        "Starting analysis of {} rows x {} columns",
        dataset.row_count(),
        dataset.column_count()
    );

    let column_types = classify_columns(dataset);
    tracing::info!(
        "Column types: {} numeric, {} categorical, {} datetime",
        column_types.numeric.len(),
        column_types.categorical.len(),
        column_types.datetime.len()
    );

    let basic_statistics = basic_statistics(dataset, &column_types);
    let plots = render_charts(dataset, &column_types, basic_statistics.correlation.as_ref(), theme);

    tracing::info!("Analysis completed in {:?}", start.elapsed());

    Ok(AnalysisResult {
        column_types,
        basic_statistics,
        plots,
        analysis_timestamp: normalize::analysis_timestamp(Local::now()),
    })
}
