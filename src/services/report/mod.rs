pub mod pdf;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::TempDir;

use crate::error::AppError;
use crate::models::{AnalysisResult, ChartImage, ChartKind};
use crate::services::analysis::normalize::format_statistic;
use crate::services::excel::Dataset;
use pdf::{Font, PdfWriter};

// Statistic columns per table; wider summaries are split across tables.
const TABLE_COLUMNS: usize = 5;
const CHART_WIDTH: f32 = 430.0;

#[derive(Debug)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Per-request scratch directory holding staged chart images and the output
/// document. Removed when dropped.
struct StagingArea {
    dir: TempDir,
    staged: usize,
}

impl StagingArea {
    fn create(root: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(root)?;
        let prefix = format!("statly_{}_", Local::now().format("%Y%m%d%H%M%S"));
        let dir = tempfile::Builder::new().prefix(&prefix).tempdir_in(root)?;
        tracing::debug!("Staging report in {}", dir.path().display());
        Ok(Self { dir, staged: 0 })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn stage_chart(&mut self, kind: ChartKind, chart: &ChartImage) -> Result<PathBuf, AppError> {
        self.staged += 1;
        let path = self.dir.path().join(format!("{:?}_{}.png", kind, self.staged).to_lowercase());
        fs::write(&path, chart.as_bytes())?;
        Ok(path)
    }

    fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!("Failed to remove staging directory {}: {}", path.display(), e);
        }
    }
}

pub struct ReportRenderer {
    staging_root: PathBuf,
}

impl ReportRenderer {
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
        }
    }

    pub fn render(
        &self,
        dataset: &Dataset,
        analysis: &AnalysisResult,
        display_name: &str,
    ) -> Result<RenderedReport, AppError> {
        let start = std::time::Instant::now();
        let mut staging = StagingArea::create(&self.staging_root)?;
        let mut writer = PdfWriter::new();

        write_overview(&mut writer, dataset, analysis, display_name)?;
        write_numeric_summary(&mut writer, analysis)?;

        writer.page_break()?;
        writer.heading("Distribution Charts")?;
        write_charts(&mut writer, &mut staging, analysis, ChartKind::Distribution)?;

        for (kind, title) in [
            (ChartKind::CorrelationHeatmap, "Correlation Matrix"),
            (ChartKind::TimeSeries, "Time Trends"),
            (ChartKind::Categorical, "Categorical Distributions"),
        ] {
            if analysis.plots.group(kind).is_empty() {
                continue;
            }
            writer.page_break()?;
            writer.heading(title)?;
            write_charts(&mut writer, &mut staging, analysis, kind)?;
        }

        writer.page_break()?;
        let now = Local::now();
        writer.paragraph(
            &format!(
                "Report generated by Statly on {} at {}",
                now.format("%d/%m/%Y"),
                now.format("%H:%M")
            ),
            Font::Italic,
            10.0,
        )?;
        writer.paragraph("Statly - statistical analysis made simple", Font::Italic, 10.0)?;

        let output = staging.path().join("report.pdf");
        let page_count = writer.save(&output)?;
        let bytes = fs::read(&output)?;
        staging.close();

        tracing::info!(
            "Report for {} rendered: {} pages, {}KB in {:?}",
            display_name,
            page_count,
            bytes.len() / 1024,
            start.elapsed()
        );
        Ok(RenderedReport { bytes, page_count })
    }
}

fn write_overview(
    writer: &mut PdfWriter,
    dataset: &Dataset,
    analysis: &AnalysisResult,
    display_name: &str,
) -> Result<(), AppError> {
    writer.title(&format!("Statistical Report - {}", display_name))?;

    let info = &analysis.basic_statistics.dataset_info;
    writer.heading("Dataset Information")?;
    writer.table(
        &[
            vec!["Metric".to_string(), "Value".to_string()],
            vec!["Total rows".to_string(), info.total_rows.to_string()],
            vec!["Total columns".to_string(), info.total_columns.to_string()],
            vec!["Memory usage".to_string(), info.memory_usage.clone()],
            vec!["Missing values".to_string(), info.total_missing().to_string()],
        ],
        10.0,
    )?;

    let types = &analysis.column_types;
    writer.heading("Column Types")?;
    for (label, columns) in [
        ("Numeric", &types.numeric),
        ("Categorical", &types.categorical),
        ("Datetime", &types.datetime),
    ] {
        let listed = if columns.is_empty() {
            "none".to_string()
        } else {
            columns.join(", ")
        };
        writer.paragraph(
            &format!("{} columns ({}): {}", label, columns.len(), listed),
            Font::Regular,
            11.0,
        )?;
    }

    let mut storage = vec![vec!["Column".to_string(), "Storage".to_string()]];
    storage.extend(dataset.dtype_labels().into_iter().map(|(name, dtype)| vec![name, dtype]));
    writer.spacer(10.0);
    writer.table(&storage, 9.0)
}

fn write_numeric_summary(writer: &mut PdfWriter, analysis: &AnalysisResult) -> Result<(), AppError> {
    let summary = &analysis.basic_statistics.numeric_summary;
    if summary.is_empty() {
        return Ok(());
    }
    writer.page_break()?;
    writer.heading("Descriptive Statistics - Numeric Columns")?;

    let entries: Vec<_> = summary.iter().collect();
    for chunk in entries.chunks(TABLE_COLUMNS) {
        let mut header = vec!["Statistic".to_string()];
        header.extend(chunk.iter().map(|(name, _)| name.to_string()));

        let mut rows = vec![header];
        for (index, (label, _)) in chunk[0].1.labelled().iter().enumerate() {
            let mut row = vec![label.to_uppercase()];
            row.extend(chunk.iter().map(|(_, stats)| format_statistic(stats.labelled()[index].1)));
            rows.push(row);
        }
        writer.table(&rows, 9.0)?;
        writer.spacer(12.0);
    }
    Ok(())
}

fn write_charts(
    writer: &mut PdfWriter,
    staging: &mut StagingArea,
    analysis: &AnalysisResult,
    kind: ChartKind,
) -> Result<(), AppError> {
    for chart in analysis.plots.group(kind) {
        let path = staging.stage_chart(kind, chart)?;
        match image::open(&path) {
            Ok(decoded) => {
                writer.image(&decoded.to_rgb8(), CHART_WIDTH)?;
                writer.spacer(16.0);
            }
            Err(e) => tracing::warn!("Skipping {:?} chart that failed to decode: {}", kind, e),
        }
    }
    Ok(())
}
