//! Raster charts for an analysed dataset.
//!
//! Every chart is drawn into an in-memory RGB buffer and encoded as PNG. A
//! chart that fails to draw is logged and left out of its group; the other
//! charts are unaffected.

mod categorical;
mod distribution;
mod heatmap;
mod time_series;

use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::models::{
    ChartGroups, ChartImage, ChartKind, ColumnClassification, CorrelationMatrix, ValueCount,
};
use crate::services::analysis::stats::{sorted_values, value_frequencies};
use crate::services::excel::Dataset;

pub const MAX_DISTRIBUTION_CHARTS: usize = 4;
pub const MAX_CATEGORICAL_CHARTS: usize = 3;
pub const MAX_CATEGORIES_PER_CHART: usize = 20;
pub const MAX_BARS: usize = 10;
pub const MAX_SERIES_PER_DATETIME: usize = 2;
pub const HISTOGRAM_BUCKETS: usize = 30;

/// Family name chart text is drawn with; a font must be registered under it
/// before charts are annotated.
pub const FONT_FAMILY: &str = "sans-serif";

/// Sizes and colors for every chart. Built once at startup and passed to
/// the renderer.
#[derive(Debug, Clone)]
pub struct ChartTheme {
    pub distribution_size: (u32, u32),
    pub heatmap_size: (u32, u32),
    pub time_series_size: (u32, u32),
    pub categorical_size: (u32, u32),
    pub histogram_color: RGBColor,
    pub box_color: RGBColor,
    pub line_color: RGBColor,
    pub bar_color: RGBColor,
    pub heatmap_low: RGBColor,
    pub heatmap_mid: RGBColor,
    pub heatmap_high: RGBColor,
    pub missing_color: RGBColor,
    /// Draw captions, axis labels and heatmap values.
    pub annotate: bool,
}

impl Default for ChartTheme {
    fn default() -> Self {
        Self {
            distribution_size: (1500, 600),
            heatmap_size: (1200, 900),
            time_series_size: (1500, 600),
            categorical_size: (1200, 600),
            histogram_color: RGBColor(135, 206, 235),
            box_color: RGBColor(70, 130, 180),
            line_color: RGBColor(246, 112, 136),
            bar_color: RGBColor(240, 128, 128),
            heatmap_low: RGBColor(59, 76, 192),
            heatmap_mid: RGBColor(221, 221, 221),
            heatmap_high: RGBColor(180, 4, 38),
            missing_color: RGBColor(245, 245, 245),
            annotate: false,
        }
    }
}

impl ChartTheme {
    /// Registers the TrueType font at `path` for chart text and enables
    /// annotations.
    pub fn with_font(mut self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read chart font {}", path.display()))?;
        // plotters keeps registered fonts for the life of the process.
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, bytes)
            .map_err(|_| anyhow!("Invalid chart font {}", path.display()))?;
        self.annotate = true;
        Ok(self)
    }

    /// Diverging color for a correlation coefficient in [-1, 1].
    pub fn diverging(&self, value: Option<f64>) -> RGBColor {
        let Some(value) = value else {
            return self.missing_color;
        };
        let t = ((value.clamp(-1.0, 1.0) + 1.0) / 2.0) as f32;
        if t < 0.5 {
            lerp(self.heatmap_low, self.heatmap_mid, t * 2.0)
        } else {
            lerp(self.heatmap_mid, self.heatmap_high, (t - 0.5) * 2.0)
        }
    }
}

fn lerp(from: RGBColor, to: RGBColor, t: f32) -> RGBColor {
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8;
    RGBColor(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

/// Draws onto a white canvas of `size` pixels and returns the PNG encoding.
fn render_png<F>(size: (u32, u32), draw: F) -> Result<ChartImage>
where
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<()>,
{
    let (width, height) = size;
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, size).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
    }

    let image = image::RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| anyhow!("Chart buffer does not match {}x{}", width, height))?;
    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, image::ImageFormat::Png)?;
    Ok(ChartImage::from_png(png.into_inner()))
}

/// Widens a degenerate or non-finite range so plotters can map it. Fails
/// when the padded range overflows `f64`.
fn padded_range(min: f64, max: f64, pad_ratio: f64) -> Result<(f64, f64)> {
    if !min.is_finite() || !max.is_finite() {
        return Ok((0.0, 1.0));
    }
    let span = max - min;
    if !span.is_finite() {
        anyhow::bail!("range {}..{} is too wide to plot", min, max);
    }
    if span <= f64::EPSILON * max.abs().max(1.0) {
        return Ok((min - 0.5, max + 0.5));
    }
    let (lo, hi) = (min - span * pad_ratio, max + span * pad_ratio);
    if !lo.is_finite() || !hi.is_finite() || !(hi - lo).is_finite() {
        anyhow::bail!("range {}..{} is too wide to plot", min, max);
    }
    Ok((lo, hi))
}

fn keep(group: &mut Vec<ChartImage>, kind: ChartKind, label: &str, rendered: Result<ChartImage>) {
    match rendered {
        Ok(image) => group.push(image),
        Err(e) => tracing::warn!("Skipping {:?} chart for {}: {:#}", kind, label, e),
    }
}

/// Most frequent values of a categorical column, or `None` when the column is
/// empty or has too many distinct values to chart.
fn categorical_bars(dataset: &Dataset, name: &str) -> Option<Vec<ValueCount>> {
    let mut frequencies = value_frequencies(&dataset.text_values(name).unwrap_or_default());
    if frequencies.is_empty() || frequencies.len() > MAX_CATEGORIES_PER_CHART {
        return None;
    }
    frequencies.truncate(MAX_BARS);
    Some(frequencies)
}

pub fn render_charts(
    dataset: &Dataset,
    classification: &ColumnClassification,
    correlation: Option<&CorrelationMatrix>,
    theme: &ChartTheme,
) -> ChartGroups {
    let start = std::time::Instant::now();
    let mut groups = ChartGroups::default();

    for name in classification.numeric.iter().take(MAX_DISTRIBUTION_CHARTS) {
        let values = sorted_values(&dataset.numeric_values(name).unwrap_or_default());
        if values.is_empty() {
            tracing::debug!("Column {} has no values to plot", name);
            continue;
        }
        let rendered = distribution::render(name, &values, theme);
        keep(&mut groups.distributions, ChartKind::Distribution, name, rendered);
    }

    if let Some(matrix) = correlation.filter(|m| m.len() >= 2) {
        let rendered = heatmap::render(matrix, theme);
        keep(&mut groups.correlation_heatmap, ChartKind::CorrelationHeatmap, "numeric columns", rendered);
    }

    for date_col in &classification.datetime {
        let Some(stamps) = dataset.timestamps(date_col) else {
            continue;
        };
        for num_col in classification.numeric.iter().take(MAX_SERIES_PER_DATETIME) {
            let values = dataset.numeric_values(num_col).unwrap_or_default();
            let points = time_series::sorted_points(&stamps, &values);
            if points.is_empty() {
                continue;
            }
            let label = format!("{} over {}", num_col, date_col);
            let rendered = time_series::render(date_col, num_col, &points, theme);
            keep(&mut groups.time_series, ChartKind::TimeSeries, &label, rendered);
        }
    }

    for name in classification.categorical.iter().take(MAX_CATEGORICAL_CHARTS) {
        let Some(top) = categorical_bars(dataset, name) else {
            continue;
        };
        let rendered = categorical::render(name, &top, theme);
        keep(&mut groups.categorical, ChartKind::Categorical, name, rendered);
    }

    tracing::info!(
        "Rendered {} distribution, {} heatmap, {} time series and {} categorical charts in {:?}",
        groups.distributions.len(),
        groups.correlation_heatmap.len(),
        groups.time_series.len(),
        groups.categorical.len(),
        start.elapsed()
    );

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::excel::dataset::tests::{headers, text};
    use calamine::Data;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn renders_a_png() {
        let image = render_png((40, 30), |_| Ok(())).unwrap();
        assert!(image.as_bytes().starts_with(&PNG_MAGIC));

        let decoded = image::load_from_memory(image.as_bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn draw_errors_propagate() {
        let result = render_png((10, 10), |_| Err(anyhow!("nope")));
        assert!(result.is_err());
    }

    #[test]
    fn degenerate_ranges_are_widened() {
        assert_eq!(padded_range(3.0, 3.0, 0.05).unwrap(), (2.5, 3.5));
        assert_eq!(padded_range(f64::NAN, 1.0, 0.05).unwrap(), (0.0, 1.0));
        let (lo, hi) = padded_range(0.0, 10.0, 0.1).unwrap();
        assert!((lo + 1.0).abs() < 1e-12 && (hi - 11.0).abs() < 1e-12);
    }

    #[test]
    fn overflowing_ranges_are_rejected() {
        assert!(padded_range(-1e308, 1e308, 0.05).is_err());
        assert!(padded_range(0.0, f64::MAX, 0.05).is_err());
    }

    #[test]
    fn diverging_scale_hits_endpoints() {
        let theme = ChartTheme::default();
        assert_eq!(theme.diverging(Some(-1.0)), theme.heatmap_low);
        assert_eq!(theme.diverging(Some(0.0)), theme.heatmap_mid);
        assert_eq!(theme.diverging(Some(1.0)), theme.heatmap_high);
        assert_eq!(theme.diverging(None), theme.missing_color);
    }

    fn labels(distinct: usize) -> Dataset {
        let rows: Vec<Vec<Data>> = (0..distinct * 2)
            .map(|i| vec![text(&format!("label{}", i % distinct))])
            .collect();
        Dataset::from_rows(&headers(&["label"]), &rows).unwrap()
    }

    #[test]
    fn bar_charts_keep_the_top_values() {
        let bars = categorical_bars(&labels(15), "label").unwrap();
        assert_eq!(bars.len(), MAX_BARS);
        assert_eq!(bars[0].value, "label0");
    }

    #[test]
    fn high_cardinality_columns_get_no_bar_chart() {
        assert!(categorical_bars(&labels(MAX_CATEGORIES_PER_CHART), "label").is_some());
        assert!(categorical_bars(&labels(25), "label").is_none());
    }
}
