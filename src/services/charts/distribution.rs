use anyhow::Result;
use plotters::prelude::*;

use super::{padded_range, render_png, ChartTheme, FONT_FAMILY, HISTOGRAM_BUCKETS};
use crate::models::ChartImage;
use crate::services::analysis::stats::percentile;

/// Bucket edges and counts over ascending values. `None` when the value
/// range does not fit in an `f64`.
pub(super) struct Histogram {
    pub lo: f64,
    pub width: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn build(sorted: &[f64], buckets: usize) -> Option<Self> {
        let (mut lo, mut hi) = match (sorted.first(), sorted.last()) {
            (Some(lo), Some(hi)) => (*lo, *hi),
            _ => (0.0, 1.0),
        };
        if hi - lo <= 0.0 {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / buckets as f64;
        if !width.is_finite() || !(lo + width * buckets as f64).is_finite() {
            return None;
        }
        let mut counts = vec![0usize; buckets];
        for v in sorted {
            let idx = (((v - lo) / width).floor() as usize).min(buckets - 1);
            counts[idx] += 1;
        }
        Some(Self { lo, width, counts })
    }

    pub fn hi(&self) -> f64 {
        self.lo + self.width * self.counts.len() as f64
    }
}

/// Box plot geometry: quartiles, whiskers at the furthest values within
/// 1.5 IQR of the box, and the points beyond them.
pub(super) struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    pub fn build(sorted: &[f64]) -> Option<Self> {
        let q1 = percentile(sorted, 0.25)?;
        let median = percentile(sorted, 0.5)?;
        let q3 = percentile(sorted, 0.75)?;
        let iqr = q3 - q1;
        let (low_fence, high_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

        let inside = sorted.iter().copied().filter(|v| *v >= low_fence && *v <= high_fence);
        let lower_whisker = inside.clone().next().unwrap_or(q1);
        let upper_whisker = inside.last().unwrap_or(q3);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < low_fence || *v > high_fence)
            .collect();

        Some(Self {
            q1,
            median,
            q3,
            lower_whisker,
            upper_whisker,
            outliers,
        })
    }
}

/// Histogram and box plot of one column, side by side.
pub(super) fn render(name: &str, sorted: &[f64], theme: &ChartTheme) -> Result<ChartImage> {
    let histogram = Histogram::build(sorted, HISTOGRAM_BUCKETS)
        .ok_or_else(|| anyhow::anyhow!("value range of {} is too wide to plot", name))?;
    let box_stats = BoxStats::build(sorted).ok_or_else(|| anyhow::anyhow!("no values"))?;

    render_png(theme.distribution_size, |root| {
        let (width, _) = root.dim_in_pixel();
        let (left, right) = root.split_horizontally(width / 2);

        draw_histogram(&left, name, &histogram, theme)?;
        draw_box(&right, name, sorted, &box_stats, theme)?;
        Ok(())
    })
}

fn draw_histogram<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    name: &str,
    histogram: &Histogram,
    theme: &ChartTheme,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let peak = histogram.counts.iter().copied().max().unwrap_or(0).max(1) as f64;

    let mut builder = ChartBuilder::on(area);
    builder.margin(15);
    if theme.annotate {
        builder
            .caption(format!("Distribution of {}", name), (FONT_FAMILY, 22))
            .x_label_area_size(35)
            .y_label_area_size(50);
    }
    let mut chart = builder.build_cartesian_2d(histogram.lo..histogram.hi(), 0f64..peak * 1.1)?;

    let mut mesh = chart.configure_mesh();
    if theme.annotate {
        mesh.x_desc(name).y_desc("Frequency");
    }
    mesh.draw()?;

    let fill = theme.histogram_color.mix(0.7).filled();
    chart.draw_series(histogram.counts.iter().enumerate().map(|(i, count)| {
        let x0 = histogram.lo + histogram.width * i as f64;
        Rectangle::new([(x0, 0.0), (x0 + histogram.width, *count as f64)], fill)
    }))?;
    chart.draw_series(histogram.counts.iter().enumerate().filter(|(_, c)| **c > 0).map(|(i, count)| {
        let x0 = histogram.lo + histogram.width * i as f64;
        Rectangle::new([(x0, 0.0), (x0 + histogram.width, *count as f64)], BLACK.stroke_width(1))
    }))?;

    Ok(())
}

fn draw_box<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    name: &str,
    sorted: &[f64],
    stats: &BoxStats,
    theme: &ChartTheme,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (lo, hi) = match (sorted.first(), sorted.last()) {
        (Some(lo), Some(hi)) => padded_range(*lo, *hi, 0.05)?,
        _ => (0.0, 1.0),
    };

    let mut builder = ChartBuilder::on(area);
    builder.margin(15);
    if theme.annotate {
        builder
            .caption(format!("Box Plot of {}", name), (FONT_FAMILY, 22))
            .x_label_area_size(35)
            .y_label_area_size(50);
    }
    let mut chart = builder.build_cartesian_2d(0f64..2f64, lo..hi)?;

    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh().x_labels(0);
    if theme.annotate {
        mesh.y_desc(name);
    }
    mesh.draw()?;

    let (left, right, center) = (0.7, 1.3, 1.0);
    chart.draw_series(std::iter::once(Rectangle::new(
        [(left, stats.q1), (right, stats.q3)],
        theme.box_color.mix(0.3).filled(),
    )))?;
    chart.draw_series(std::iter::once(Rectangle::new(
        [(left, stats.q1), (right, stats.q3)],
        theme.box_color.stroke_width(2),
    )))?;
    chart.draw_series(std::iter::once(PathElement::new(
        vec![(left, stats.median), (right, stats.median)],
        RED.stroke_width(2),
    )))?;

    let whiskers = [
        ((center, stats.q3), (center, stats.upper_whisker)),
        ((center, stats.q1), (center, stats.lower_whisker)),
        ((0.85, stats.upper_whisker), (1.15, stats.upper_whisker)),
        ((0.85, stats.lower_whisker), (1.15, stats.lower_whisker)),
    ];
    chart.draw_series(
        whiskers
            .iter()
            .map(|(from, to)| PathElement::new(vec![*from, *to], BLACK.stroke_width(1))),
    )?;

    chart.draw_series(
        stats
            .outliers
            .iter()
            .map(|v| Circle::new((center, *v), 3, BLACK.stroke_width(1))),
    )?;

    Ok(())
}
