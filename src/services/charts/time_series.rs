use anyhow::Result;
use chrono::NaiveDateTime;
use plotters::prelude::*;

use super::{padded_range, render_png, ChartTheme, FONT_FAMILY};
use crate::models::ChartImage;
use crate::services::excel::utils::timestamp_millis_to_datetime;

/// Rows where both the timestamp and the value are present, ascending by
/// time. Rows with equal timestamps keep their dataset order.
pub(super) fn sorted_points(stamps: &[Option<NaiveDateTime>], values: &[Option<f64>]) -> Vec<(NaiveDateTime, f64)> {
    let mut points: Vec<(NaiveDateTime, f64)> = stamps
        .iter()
        .zip(values.iter())
        .filter_map(|(stamp, value)| match (stamp, value) {
            (Some(stamp), Some(value)) if value.is_finite() => Some((*stamp, *value)),
            _ => None,
        })
        .collect();
    points.sort_by_key(|(stamp, _)| *stamp);
    points
}

pub(super) fn render(
    date_col: &str,
    value_col: &str,
    points: &[(NaiveDateTime, f64)],
    theme: &ChartTheme,
) -> Result<ChartImage> {
    let series: Vec<(f64, f64)> = points
        .iter()
        .map(|(stamp, value)| (stamp.and_utc().timestamp_millis() as f64, *value))
        .collect();

    let (x_lo, x_hi) = match (series.first(), series.last()) {
        (Some(first), Some(last)) if last.0 > first.0 => (first.0, last.0),
        (Some(first), _) => (first.0 - 43_200_000.0, first.0 + 43_200_000.0),
        _ => anyhow::bail!("no points to plot"),
    };
    let (y_min, y_max) = series
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| (lo.min(*v), hi.max(*v)));
    let (y_lo, y_hi) = padded_range(y_min, y_max, 0.05)?;

    render_png(theme.time_series_size, |root| {
        let mut builder = ChartBuilder::on(root);
        builder.margin(20);
        if theme.annotate {
            builder
                .caption(format!("{} over time", value_col), (FONT_FAMILY, 24))
                .x_label_area_size(60)
                .y_label_area_size(60);
        }
        let mut chart = builder.build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

        let date_label = |x: &f64| {
            timestamp_millis_to_datetime(*x as i64)
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };

        let mut mesh = chart.configure_mesh();
        if theme.annotate {
            mesh.x_desc(date_col)
                .y_desc(value_col)
                .x_labels(8)
                .x_label_formatter(&date_label);
        }
        mesh.draw()?;

        chart.draw_series(LineSeries::new(series.iter().copied(), theme.line_color.stroke_width(2)))?;
        chart.draw_series(
            series
                .iter()
                .map(|point| Circle::new(*point, 4, theme.line_color.filled())),
        )?;

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::excel::utils::parse_timestamp;

    fn at(s: &str) -> Option<NaiveDateTime> {
        parse_timestamp(s)
    }

    #[test]
    fn points_are_sorted_and_incomplete_rows_dropped() {
        let stamps = vec![at("2024-03-01"), at("2024-01-01"), None, at("2024-02-01")];
        let values = vec![Some(3.0), Some(1.0), Some(9.0), None];
        let points = sorted_points(&stamps, &values);

        assert_eq!(points.len(), 2);
        assert_eq!(points[0], (at("2024-01-01").unwrap(), 1.0));
        assert_eq!(points[1], (at("2024-03-01").unwrap(), 3.0));
    }

    #[test]
    fn source_slices_are_not_reordered() {
        let stamps = vec![at("2024-03-01"), at("2024-01-01")];
        let values = vec![Some(3.0), Some(1.0)];
        let _ = sorted_points(&stamps, &values);
        assert_eq!(stamps[0], at("2024-03-01"));
    }

    #[test]
    fn renders_single_point_series() {
        let theme = ChartTheme {
            time_series_size: (200, 100),
            ..ChartTheme::default()
        };
        let points = vec![(at("2024-01-01").unwrap(), 5.0)];
        assert!(render("date", "sales", &points, &theme).is_ok());
    }

    #[test]
    fn overflowing_value_range_is_not_rendered() {
        let theme = ChartTheme {
            time_series_size: (200, 100),
            ..ChartTheme::default()
        };
        let points = vec![
            (at("2024-01-01").unwrap(), -1e308),
            (at("2024-01-02").unwrap(), 1e308),
        ];
        assert!(render("date", "sales", &points, &theme).is_err());
    }
}
