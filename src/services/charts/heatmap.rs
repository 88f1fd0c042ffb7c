use anyhow::Result;
use plotters::prelude::*;

use super::{render_png, ChartTheme, FONT_FAMILY};
use crate::models::{ChartImage, CorrelationMatrix};

/// Color-coded correlation grid. Row `i` of the matrix is drawn as the
/// `i`-th row from the top; cells carry their coefficient when annotated.
pub(super) fn render(matrix: &CorrelationMatrix, theme: &ChartTheme) -> Result<ChartImage> {
    let names: Vec<&str> = matrix.keys().map(String::as_str).collect();
    let size = names.len();
    if size == 0 {
        anyhow::bail!("empty correlation matrix");
    }
    let extent = size as f64;

    let cells: Vec<(usize, usize, Option<f64>)> = matrix
        .values()
        .enumerate()
        .flat_map(|(row, entries)| {
            entries
                .values()
                .enumerate()
                .map(move |(col, value)| (row, col, *value))
        })
        .collect();

    render_png(theme.heatmap_size, |root| {
        let mut builder = ChartBuilder::on(root);
        builder.margin(20);
        if theme.annotate {
            builder
                .caption("Correlation Matrix", (FONT_FAMILY, 26))
                .x_label_area_size(60)
                .y_label_area_size(120);
        }
        let mut chart = builder.build_cartesian_2d(0f64..extent, 0f64..extent)?;

        let column_label = |x: &f64| names.get(x.floor().max(0.0) as usize).map(|s| s.to_string()).unwrap_or_default();
        let row_label = |y: &f64| {
            let from_top = size.checked_sub(1 + y.floor().max(0.0) as usize);
            from_top.and_then(|i| names.get(i)).map(|s| s.to_string()).unwrap_or_default()
        };

        let mut mesh = chart.configure_mesh();
        mesh.disable_mesh();
        if theme.annotate {
            mesh.x_labels(size)
                .y_labels(size)
                .x_label_formatter(&column_label)
                .y_label_formatter(&row_label);
        } else {
            mesh.x_labels(0).y_labels(0);
        }
        mesh.draw()?;

        chart.draw_series(cells.iter().map(|(row, col, value)| {
            let x = *col as f64;
            let y = (size - 1 - row) as f64;
            Rectangle::new([(x, y), (x + 1.0, y + 1.0)], theme.diverging(*value).filled())
        }))?;
        chart.draw_series(cells.iter().map(|(row, col, _)| {
            let x = *col as f64;
            let y = (size - 1 - row) as f64;
            Rectangle::new([(x, y), (x + 1.0, y + 1.0)], WHITE.stroke_width(1))
        }))?;

        if theme.annotate {
            let font_size = if size > 8 { 12 } else { 18 };
            chart.draw_series(cells.iter().map(|(row, col, value)| {
                let label = value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v));
                let x = *col as f64 + 0.35;
                let y = (size - row) as f64 - 0.4;
                Text::new(label, (x, y), (FONT_FAMILY, font_size).into_font())
            }))?;
        }

        Ok(())
    })
}
