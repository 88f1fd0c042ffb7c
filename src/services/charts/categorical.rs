use anyhow::Result;
use plotters::prelude::*;

use super::{render_png, ChartTheme, FONT_FAMILY};
use crate::models::{ChartImage, ValueCount};

/// Bar chart of the given frequencies, drawn in the order supplied.
pub(super) fn render(name: &str, frequencies: &[ValueCount], theme: &ChartTheme) -> Result<ChartImage> {
    if frequencies.is_empty() {
        anyhow::bail!("no values to plot");
    }
    let bars = frequencies.len() as f64;
    let peak = frequencies.iter().map(|f| f.count).max().unwrap_or(1).max(1) as f64;

    render_png(theme.categorical_size, |root| {
        let mut builder = ChartBuilder::on(root);
        builder.margin(20);
        if theme.annotate {
            builder
                .caption(format!("Distribution of {}", name), (FONT_FAMILY, 24))
                .x_label_area_size(70)
                .y_label_area_size(60);
        }
        let mut chart = builder.build_cartesian_2d(0f64..bars, 0f64..peak * 1.1)?;

        let bar_label = |x: &f64| {
            let idx = x.floor().max(0.0) as usize;
            frequencies.get(idx).map(|f| f.value.clone()).unwrap_or_default()
        };

        let mut mesh = chart.configure_mesh();
        mesh.disable_x_mesh();
        if theme.annotate {
            mesh.x_desc(name)
                .y_desc("Frequency")
                .x_labels(frequencies.len() * 2 + 1)
                .x_label_formatter(&bar_label);
        }
        mesh.draw()?;

        let fill = theme.bar_color.mix(0.8).filled();
        chart.draw_series(frequencies.iter().enumerate().map(|(i, entry)| {
            let x = i as f64;
            Rectangle::new([(x + 0.1, 0.0), (x + 0.9, entry.count as f64)], fill)
        }))?;

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_bars() {
        let theme = ChartTheme {
            categorical_size: (240, 120),
            ..ChartTheme::default()
        };
        let frequencies = vec![
            ValueCount { value: "books".into(), count: 4 },
            ValueCount { value: "games".into(), count: 2 },
        ];
        assert!(render("category", &frequencies, &theme).is_ok());
    }

    #[test]
    fn nothing_to_draw_is_an_error() {
        assert!(render("category", &[], &ChartTheme::default()).is_err());
    }
}
