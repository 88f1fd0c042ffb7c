use calamine::Data;
use chrono::NaiveDate;

use statly::error::AppError;
use statly::services::analysis::{basic_statistics, classify_columns, perform_analysis};
use statly::services::charts::{render_charts, ChartTheme};
use statly::services::excel::{load_dataset, Dataset};
use statly::services::report::ReportRenderer;

fn theme() -> ChartTheme {
    ChartTheme {
        distribution_size: (300, 120),
        heatmap_size: (200, 150),
        time_series_size: (300, 120),
        categorical_size: (240, 120),
        ..ChartTheme::default()
    }
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn text(s: &str) -> Data {
    Data::String(s.to_string())
}

/// 100 rows of price / category / date, no missing cells.
fn products() -> Dataset {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let categories = ["books", "games", "music"];
    let rows: Vec<Vec<Data>> = (0..100)
        .map(|i| {
            let day = start + chrono::Duration::days(i);
            vec![
                Data::Float(10.0 + (i % 17) as f64 * 1.5),
                text(categories[i as usize % 3]),
                text(&day.format("%Y-%m-%d").to_string()),
            ]
        })
        .collect();
    Dataset::from_rows(&headers(&["price", "category", "date"]), &rows).unwrap()
}

fn measurements() -> Dataset {
    let rows: Vec<Vec<Data>> = (0..30)
        .map(|i| {
            let x = i as f64;
            vec![
                Data::Float(x),
                Data::Float(2.0 * x + 1.0),
                Data::Float(100.0 - x * x / 10.0),
                if i % 7 == 0 { Data::Empty } else { Data::Int(i % 5) },
            ]
        })
        .collect();
    Dataset::from_rows(&headers(&["x", "linear", "curve", "bucket"]), &rows).unwrap()
}

/// Six numeric columns, five categorical ones (the second with 25 distinct
/// values) and one date column, 30 rows.
fn wide_table() -> Dataset {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let mut names: Vec<String> = (0..6).map(|c| format!("m{}", c)).collect();
    names.extend((0..5).map(|c| format!("c{}", c)));
    names.push("date".to_string());

    let rows: Vec<Vec<Data>> = (0..30)
        .map(|i| {
            let mut row: Vec<Data> = (0..6)
                .map(|c| Data::Float(((i * (c + 2)) % 11) as f64 + c as f64 * 0.5))
                .collect();
            row.extend((0..5).map(|c| {
                let distinct = if c == 1 { 25 } else { 3 };
                text(&format!("v{}", i % distinct))
            }));
            let day = start + chrono::Duration::days(i as i64);
            row.push(text(&day.format("%Y-%m-%d").to_string()));
            row
        })
        .collect();
    Dataset::from_rows(&names, &rows).unwrap()
}

#[test]
fn chart_groups_are_capped() {
    let dataset = wide_table();
    let types = classify_columns(&dataset);
    assert_eq!(types.numeric.len(), 6);
    assert_eq!(types.categorical.len(), 5);
    assert_eq!(types.datetime, vec!["date"]);

    let stats = basic_statistics(&dataset, &types);
    let plots = render_charts(&dataset, &types, stats.correlation.as_ref(), &theme());

    assert_eq!(plots.distributions.len(), 4);
    assert_eq!(plots.correlation_heatmap.len(), 1);
    assert_eq!(plots.time_series.len(), 2);
    // c0 and c2; c1 has too many distinct values and c3 onwards are past the cap.
    assert_eq!(plots.categorical.len(), 2);
}

#[test]
fn extreme_values_do_not_stall_analysis() {
    let rows = vec![vec![Data::Float(-1e308)], vec![Data::Float(0.0)], vec![Data::Float(1e308)]];
    let dataset = Dataset::from_rows(&headers(&["reading"]), &rows).unwrap();
    let analysis = perform_analysis(&dataset, &theme()).unwrap();

    let reading = analysis.basic_statistics.numeric_summary.get("reading").unwrap();
    assert_eq!(reading.mean, Some(0.0));
    assert_eq!(reading.max, Some(1e308));
    assert!(analysis.plots.distributions.is_empty());
}

#[test]
fn mixed_columns_are_classified_and_summarized() {
    let dataset = products();
    let analysis = perform_analysis(&dataset, &theme()).unwrap();

    assert_eq!(analysis.column_types.numeric, vec!["price"]);
    assert_eq!(analysis.column_types.categorical, vec!["category"]);
    assert_eq!(analysis.column_types.datetime, vec!["date"]);

    let price = analysis.basic_statistics.numeric_summary.get("price").unwrap();
    assert_eq!(price.count, 100);
    assert!(analysis.basic_statistics.categorical_summary.get("category").is_some());
    assert!(analysis.basic_statistics.categorical_summary.get("date").is_none());
    assert_eq!(analysis.plots.time_series.len(), 1);
}

#[test]
fn all_null_numeric_column_yields_undefined_statistics() {
    let rows = vec![vec![Data::Empty], vec![Data::Empty], vec![Data::Empty]];
    let dataset = Dataset::from_rows(&headers(&["reading"]), &rows).unwrap();
    let analysis = perform_analysis(&dataset, &theme()).unwrap();

    let reading = analysis.basic_statistics.numeric_summary.get("reading").unwrap();
    assert_eq!(reading.count, 0);
    assert_eq!(reading.mean, None);
    assert_eq!(reading.std, None);
    assert!(analysis.plots.distributions.is_empty());
}

#[test]
fn empty_dataset_is_rejected_before_analysis() {
    let dataset = Dataset::from_rows(&headers(&["a", "b"]), &[]).unwrap();
    let result = perform_analysis(&dataset, &theme());
    assert!(matches!(result, Err(AppError::EmptyDataset)));
}

#[test]
fn single_numeric_column_has_no_correlation() {
    let rows: Vec<Vec<Data>> = (0..10).map(|i| vec![Data::Int(i), text("x")]).collect();
    let dataset = Dataset::from_rows(&headers(&["value", "label"]), &rows).unwrap();
    let analysis = perform_analysis(&dataset, &theme()).unwrap();

    assert!(analysis.basic_statistics.correlation.is_none());
    assert!(analysis.plots.correlation_heatmap.is_empty());
    assert_eq!(analysis.plots.distributions.len(), 1);

    let json = serde_json::to_value(&analysis).unwrap();
    assert!(json["basic_statistics"].get("correlations").is_none());
}

#[test]
fn report_covers_chart_groups_and_leaves_no_staging_files() {
    let staging = tempfile::tempdir().unwrap();
    let dataset = products();
    let analysis = perform_analysis(&dataset, &theme()).unwrap();

    let report = ReportRenderer::new(staging.path())
        .render(&dataset, &analysis, "products.xlsx")
        .unwrap();

    assert!(report.bytes.starts_with(b"%PDF"));
    assert!(report.page_count >= analysis.plots.non_empty_groups());
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[test]
fn correlation_matrix_is_symmetric_with_unit_diagonal() {
    let dataset = measurements();
    let types = classify_columns(&dataset);
    let stats = basic_statistics(&dataset, &types);
    let matrix = stats.correlation.unwrap();

    let names: Vec<&str> = matrix.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["x", "linear", "curve", "bucket"]);
    for &a in &names {
        let row = matrix.get(a).unwrap();
        assert_eq!(*row.get(a).unwrap(), Some(1.0));
        for &b in &names {
            let ab = *row.get(b).unwrap();
            let ba = *matrix.get(b).unwrap().get(a).unwrap();
            assert_eq!(ab, ba);
            if let Some(r) = ab {
                assert!((-1.0..=1.0).contains(&r));
            }
        }
    }
    let r = matrix.get("x").unwrap().get("linear").unwrap().unwrap();
    assert!((r - 1.0).abs() < 1e-12);
}

#[test]
fn quartiles_are_ordered() {
    let dataset = measurements();
    let types = classify_columns(&dataset);
    let stats = basic_statistics(&dataset, &types);

    for (_, summary) in stats.numeric_summary.iter() {
        let ordered = [summary.min, summary.p25, summary.p50, summary.p75, summary.max];
        let values: Vec<f64> = ordered.iter().map(|v| v.unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "{:?}", values);
    }
}

#[test]
fn classification_is_idempotent() {
    let dataset = products();
    assert_eq!(classify_columns(&dataset), classify_columns(&dataset));
}

#[test]
fn value_counts_are_bounded_and_descending() {
    let dataset = products();
    let types = classify_columns(&dataset);
    let stats = basic_statistics(&dataset, &types);

    for (_, summary) in stats.categorical_summary.iter() {
        assert!(summary.value_counts.len() <= 5);
        assert!(summary.value_counts.len() <= summary.unique_values);
        assert!(summary.value_counts.windows(2).all(|w| w[0].count >= w[1].count));
        assert_eq!(
            summary.most_frequent.as_deref(),
            summary.value_counts.first().map(|v| v.value.as_str())
        );
    }
}

#[test]
fn text_only_dataset_has_no_numeric_charts() {
    let rows = vec![vec![text("red"), text("small")], vec![text("blue"), text("large")]];
    let dataset = Dataset::from_rows(&headers(&["color", "size"]), &rows).unwrap();
    let analysis = perform_analysis(&dataset, &theme()).unwrap();

    assert!(analysis.basic_statistics.numeric_summary.is_empty());
    assert!(analysis.plots.distributions.is_empty());
    assert!(analysis.plots.correlation_heatmap.is_empty());
    assert!(analysis.plots.time_series.is_empty());
    assert_eq!(analysis.plots.categorical.len(), 2);
}

#[test]
fn unreadable_upload_is_invalid_input() {
    let result = load_dataset(b"definitely not a spreadsheet");
    assert!(matches!(result, Err(AppError::InvalidInputFormat(_))));
}
