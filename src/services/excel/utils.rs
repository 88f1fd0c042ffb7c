use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

/// Extensions accepted by the upload endpoints.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["xlsx", "xls", "xlsm", "xlsb", "ods"];

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d.%m.%Y",
];

/// Makes a header cell usable as a column name: blank headers become
/// `Unnamed: <index>` and repeated names get a `.N` suffix.
pub fn unique_column_name(raw: &str, index: usize, existing_names: &mut HashSet<String>) -> String {
    let trimmed = raw.trim();
    let base_name = if trimmed.is_empty() {
        format!("Unnamed: {}", index)
    } else {
        trimmed.to_string()
    };

    let mut cleaned = base_name.clone();
    let mut counter = 1;
    while !existing_names.insert(cleaned.clone()) {
        cleaned = format!("{}.{}", base_name, counter);
        counter += 1;
    }

    cleaned
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS.iter() {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Converts an Excel serial date (days since 1899-12-30) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

pub fn timestamp_millis_to_datetime(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

pub fn is_supported_spreadsheet(filename: &str) -> bool {
    file_extension(filename)
        .map_or(false, |ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Download name for a generated report, derived from the upload's name
/// up to its first dot.
pub fn report_filename(upload_name: &str) -> String {
    let stem = upload_name.split('.').next().unwrap_or_default();
    let stem = if stem.is_empty() { "dataset" } else { stem };
    format!("statly_report_{}.pdf", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn blank_and_duplicate_headers_are_renamed() {
        let mut seen = HashSet::new();
        assert_eq!(unique_column_name("price", 0, &mut seen), "price");
        assert_eq!(unique_column_name("price", 1, &mut seen), "price.1");
        assert_eq!(unique_column_name("  ", 2, &mut seen), "Unnamed: 2");
        assert_eq!(unique_column_name("price", 3, &mut seen), "price.2");
    }

    #[test]
    fn parses_dates_and_datetimes() {
        let d = parse_timestamp("2024-03-15").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2024, 3, 15));

        let dt = parse_timestamp("2024-03-15 10:30:00").unwrap();
        assert_eq!(dt.hour(), 10);

        let eu = parse_timestamp("15/03/2024").unwrap();
        assert_eq!(eu.month(), 3);

        assert!(parse_timestamp("2024-03-15T10:30:00Z").is_some());
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn converts_excel_serials() {
        let dt = excel_serial_to_datetime(45366.5).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2024, 3, 15, 12));
        assert!(excel_serial_to_datetime(f64::NAN).is_none());
    }

    #[test]
    fn recognises_spreadsheet_extensions() {
        assert!(is_supported_spreadsheet("sales.xlsx"));
        assert!(is_supported_spreadsheet("OLD.XLS"));
        assert!(!is_supported_spreadsheet("notes.csv"));
        assert!(!is_supported_spreadsheet("README"));
    }

    #[test]
    fn report_filename_uses_upload_stem() {
        assert_eq!(report_filename("sales.q1.xlsx"), "statly_report_sales.pdf");
        assert_eq!(report_filename(".xlsx"), "statly_report_dataset.pdf");
    }
}
