use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use super::dataset::Dataset;
use crate::error::AppError;

/// Parses the first worksheet of a spreadsheet payload. The first row is
/// the header row; trailing blank rows are ignored.
pub fn load_dataset(file_data: &[u8]) -> Result<Dataset, AppError> {
    let start = std::time::Instant::now();
    tracing::info!("Opening workbook ({} KB)", file_data.len() / 1024);

    let cursor = Cursor::new(file_data);
    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|e| {
        tracing::error!("Failed to open spreadsheet: {}", e);
        AppError::InvalidInputFormat(format!("Failed to open spreadsheet: {}", e))
    })?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    tracing::info!("Found {} sheets: {:?}", sheet_names.len(), sheet_names);

    let sheet_name = sheet_names.first().ok_or(AppError::EmptyDataset)?;
    let range = workbook.worksheet_range(sheet_name).map_err(|e| {
        tracing::error!("Failed to read worksheet {}: {}", sheet_name, e);
        AppError::InvalidInputFormat(format!("Failed to read worksheet {}: {}", sheet_name, e))
    })?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .ok_or(AppError::EmptyDataset)?;

    let mut data_rows: Vec<Vec<Data>> = rows.map(|row| row.to_vec()).collect();
    while data_rows.last().map_or(false, |row| is_blank_row(row)) {
        data_rows.pop();
    }

    if data_rows.is_empty() {
        tracing::warn!("Sheet {} has a header row but no data", sheet_name);
        return Err(AppError::EmptyDataset);
    }

    let dataset = Dataset::from_rows(&headers, &data_rows)?;
    tracing::info!(
        "Loaded sheet {} with {} rows and {} columns in {:?}",
        sheet_name,
        dataset.row_count(),
        dataset.column_count(),
        start.elapsed()
    );

    Ok(dataset)
}

fn is_blank_row(row: &[Data]) -> bool {
    row.iter().all(|cell| matches!(cell, Data::Empty))
}
