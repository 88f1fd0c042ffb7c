use std::collections::HashSet;

use calamine::Data;
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde_json::{Map, Value};

use super::utils::{excel_serial_to_datetime, parse_timestamp, timestamp_millis_to_datetime, unique_column_name};
use crate::error::AppError;

const TEXT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static EMPTY_CELL: Data = Data::Empty;

/// Declared storage type of a column, fixed at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Numeric,
    Text,
    Boolean,
    Datetime,
}

/// Tabular data from a single upload. Immutable once built.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    /// Builds a dataset from a header row and data rows of spreadsheet cells.
    /// Short rows are padded with empty cells.
    pub fn from_rows(headers: &[String], rows: &[Vec<Data>]) -> Result<Self, AppError> {
        let mut existing_names = HashSet::new();
        let mut columns = Vec::with_capacity(headers.len());

        for (col_idx, header) in headers.iter().enumerate() {
            let name = unique_column_name(header, col_idx, &mut existing_names);
            let cells: Vec<&Data> = rows
                .iter()
                .map(|row| row.get(col_idx).unwrap_or(&EMPTY_CELL))
                .collect();
            columns.push(build_series(&name, &cells)?);
        }

        Ok(Self { frame: DataFrame::new(columns)? })
    }

    pub fn row_count(&self) -> usize {
        self.frame.height()
    }

    pub fn column_count(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn storage_type(&self, name: &str) -> Option<StorageType> {
        let series = self.frame.column(name).ok()?;
        Some(storage_of(series.dtype()))
    }

    pub fn null_count(&self, name: &str) -> usize {
        self.frame.column(name).map_or(0, |series| series.null_count())
    }

    pub fn has_missing(&self) -> bool {
        self.frame.get_columns().iter().any(|series| series.null_count() > 0)
    }

    pub fn memory_usage_bytes(&self) -> usize {
        self.frame.estimated_size()
    }

    /// Storage dtype per column, in column order.
    pub fn dtype_labels(&self) -> Vec<(String, String)> {
        self.frame
            .get_columns()
            .iter()
            .map(|series| (series.name().to_string(), series.dtype().to_string()))
            .collect()
    }

    /// Values of a numeric column as floats. `None` if the column is missing
    /// or not numeric.
    pub fn numeric_values(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let series = self.frame.column(name).ok()?;
        if storage_of(series.dtype()) != StorageType::Numeric {
            return None;
        }
        let floats = series.cast(&DataType::Float64).ok()?;
        let values = floats.f64().ok()?.into_iter().collect();
        Some(values)
    }

    /// Values of a text or boolean column as strings.
    pub fn text_values(&self, name: &str) -> Option<Vec<Option<String>>> {
        let series = self.frame.column(name).ok()?;
        match storage_of(series.dtype()) {
            StorageType::Text => Some(
                series
                    .str()
                    .ok()?
                    .into_iter()
                    .map(|value| value.map(str::to_string))
                    .collect(),
            ),
            StorageType::Boolean => Some(
                series
                    .bool()
                    .ok()?
                    .into_iter()
                    .map(|value| value.map(|b| if b { "True" } else { "False" }.to_string()))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Values of a column as timestamps: native datetime columns directly,
    /// text columns through `parse_timestamp`. Unparseable text becomes `None`.
    pub fn timestamps(&self, name: &str) -> Option<Vec<Option<NaiveDateTime>>> {
        let series = self.frame.column(name).ok()?;
        match storage_of(series.dtype()) {
            StorageType::Datetime => {
                let millis = series.cast(&DataType::Int64).ok()?;
                let values = millis
                    .i64()
                    .ok()?
                    .into_iter()
                    .map(|value| value.and_then(timestamp_millis_to_datetime))
                    .collect();
                Some(values)
            }
            StorageType::Text => Some(
                series
                    .str()
                    .ok()?
                    .into_iter()
                    .map(|value| value.and_then(parse_timestamp))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// First `limit` rows keyed by column name, with missing values rendered
    /// as empty strings.
    pub fn preview(&self, limit: usize) -> Vec<Map<String, Value>> {
        let height = self.row_count().min(limit);
        let mut rows = vec![Map::new(); height];

        for name in self.column_names() {
            let cells = self.json_cells(&name, height);
            for (row, cell) in rows.iter_mut().zip(cells) {
                row.insert(name.clone(), cell);
            }
        }

        rows
    }

    fn json_cells(&self, name: &str, limit: usize) -> Vec<Value> {
        let blank = || Value::String(String::new());
        let Some(storage) = self.storage_type(name) else {
            return Vec::new();
        };

        match storage {
            StorageType::Numeric => {
                if let Some(ints) = self.frame.column(name).ok().and_then(|series| series.i64().ok()) {
                    return ints
                        .into_iter()
                        .take(limit)
                        .map(|value| value.map_or_else(blank, Value::from))
                        .collect();
                }
                self.numeric_values(name)
                    .unwrap_or_default()
                    .into_iter()
                    .take(limit)
                    .map(|value| match value {
                        Some(v) if v.is_finite() => Value::from(v),
                        _ => blank(),
                    })
                    .collect()
            }
            StorageType::Datetime => self
                .timestamps(name)
                .unwrap_or_default()
                .into_iter()
                .take(limit)
                .map(|value| {
                    value.map_or_else(blank, |dt| Value::String(dt.format(TEXT_DATETIME_FORMAT).to_string()))
                })
                .collect(),
            StorageType::Boolean => self
                .frame
                .column(name)
                .ok()
                .and_then(|series| series.bool().ok().map(|ca| ca.into_iter().take(limit).collect::<Vec<_>>()))
                .unwrap_or_default()
                .into_iter()
                .map(|value| value.map_or_else(blank, Value::Bool))
                .collect(),
            StorageType::Text => self
                .text_values(name)
                .unwrap_or_default()
                .into_iter()
                .take(limit)
                .map(|value| value.map_or_else(blank, Value::String))
                .collect(),
        }
    }
}

fn storage_of(dtype: &DataType) -> StorageType {
    match dtype {
        DataType::Int32
        | DataType::Int64
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64 => StorageType::Numeric,
        DataType::Boolean => StorageType::Boolean,
        DataType::Datetime(_, _) => StorageType::Datetime,
        _ => StorageType::Text,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Bool,
    DateTime,
    Other,
}

fn cell_kind(cell: &Data) -> Option<CellKind> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::Int(_) => Some(CellKind::Int),
        Data::Float(_) => Some(CellKind::Float),
        Data::Bool(_) => Some(CellKind::Bool),
        Data::DateTime(_) => Some(CellKind::DateTime),
        Data::DateTimeIso(s) if parse_timestamp(s).is_some() => Some(CellKind::DateTime),
        _ => Some(CellKind::Other),
    }
}

fn cell_datetime(cell: &Data) -> Option<NaiveDateTime> {
    match cell {
        Data::DateTime(d) => excel_serial_to_datetime(d.as_f64()),
        Data::DateTimeIso(s) => parse_timestamp(s),
        _ => None,
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::DateTime(_) => cell_datetime(cell).map(|dt| dt.format(TEXT_DATETIME_FORMAT).to_string()),
        other => Some(other.to_string()),
    }
}

/// Picks the narrowest storage type that holds every non-empty cell.
fn build_series(name: &str, cells: &[&Data]) -> PolarsResult<Series> {
    let kinds: Vec<CellKind> = cells.iter().filter_map(|cell| cell_kind(cell)).collect();

    let all = |wanted: &[CellKind]| kinds.iter().all(|kind| wanted.contains(kind));

    if kinds.is_empty() {
        let nulls: Vec<Option<f64>> = vec![None; cells.len()];
        return Ok(Series::new(name, nulls));
    }

    if all(&[CellKind::Int]) {
        let ints: Vec<Option<i64>> = cells
            .iter()
            .map(|cell| match cell {
                Data::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        return Ok(Series::new(name, ints));
    }

    if all(&[CellKind::Int, CellKind::Float]) {
        let nums: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| match cell {
                Data::Float(f) => Some(*f),
                Data::Int(i) => Some(*i as f64),
                _ => None,
            })
            .collect();
        return Ok(Series::new(name, nums));
    }

    if all(&[CellKind::Bool]) {
        let bools: Vec<Option<bool>> = cells
            .iter()
            .map(|cell| match cell {
                Data::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Ok(Series::new(name, bools));
    }

    if all(&[CellKind::DateTime]) {
        let millis: Vec<Option<i64>> = cells
            .iter()
            .map(|cell| cell_datetime(cell).map(|dt| dt.and_utc().timestamp_millis()))
            .collect();
        return Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None));
    }

    let strings: Vec<Option<String>> = cells.iter().map(|cell| cell_text(cell)).collect();
    Ok(Series::new(name, strings))
}
