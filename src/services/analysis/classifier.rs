use crate::models::ColumnClassification;
use crate::services::excel::utils::parse_timestamp;
use crate::services::excel::{Dataset, StorageType};

const DATETIME_NAME_HINTS: [&str; 3] = ["date", "data", "time"];

/// Partitions columns by storage type. Text columns whose name hints at a
/// date and whose every non-null value parses as a timestamp are moved to
/// `datetime`; anything else stays categorical.
pub fn classify_columns(dataset: &Dataset) -> ColumnClassification {
    let mut classification = ColumnClassification::default();

    for name in dataset.column_names() {
        match dataset.storage_type(&name) {
            Some(StorageType::Numeric) => classification.numeric.push(name),
            Some(StorageType::Datetime) => classification.datetime.push(name),
            Some(StorageType::Text) if has_datetime_hint(&name) && parses_as_timestamps(dataset, &name) => {
                tracing::debug!("Column {} reclassified as datetime", name);
                classification.datetime.push(name);
            }
            Some(StorageType::Text) | Some(StorageType::Boolean) => classification.categorical.push(name),
            None => {}
        }
    }

    classification
}

fn has_datetime_hint(name: &str) -> bool {
    let lower = name.to_lowercase();
    DATETIME_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

fn parses_as_timestamps(dataset: &Dataset, name: &str) -> bool {
    let Some(values) = dataset.text_values(name) else {
        return false;
    };

    let mut parsed = 0;
    for value in values.iter().flatten() {
        if parse_timestamp(value).is_none() {
            return false;
        }
        parsed += 1;
    }
    parsed > 0
}
