pub mod dataset;
pub mod loader;
pub mod utils;

pub use dataset::{Dataset, StorageType};
pub use loader::load_dataset;

use crate::models::UploadPreview;

pub const PREVIEW_ROWS: usize = 5;

/// Shape, storage types and the first rows of a freshly loaded dataset.
pub fn upload_preview(dataset: &Dataset) -> UploadPreview {
    UploadPreview {
        rows: dataset.row_count(),
        columns: dataset.column_count(),
        column_names: dataset.column_names(),
        data_types: dataset.dtype_labels().into_iter().collect(),
        preview: dataset.preview(PREVIEW_ROWS),
        has_missing_values: dataset.has_missing(),
    }
}
