use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use smallvec::SmallVec;

pub const TOP_VALUE_COUNTS: usize = 5;

/// Mapping keyed by column name; iterates and serializes in column order.
pub type ColumnMap<V> = IndexMap<String, V>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ColumnClassification {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub datetime: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub total_rows: usize,
    pub total_columns: usize,
    pub missing_values: ColumnMap<usize>,
    pub memory_usage: String,
}

impl DatasetInfo {
    pub fn total_missing(&self) -> usize {
        self.missing_values.values().sum()
    }
}

/// Descriptive statistics for one numeric column. `None` marks a statistic
/// that is undefined for the column's values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub p25: Option<f64>,
    #[serde(rename = "50%")]
    pub p50: Option<f64>,
    #[serde(rename = "75%")]
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

impl NumericSummary {
    /// Rows of the numeric statistics table, in display order.
    pub fn labelled(&self) -> [(&'static str, Option<f64>); 8] {
        [
            ("count", Some(self.count as f64)),
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.p25),
            ("50%", self.p50),
            ("75%", self.p75),
            ("max", self.max),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub unique_values: usize,
    pub most_frequent: Option<String>,
    #[serde(serialize_with = "serialize_value_counts")]
    pub value_counts: SmallVec<[ValueCount; TOP_VALUE_COUNTS]>,
}

fn serialize_value_counts<S: Serializer>(
    counts: &SmallVec<[ValueCount; TOP_VALUE_COUNTS]>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(counts.len()))?;
    for entry in counts {
        map.serialize_entry(&entry.value, &entry.count)?;
    }
    map.end()
}

/// Row-major Pearson correlations; `None` where the coefficient is undefined.
pub type CorrelationMatrix = ColumnMap<ColumnMap<Option<f64>>>;

#[derive(Debug, Clone, Serialize)]
pub struct BasicStatistics {
    pub dataset_info: DatasetInfo,
    pub numeric_summary: ColumnMap<NumericSummary>,
    #[serde(rename = "correlations", skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationMatrix>,
    pub categorical_summary: ColumnMap<CategoricalSummary>,
}

/// An encoded PNG image. Serialized as base64 text.
#[derive(Clone, PartialEq, Eq)]
pub struct ChartImage(Vec<u8>);

impl ChartImage {
    pub fn from_png(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }
}

impl std::fmt::Debug for ChartImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChartImage({} bytes)", self.0.len())
    }
}

impl Serialize for ChartImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Distribution,
    CorrelationHeatmap,
    TimeSeries,
    Categorical,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartGroups {
    pub distributions: Vec<ChartImage>,
    pub correlation_heatmap: Vec<ChartImage>,
    pub time_series: Vec<ChartImage>,
    pub categorical: Vec<ChartImage>,
}

impl ChartGroups {
    pub fn group(&self, kind: ChartKind) -> &[ChartImage] {
        match kind {
            ChartKind::Distribution => &self.distributions,
            ChartKind::CorrelationHeatmap => &self.correlation_heatmap,
            ChartKind::TimeSeries => &self.time_series,
            ChartKind::Categorical => &self.categorical,
        }
    }

    /// Number of groups holding at least one chart.
    pub fn non_empty_groups(&self) -> usize {
        [
            ChartKind::Distribution,
            ChartKind::CorrelationHeatmap,
            ChartKind::TimeSeries,
            ChartKind::Categorical,
        ]
        .iter()
        .filter(|kind| !self.group(**kind).is_empty())
        .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub column_types: ColumnClassification,
    pub basic_statistics: BasicStatistics,
    pub plots: ChartGroups,
    pub analysis_timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadPreview {
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub data_types: ColumnMap<String>,
    pub preview: Vec<Map<String, Value>>,
    pub has_missing_values: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn column_map_serializes_in_insertion_order() {
        let map: ColumnMap<usize> = vec![("zeta", 1), ("alpha", 2), ("mid", 3)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":2,"mid":3}"#);
    }

    #[test]
    fn numeric_summary_uses_percentile_keys_and_nulls() {
        let summary = NumericSummary {
            count: 0,
            mean: None,
            std: None,
            min: None,
            p25: None,
            p50: None,
            p75: None,
            max: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["count"], 0);
        assert!(json["mean"].is_null());
        assert!(json.get("25%").is_some());
    }

    #[test]
    fn value_counts_serialize_as_ordered_mapping() {
        let summary = CategoricalSummary {
            unique_values: 2,
            most_frequent: Some("b".into()),
            value_counts: smallvec![
                ValueCount { value: "b".into(), count: 3 },
                ValueCount { value: "a".into(), count: 1 },
            ],
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert_eq!(json, r#"{"unique_values":2,"most_frequent":"b","value_counts":{"b":3,"a":1}}"#);
    }

    #[test]
    fn chart_images_serialize_as_base64() {
        let image = ChartImage::from_png(vec![0x89, b'P', b'N', b'G']);
        assert_eq!(serde_json::to_value(&image).unwrap(), "iVBORw==");
    }

    #[test]
    fn empty_groups_serialize_as_empty_lists() {
        let json = serde_json::to_value(ChartGroups::default()).unwrap();
        assert_eq!(json["distributions"], serde_json::json!([]));
        assert_eq!(json["correlation_heatmap"], serde_json::json!([]));
        assert_eq!(ChartGroups::default().non_empty_groups(), 0);
    }
}
