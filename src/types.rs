use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cleaning::is_missing;

/// Default number of bins for the spending histogram
pub const DEFAULT_HISTOGRAM_BINS: usize = 10;

/// Default number of words kept for the word cloud
pub const DEFAULT_MAX_WORDS: usize = 200;

/// Title shown above every rendering of the dashboard
pub const DASHBOARD_TITLE: &str = "Gamer & Digital Fashion Survey Dashboard";

static MISSING_CELL: RawValue = RawValue::Missing;

/// A raw cell as it was read from the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum RawValue {
    Text(String),
    Missing,
}

impl RawValue {
    /// Build a cell from a field of the input file, mapping missing tokens to `Missing`
    pub fn from_field(field: &str) -> Self {
        if is_missing(field) {
            RawValue::Missing
        } else {
            RawValue::Text(field.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }

    /// Text form of the cell, `None` when missing
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s.as_str()),
            RawValue::Missing => None,
        }
    }
}

/// One survey response, cells aligned with the dataset's header set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: Vec<RawValue>,
}

impl Record {
    pub fn new(values: Vec<RawValue>) -> Self {
        Self { values }
    }

    /// Cell at the given column position; out-of-range positions read as missing
    pub fn get(&self, index: usize) -> &RawValue {
        self.values.get(index).unwrap_or(&MISSING_CELL)
    }
}

/// Ordered set of column names, fixed when the dataset is loaded
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderSet {
    names: Vec<String>,
}

impl HeaderSet {
    /// Build a header set, suffixing repeated names with `.1`, `.2`, ... so every member is unique
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut unique: Vec<String> = Vec::new();

        for name in names {
            let name = name.into();
            let mut candidate = name.clone();
            while unique.contains(&candidate) {
                let n = seen.entry(name.clone()).or_insert(0);
                *n += 1;
                candidate = format!("{}.{}", name, n);
            }
            unique.push(candidate);
        }

        Self { names: unique }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Immutable survey dataset
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    headers: HeaderSet,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(headers: HeaderSet, records: Vec<Record>) -> Self {
        Self { headers, records }
    }

    /// Build a dataset from in-memory text rows, applying the same missing-token rules as the loader
    #[cfg(test)]
    pub fn from_text_rows<S: AsRef<str>>(headers: &[S], rows: &[Vec<S>]) -> Self {
        let header_set = HeaderSet::new(headers.iter().map(|h| h.as_ref().to_string()));
        let records = rows
            .iter()
            .map(|row| {
                let mut values: Vec<RawValue> =
                    row.iter().map(|f| RawValue::from_field(f.as_ref())).collect();
                values.resize(header_set.len(), RawValue::Missing);
                Record::new(values)
            })
            .collect();
        Self::new(header_set, records)
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All cells of one column in record order, `None` if the header is unknown
    pub fn column<'a>(&'a self, header: &str) -> Option<impl Iterator<Item = &'a RawValue> + 'a> {
        let index = self.headers.position(header)?;
        Some(self.records.iter().map(move |r| r.get(index)))
    }

    /// Derive a working copy holding only the records accepted by `keep`
    pub fn retain_records<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&Record) -> bool,
    {
        Dataset {
            headers: self.headers.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Tsv,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" | "txt" => Some(FileFormat::Csv),
            "tsv" | "tab" => Some(FileFormat::Tsv),
            _ => None,
        }
    }

    pub fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv => b',',
            FileFormat::Tsv => b'\t',
        }
    }
}

/// How free-text spending answers become quantities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SpendingMode {
    /// Concatenate every digit in the answer ("20-30" becomes 2030)
    #[default]
    DigitConcat,
    /// Read numbers and take the midpoint of a range ("20-30" becomes 25)
    RangeMidpoint,
}

/// Dashboard options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardOptions {
    /// Whether to trim surrounding whitespace from header names at load
    pub strip_headers: bool,

    /// Whether to fingerprint the input file (SHA-256)
    pub hash_file: bool,

    /// Spending normalization mode
    pub spending_mode: SpendingMode,

    /// Histogram bin count for spending
    pub histogram_bins: usize,

    /// Maximum number of words in the word cloud
    pub max_words: usize,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            strip_headers: true,
            hash_file: true,
            spending_mode: SpendingMode::DigitConcat,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

/// Result type for the application
pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_set_disambiguates_duplicates() {
        let headers = HeaderSet::new(vec!["Region:", "Spend", "Region:", "Region:"]);
        let names: Vec<&str> = headers.iter().collect();
        assert_eq!(names, vec!["Region:", "Spend", "Region:.1", "Region:.2"]);
    }

    #[test]
    fn test_header_set_suffix_does_not_collide() {
        let headers = HeaderSet::new(vec!["a", "a.1", "a"]);
        let names: Vec<&str> = headers.iter().collect();
        assert_eq!(names, vec!["a", "a.1", "a.2"]);
    }

    #[test]
    fn test_raw_value_from_field() {
        assert_eq!(RawValue::from_field(""), RawValue::Missing);
        assert_eq!(RawValue::from_field("NA"), RawValue::Missing);
        assert_eq!(RawValue::from_field("EU"), RawValue::Text("EU".to_string()));
    }

    #[test]
    fn test_as_text() {
        assert_eq!(RawValue::Text("25".to_string()).as_text(), Some("25"));
        assert!(RawValue::Missing.as_text().is_none());
    }

    #[test]
    fn test_dataset_column() {
        let dataset = Dataset::from_text_rows(&["a", "b"], &[vec!["1", "x"], vec!["2"]]);
        let b: Vec<&RawValue> = dataset.column("b").unwrap().collect();
        assert_eq!(b, vec![&RawValue::Text("x".to_string()), &RawValue::Missing]);
        assert!(dataset.column("c").is_none());
    }

    #[test]
    fn test_file_format_from_extension() {
        assert_eq!(FileFormat::from_extension("CSV"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_extension("tab"), Some(FileFormat::Tsv));
        assert_eq!(FileFormat::from_extension("xlsx"), None);
    }
}
