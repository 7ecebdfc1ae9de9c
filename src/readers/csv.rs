use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, Reader, ReaderBuilder};
use tracing::{debug, info};

use crate::error::Error;
use crate::types::{
    DashboardOptions, Dataset, FileFormat, HeaderSet, RawValue, Record, Result,
};

use super::DataReader;

/// CSV/TSV survey export reader
pub struct CsvReader {
    path: PathBuf,
    delimiter: u8,
}

impl CsvReader {
    /// Create a new CSV reader
    pub fn new(path: &Path) -> Self {
        Self::with_format(path, FileFormat::Csv)
    }

    /// Create a new TSV reader
    pub fn new_tsv(path: &Path) -> Self {
        Self::with_format(path, FileFormat::Tsv)
    }

    fn with_format(path: &Path, format: FileFormat) -> Self {
        Self {
            path: path.to_path_buf(),
            delimiter: format.delimiter(),
        }
    }

    fn create_reader(&self) -> Result<Reader<BufReader<File>>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let csv_reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        Ok(csv_reader)
    }
}

/// Decode a field, replacing invalid UTF-8 instead of failing the load
fn decode(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

fn to_record(raw: &ByteRecord, width: usize) -> Record {
    let mut values: Vec<RawValue> = raw
        .iter()
        .take(width)
        .map(|field| RawValue::from_field(&decode(field)))
        .collect();
    values.resize(width, RawValue::Missing);
    Record::new(values)
}

impl DataReader for CsvReader {
    fn read(&mut self, options: &DashboardOptions) -> Result<Dataset> {
        let mut reader = self.create_reader()?;

        let names: Vec<String> = reader
            .byte_headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let mut name = decode(h);
                if i == 0 {
                    name = name.trim_start_matches('\u{feff}').to_string();
                }
                if options.strip_headers {
                    name = name.trim().to_string();
                }
                name
            })
            .collect();

        let headers = HeaderSet::new(names);
        if headers.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} has no header row",
                self.path.display()
            )));
        }
        let width = headers.len();
        debug!(columns = width, "read header row");

        let mut records: Vec<Record> = Vec::new();
        let mut raw = ByteRecord::new();
        while reader.read_byte_record(&mut raw)? {
            records.push(to_record(&raw, width));
        }

        info!(
            path = %self.path.display(),
            rows = records.len(),
            columns = width,
            "dataset loaded"
        );

        Ok(Dataset::new(headers, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(content: &[u8], suffix: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(suffix).unwrap();
        file.write_all(content).unwrap();
        file
    }

    #[test]
    fn test_basic_csv_read() {
        let file = create_test_file(b"Region:,Spend\nEU,$10\nUS,abc\n", ".csv");

        let mut reader = CsvReader::new(file.path());
        let dataset = reader.read(&DashboardOptions::default()).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.headers().len(), 2);
        assert!(dataset.headers().contains("Region:"));
    }

    #[test]
    fn test_headers_are_stripped() {
        let file = create_test_file(b"\xef\xbb\xbf Region: ,Spend  \nEU,1\n", ".csv");

        let mut reader = CsvReader::new(file.path());
        let dataset = reader.read(&DashboardOptions::default()).unwrap();
        let names: Vec<&str> = dataset.headers().iter().collect();
        assert_eq!(names, vec!["Region:", "Spend"]);
    }

    #[test]
    fn test_headers_kept_verbatim_when_not_stripping() {
        let file = create_test_file(b"Region: ,Spend\nEU,1\n", ".csv");

        let options = DashboardOptions {
            strip_headers: false,
            ..DashboardOptions::default()
        };
        let dataset = CsvReader::new(file.path()).read(&options).unwrap();
        assert!(dataset.headers().contains("Region: "));
    }

    #[test]
    fn test_quoted_headers_with_commas_and_smart_quotes() {
        let content = "\"\u{201c}I\u{2019}m concerned, honestly.\u{201d}\",Region:\n4,EU\n";
        let file = create_test_file(content.as_bytes(), ".csv");

        let dataset = CsvReader::new(file.path())
            .read(&DashboardOptions::default())
            .unwrap();
        assert!(dataset
            .headers()
            .contains("\u{201c}I\u{2019}m concerned, honestly.\u{201d}"));
    }

    #[test]
    fn test_ragged_rows_and_missing_tokens() {
        let file = create_test_file(b"a,b,c\n1,NA\n2,x,y,extra\n", ".csv");

        let dataset = CsvReader::new(file.path())
            .read(&DashboardOptions::default())
            .unwrap();

        let b: Vec<&RawValue> = dataset.column("b").unwrap().collect();
        assert_eq!(b, vec![&RawValue::Missing, &RawValue::Text("x".to_string())]);
        let c: Vec<&RawValue> = dataset.column("c").unwrap().collect();
        assert_eq!(c[0], &RawValue::Missing);
        let expected = Dataset::from_text_rows(
            &["a", "b", "c"],
            &[vec!["1", "NA"], vec!["2", "x", "y"]],
        );
        assert_eq!(dataset, expected);
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let file = create_test_file(b"", ".csv");

        let result = CsvReader::new(file.path()).read(&DashboardOptions::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let file = create_test_file(b"Region:\nEU\xff\n", ".csv");

        let dataset = CsvReader::new(file.path())
            .read(&DashboardOptions::default())
            .unwrap();
        let region = dataset.column("Region:").unwrap().next().unwrap();
        assert_eq!(region.as_text().unwrap(), "EU\u{fffd}");
    }

    #[test]
    fn test_tsv_read() {
        let file = create_test_file(b"Region:\tSpend\nEU\t$10, monthly\n", ".tsv");

        let dataset = CsvReader::new_tsv(file.path())
            .read(&DashboardOptions::default())
            .unwrap();
        let spend = dataset.column("Spend").unwrap().next().unwrap();
        assert_eq!(spend.as_text().unwrap(), "$10, monthly");
    }
}
