pub mod csv;

use std::path::Path;

use crate::types::{Dataset, DashboardOptions, FileFormat, Result};

/// Common trait for survey file readers
pub trait DataReader {
    /// Read the whole file into a dataset
    fn read(&mut self, options: &DashboardOptions) -> Result<Dataset>;
}

/// Detect the format of a file from its extension
pub fn detect_format(path: &Path) -> Result<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    FileFormat::from_extension(ext).ok_or_else(|| {
        crate::error::Error::UnsupportedFormat(format!(
            "Unsupported file extension: .{}",
            ext
        ))
    })
}

/// Create a reader for the given file path
pub fn create_reader(path: &Path) -> Result<Box<dyn DataReader>> {
    match detect_format(path)? {
        FileFormat::Csv => Ok(Box::new(csv::CsvReader::new(path))),
        FileFormat::Tsv => Ok(Box::new(csv::CsvReader::new_tsv(path))),
    }
}
