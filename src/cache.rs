use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::readers::{create_reader, detect_format};
use crate::types::{DashboardOptions, Dataset, FileFormat, Result};

/// Identity of a dataset file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetKey {
    path: PathBuf,
    modified: Option<SystemTime>,
    len: u64,
}

impl DatasetKey {
    pub fn for_path(path: &Path) -> Result<Self> {
        let path = std::fs::canonicalize(path)?;
        let metadata = std::fs::metadata(&path)?;
        Ok(Self {
            path,
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

/// A dataset together with where and when it was loaded
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub file_name: String,
    pub format: FileFormat,
    /// SHA-256 of the file contents
    pub file_hash: Option<String>,
    pub loaded_at: DateTime<Local>,
}

/// Read a dataset file without caching
pub fn load_dataset(path: &Path, options: &DashboardOptions) -> Result<LoadedDataset> {
    let format = detect_format(path)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let file_hash = if options.hash_file {
        Some(compute_file_hash(path)?)
    } else {
        None
    };

    let mut reader = create_reader(path)?;
    let dataset = reader.read(options)?;

    Ok(LoadedDataset {
        dataset,
        file_name,
        format,
        file_hash,
        loaded_at: Local::now(),
    })
}

/// Holds the most recently loaded dataset, reloading only when the file's identity changes
#[derive(Debug, Default)]
pub struct DatasetCache {
    entry: Option<(DatasetKey, Arc<LoadedDataset>)>,
    options: DashboardOptions,
}

impl DatasetCache {
    pub fn new(options: DashboardOptions) -> Self {
        Self {
            entry: None,
            options,
        }
    }

    /// Return the cached dataset for `path`, loading it if absent or if the file changed
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<LoadedDataset>> {
        let key = DatasetKey::for_path(path)?;
        if let Some((cached_key, loaded)) = &self.entry {
            if *cached_key == key {
                debug!(path = %path.display(), "dataset cache hit");
                return Ok(Arc::clone(loaded));
            }
        }
        self.load(path, key)
    }

    /// Load `path` unconditionally, replacing the cached entry
    pub fn reload(&mut self, path: &Path) -> Result<Arc<LoadedDataset>> {
        let key = DatasetKey::for_path(path)?;
        self.load(path, key)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    #[cfg(test)]
    pub fn is_cached(&self, path: &Path) -> bool {
        match (&self.entry, DatasetKey::for_path(path)) {
            (Some((cached_key, _)), Ok(key)) => *cached_key == key,
            _ => false,
        }
    }

    fn load(&mut self, path: &Path, key: DatasetKey) -> Result<Arc<LoadedDataset>> {
        info!(path = %path.display(), "loading dataset");
        let loaded = Arc::new(load_dataset(path, &self.options)?);
        self.entry = Some((key, Arc::clone(&loaded)));
        Ok(loaded)
    }
}

/// Compute SHA-256 hash of a file (streaming to handle large files)
fn compute_file_hash(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn survey_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_compute_file_hash() {
        let file = survey_file("test content");
        let hash = compute_file_hash(file.path()).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "6ae8a75555209fd6c44157c0aed8016e763ff435a19cf186f76863140143ff72"
        );
    }

    #[test]
    fn test_load_dataset() {
        let file = survey_file("Region:,Spend\nEU,$10\n");
        let loaded = load_dataset(file.path(), &DashboardOptions::default()).unwrap();

        assert_eq!(loaded.format, FileFormat::Csv);
        assert_eq!(loaded.dataset.len(), 1);
        assert!(loaded.file_hash.is_some());
        assert!(loaded.file_name.ends_with(".csv"));
    }

    #[test]
    fn test_load_without_hash() {
        let file = survey_file("Region:\nEU\n");
        let options = DashboardOptions {
            hash_file: false,
            ..DashboardOptions::default()
        };
        let loaded = load_dataset(file.path(), &options).unwrap();
        assert!(loaded.file_hash.is_none());
    }

    #[test]
    fn test_load_unsupported_extension() {
        let file = NamedTempFile::with_suffix(".xlsx").unwrap();
        assert!(load_dataset(file.path(), &DashboardOptions::default()).is_err());
    }

    #[test]
    fn test_cache_hit_returns_same_dataset() {
        let file = survey_file("Region:\nEU\n");
        let mut cache = DatasetCache::new(DashboardOptions::default());

        let first = cache.get_or_load(file.path()).unwrap();
        assert!(cache.is_cached(file.path()));
        let second = cache.get_or_load(file.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_reloads_when_file_changes() {
        let mut file = survey_file("Region:\nEU\n");
        let mut cache = DatasetCache::new(DashboardOptions::default());
        let first = cache.get_or_load(file.path()).unwrap();

        // a different length changes the key even if mtime resolution is coarse
        write!(file, "US\nAPAC\n").unwrap();
        file.flush().unwrap();

        let second = cache.get_or_load(file.path()).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.dataset.len(), 3);
    }

    #[test]
    fn test_explicit_reload_and_invalidate() {
        let file = survey_file("Region:\nEU\n");
        let mut cache = DatasetCache::new(DashboardOptions::default());
        let first = cache.get_or_load(file.path()).unwrap();

        let reloaded = cache.reload(file.path()).unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));

        cache.invalidate();
        assert!(!cache.is_cached(file.path()));
    }
}
