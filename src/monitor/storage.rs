//! Metrics Storage Module
//!
//! Persists scalar records in memory or as a JSON file.

use super::MetricRecord;
use std::path::Path;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<StorageError> for crate::Error {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(io) => crate::Error::Io(io),
            StorageError::Serialization(msg) => crate::Error::Serialization(msg),
        }
    }
}

/// Metrics storage backend trait
pub trait MetricsStore: Send + Sync {
    /// Write a batch of metric records
    fn write_batch(&mut self, records: &[MetricRecord]) -> StorageResult<()>;

    /// Flush pending writes
    fn flush(&mut self) -> StorageResult<()>;
}

/// In-memory metrics store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Vec<MetricRecord>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Get all records
    pub fn all_records(&self) -> &[MetricRecord] {
        &self.records
    }
}

impl MetricsStore for InMemoryStore {
    fn write_batch(&mut self, records: &[MetricRecord]) -> StorageResult<()> {
        self.records.extend(records.iter().cloned());
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

/// JSON file-based metrics store
pub struct JsonFileStore {
    path: std::path::PathBuf,
    records: Vec<MetricRecord>,
    dirty: bool,
}

impl JsonFileStore {
    /// Create or open a JSON file store, creating parent directories
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let records = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|e| StorageError::Serialization(e.to_string()))?
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            records,
            dirty: false,
        })
    }
}

impl MetricsStore for JsonFileStore {
    fn write_batch(&mut self, records: &[MetricRecord]) -> StorageResult<()> {
        self.records.extend(records.iter().cloned());
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.dirty {
            let json = serde_json::to_string_pretty(&self.records)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            std::fs::write(&self.path, json)?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl Drop for JsonFileStore {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::Metric;
    use tempfile::TempDir;

    fn read_back(path: &Path) -> Vec<MetricRecord> {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn record(metric: Metric, value: f64, step: u64) -> MetricRecord {
        MetricRecord::new(metric, value, step)
    }

    #[test]
    fn test_in_memory_write_batch() {
        let mut store = InMemoryStore::new();
        store
            .write_batch(&[record(Metric::L1Loss, 0.5, 1), record(Metric::TotalLoss, 0.7, 1)])
            .unwrap();
        assert_eq!(store.all_records().len(), 2);
    }

    #[test]
    fn test_json_file_store_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log/run/scalars.json");
        let mut store = JsonFileStore::open(&path).unwrap();
        store.write_batch(&[record(Metric::L1Loss, 0.1, 1)]).unwrap();
        store.flush().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_json_file_store_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scalars.json");

        {
            let mut store = JsonFileStore::open(&path).unwrap();
            store
                .write_batch(&[
                    record(Metric::TotalLoss, 1.5, 1),
                    record(Metric::Custom("Train/extra".into()), 2.0, 1),
                ])
                .unwrap();
            // flushed on drop
        }

        // reopening keeps earlier records ahead of new ones
        {
            let mut store = JsonFileStore::open(&path).unwrap();
            store.write_batch(&[record(Metric::TotalLoss, 1.2, 2)]).unwrap();
        }

        let records = read_back(&path);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].step, 2);
        assert_eq!(records[1].metric, Metric::Custom("Train/extra".into()));
        assert_eq!(records[1].value, 2.0);
    }

    #[test]
    fn test_json_file_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scalars.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StorageError::Serialization(_))
        ));
    }
}
