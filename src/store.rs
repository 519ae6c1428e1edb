use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::StoreError;
use crate::sync::FailedRecord;

pub const VERSION_FILE: &str = "since";
pub const FAILED_DIR: &str = "failed";
pub const FAILED_FILE: &str = "failed_readwise_items.json";

/// Persisted state between runs: the Zotero library watermark and the
/// dead-letter collection.
pub trait SyncStore {
    fn read_version(&self) -> Result<u64, StoreError>;
    fn write_version(&self, version: u64) -> Result<(), StoreError>;
    fn append_failed(&self, records: &[FailedRecord]) -> Result<(), StoreError>;
    fn failed_path(&self) -> PathBuf;
}

#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn version_path(&self) -> PathBuf {
        self.data_dir.join(VERSION_FILE)
    }

    fn read_failed(path: &Path) -> Result<Vec<Value>, StoreError> {
        match fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SyncStore for FileStore {
    fn read_version(&self) -> Result<u64, StoreError> {
        let contents = match fs::read_to_string(self.version_path()) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        trimmed
            .parse()
            .map_err(|_| StoreError::InvalidVersion(trimmed.to_string()))
    }

    fn write_version(&self, version: u64) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)?;
        fs::write(self.version_path(), version.to_string())?;
        Ok(())
    }

    fn append_failed(&self, records: &[FailedRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let path = self.failed_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut existing = Self::read_failed(&path)?;
        for record in records {
            existing.push(serde_json::to_value(record)?);
        }
        fs::write(&path, serde_json::to_string_pretty(&existing)?)?;
        Ok(())
    }

    fn failed_path(&self) -> PathBuf {
        self.data_dir.join(FAILED_DIR).join(FAILED_FILE)
    }
}
