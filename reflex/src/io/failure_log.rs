//! Append-only CSV log of failed verification attempts.
//!
//! Format: header `timestamp,task,attempt,error_output`, one row per failed
//! attempt. Rows are only ever appended; the meta step reads them back to find
//! the dominant error.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::tally::most_frequent;

/// One logged verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Local time, ISO-8601 with microseconds.
    pub timestamp: String,
    pub task: String,
    /// 0 for the baseline check, then 1..=max_retries.
    pub attempt: u32,
    pub error_output: String,
}

/// Handle to the failure log file.
#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Append one record, creating the file with its header first if needed.
    #[instrument(skip_all, fields(attempt))]
    pub fn append(&self, task: &str, attempt: u32, error_output: &str) -> Result<()> {
        let record = FailureRecord {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            task: task.to_string(),
            attempt,
            error_output: error_output.to_string(),
        };

        // An empty file has no header yet either.
        let needs_header = fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create log dir {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer
            .serialize(&record)
            .with_context(|| format!("append record to {}", self.path.display()))?;
        writer
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        debug!(needs_header, "failure recorded");
        Ok(())
    }

    /// Read every record in insertion order. A missing file has no records.
    pub fn records(&self) -> Result<Vec<FailureRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            let record: FailureRecord =
                row.with_context(|| format!("parse {}", self.path.display()))?;
            records.push(record);
        }
        Ok(records)
    }

    /// True when the log holds at least one data row (not just a header).
    ///
    /// Unreadable or missing files count as empty.
    pub fn has_records(&self) -> bool {
        let Ok(mut reader) = csv::Reader::from_path(&self.path) else {
            return false;
        };
        matches!(reader.records().next(), Some(Ok(_)))
    }

    /// The most frequent error text; `None` when there is nothing to analyse.
    pub fn most_common_error(&self) -> Result<Option<String>> {
        most_common_error(&self.path)
    }

    /// Delete the log so the next `append` starts a fresh file.
    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// Group records by exact error text and return the largest group's text.
///
/// Ties go to the error seen first. Returns `Ok(None)` when the log is absent
/// or has no data rows.
pub fn most_common_error(log_path: &Path) -> Result<Option<String>> {
    let records = FailureLog::new(log_path).records()?;
    Ok(most_frequent(records.iter().map(|r| r.error_output.as_str())).map(str::to_string))
}
