use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    cursor::DEFAULT_MAX_KEY_SIZE,
    scheduler::{DEFAULT_THREAD_NAME_PREFIX, DEFAULT_WORKER_THREADS, SchedulerOptions},
    snapshot::Snapshot,
    util::{Result, Status},
};

#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Accepted for API compatibility; the store lives in memory.
    pub sync: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Read as of this snapshot instead of the latest state.
    pub snapshot: Option<Snapshot>,
}

impl ReadOptions {
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        ReadOptions {
            snapshot: Some(snapshot),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DBOptions {
    /// Active memtable size that triggers a rotation.
    pub write_buffer_size: usize,
    pub worker_threads: usize, // positioning task pool
    pub max_key_size: usize,
    pub thread_name_prefix: String,
}

impl Default for DBOptions {
    fn default() -> Self {
        DBOptions {
            write_buffer_size: 4 * 1024 * 1024, // 4MB
            worker_threads: DEFAULT_WORKER_THREADS,
            max_key_size: DEFAULT_MAX_KEY_SIZE, // 64KB
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl DBOptions {
    /// Parse options from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: DBOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.write_buffer_size == 0 {
            return Err(Status::invalid_argument("write_buffer_size must be positive"));
        }
        if self.worker_threads == 0 {
            return Err(Status::invalid_argument("worker_threads must be positive"));
        }
        if self.max_key_size == 0 {
            return Err(Status::invalid_argument("max_key_size must be positive"));
        }
        Ok(())
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            worker_threads: self.worker_threads,
            thread_name_prefix: self.thread_name_prefix.clone(),
        }
    }
}
