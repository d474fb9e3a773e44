//! The durable mirror of the metric registry.
//!
//! A `Snapshot` is an ordered list of `{key, description, value}` records kept in memory behind its
//! own lock. The registry keeps it in step with every mutation, and the server flushes it to a YAML
//! file periodically. On startup the file is loaded first and used to pre-populate the registry.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};

use crate::{
    errors::NexusError,
    metric::{is_valid_key, normalize_key},
};

/// Written out when no state file exists yet.
pub const STATE_TEMPLATE: &str = include_str!("state.yaml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    metrics: Vec<SnapshotRecord>,
}

#[derive(Debug, Default)]
pub struct Snapshot {
    records: Mutex<Vec<SnapshotRecord>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot::default()
    }

    pub fn from_records(records: Vec<SnapshotRecord>) -> Self {
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter_map(|mut record| {
                record.key = normalize_key(&record.key);
                if !is_valid_key(&record.key) || !seen.insert(record.key.clone()) {
                    log::warn!("snapshot: dropping invalid or duplicate record {:?}", record.key);
                    return None;
                }
                Some(record)
            })
            .collect();

        Self { records: Mutex::new(records) }
    }

    /// Loads the snapshot stored at `path`, writing the built-in template first if the file does
    /// not exist. Content that fails to parse is treated as an empty snapshot.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NexusError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("state file {} does not exist, creating it", path.display());
            fs::write(path, STATE_TEMPLATE).map_err(|e| {
                log::error!("failed to create state file {}: {}", path.display(), e);
                NexusError::ErrStateFileCreateFailed
            })?;
        }

        let data = fs::read_to_string(path)?;
        let document = match serde_yaml::from_str::<SnapshotDocument>(&data) {
            Ok(document) => document,
            Err(e) => {
                log::warn!("state file {} could not be parsed, starting empty: {}", path.display(), e);
                SnapshotDocument::default()
            }
        };

        log::debug!("loaded {} metric(s) from {}", document.metrics.len(), path.display());

        Ok(Snapshot::from_records(document.metrics))
    }

    /// Overwrites the value of the record with the given key. Returns false when there is no such
    /// record; a record is never created here.
    pub fn record_set(&self, key: &str, value: f64) -> Result<bool, NexusError> {
        let mut records = self.records.lock()?;
        match records.iter_mut().find(|r| r.key == key) {
            Some(record) => {
                record.value = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Appends a record unconditionally. Callers try `record_set` first.
    pub fn record_append(&self, key: &str, description: &str, value: f64) -> Result<(), NexusError> {
        let mut records = self.records.lock()?;
        records.push(SnapshotRecord { key: key.to_string(), description: description.to_string(), value });
        Ok(())
    }

    pub fn record_remove(&self, key: &str) -> Result<bool, NexusError> {
        let mut records = self.records.lock()?;
        let len = records.len();
        records.retain(|r| r.key != key);
        Ok(records.len() != len)
    }

    pub fn records(&self) -> Result<Vec<SnapshotRecord>, NexusError> {
        Ok(self.records.lock()?.clone())
    }

    pub fn len(&self) -> Result<usize, NexusError> {
        Ok(self.records.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, NexusError> {
        Ok(self.len()? == 0)
    }

    /// Serializes every record and replaces the file at `path`. The record lock is only held while
    /// the list is cloned; the document is written to a sibling file which is then renamed over
    /// `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), NexusError> {
        let path = path.as_ref();
        let document = SnapshotDocument { metrics: self.records()? };
        let data = serde_yaml::to_string(&document)?;

        let tmp_path = tmp_path_for(path);
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, path)?;

        log::debug!("saved {} metric(s) to {}", document.metrics.len(), path.display());
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    file_name.push(".tmp");
    path.with_file_name(file_name)
}
