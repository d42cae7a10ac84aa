//! Saved flows, kept as one JSON array under a single key of a
//! key/value store.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::Flow;

pub const SAVED_FLOWS_KEY: &str = "savedFlows";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("could not serialize flows: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// String key/value storage with local-storage semantics.
pub trait KeyValueStore: fmt::Debug {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;
}

/// One file per key inside a directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(path, value)?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }
}

/// Loads, saves and deletes flows by id.
#[derive(Debug)]
pub struct FlowRepository {
    store: Box<dyn KeyValueStore>,
}

impl FlowRepository {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(FileStore::new(dir))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    /// Every saved flow, normalized. Unreadable data counts as no data and
    /// unreadable entries are skipped; both are logged.
    pub fn load_all(&self) -> Vec<Flow> {
        let raw = match self.store.get_item(SAVED_FLOWS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "could not read saved flows");
                return Vec::new();
            }
        };

        let entries = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Array(entries)) => entries,
            Ok(_) => {
                warn!("saved flows are not an array, ignoring them");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "saved flows are not valid JSON, ignoring them");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value::<Flow>(entry) {
                Ok(mut flow) => {
                    flow.normalize();
                    Some(flow)
                }
                Err(e) => {
                    warn!(index, error = %e, "skipping unreadable saved flow");
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, flow_id: &str) -> Option<Flow> {
        self.load_all().into_iter().find(|f| f.flow_id == flow_id)
    }

    /// Inserts or replaces a flow by id, stamping its edit time.
    pub fn save(&mut self, flow: &mut Flow) -> Result<(), StorageError> {
        flow.touch();
        flow.calculate_total_duration();

        let mut flows = self.load_all();
        match flows.iter_mut().find(|f| f.flow_id == flow.flow_id) {
            Some(existing) => *existing = flow.clone(),
            None => flows.push(flow.clone()),
        }
        self.write_all(&flows)?;
        info!(flow = %flow.name, id = %flow.flow_id, "flow saved");
        Ok(())
    }

    /// Returns whether a flow with that id existed.
    pub fn delete(&mut self, flow_id: &str) -> Result<bool, StorageError> {
        let mut flows = self.load_all();
        let before = flows.len();
        flows.retain(|f| f.flow_id != flow_id);
        if flows.len() == before {
            return Ok(false);
        }
        self.write_all(&flows)?;
        info!(id = %flow_id, "flow deleted");
        Ok(true)
    }

    fn write_all(&mut self, flows: &[Flow]) -> Result<(), StorageError> {
        let json = serde_json::to_string(flows)?;
        self.store.set_item(SAVED_FLOWS_KEY, &json)?;
        debug!(count = flows.len(), bytes = json.len(), "saved flows written");
        Ok(())
    }
}
