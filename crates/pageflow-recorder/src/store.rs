//! Flow storage seam.
//!
//! Storage is an external collaborator; the coordinator only requires `save`.
//! Two implementations are provided: an in-memory store for hosts and tests,
//! and a JSON-file-per-flow store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use pageflow::{Flow, RecorderError, Result};

pub trait FlowStore: Send + Sync {
    fn save(&self, flow: &Flow) -> Result<()>;
}

/// Keeps flows in memory, keyed by id.
#[derive(Default)]
pub struct MemoryFlowStore {
    flows: Mutex<HashMap<String, Flow>>,
}

impl MemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Flow> {
        self.flows.lock().unwrap().get(id).cloned()
    }

    pub fn list(&self) -> Vec<Flow> {
        self.flows.lock().unwrap().values().cloned().collect()
    }

    pub fn delete(&self, id: &str) -> bool {
        self.flows.lock().unwrap().remove(id).is_some()
    }
}

impl FlowStore for MemoryFlowStore {
    fn save(&self, flow: &Flow) -> Result<()> {
        self.flows
            .lock()
            .unwrap()
            .insert(flow.id.clone(), flow.clone());
        Ok(())
    }
}

/// Writes each flow as `<id>.json` under a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| RecorderError::Storage(e.to_string()))?;
        Ok(JsonFileStore { dir })
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn get(&self, id: &str) -> Result<Flow> {
        Flow::load_from_file(self.path_for(id))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        std::fs::remove_file(self.path_for(id)).map_err(|e| RecorderError::Storage(e.to_string()))
    }

    pub fn list(&self) -> Result<Vec<Flow>> {
        let mut flows = Vec::new();
        let entries =
            std::fs::read_dir(&self.dir).map_err(|e| RecorderError::Storage(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| RecorderError::Storage(e.to_string()))?;
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                flows.push(Flow::load_from_file(entry.path())?);
            }
        }
        Ok(flows)
    }
}

impl FlowStore for JsonFileStore {
    fn save(&self, flow: &Flow) -> Result<()> {
        flow.save_to_file(self.path_for(&flow.id))
    }
}
