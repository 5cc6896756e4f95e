//! Job state store.
//!
//! One JSON document maps every job name to its latest [`JobState`]. Each save
//! upserts in memory and rewrites the whole document.

use crate::models::JobState;
use crate::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub struct JobStateStore {
    path: PathBuf,
    states: Mutex<BTreeMap<String, JobState>>,
}

impl JobStateStore {
    /// Open the store at `path`. A missing, empty or unparsable document is
    /// replaced by an empty one.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let states = match load(&path) {
            Some(states) => states,
            None => {
                let empty = BTreeMap::new();
                write_document(&path, &empty)?;
                empty
            }
        };

        Ok(Self {
            path,
            states: Mutex::new(states),
        })
    }

    /// Upsert `state` by job name and persist the whole map.
    pub fn save(&self, state: JobState) -> Result<()> {
        let mut states = self.states.lock().unwrap_or_else(|p| p.into_inner());
        states.insert(state.job_name.clone(), state);
        write_document(&self.path, &states)
    }

    pub fn get(&self, name: &str) -> Option<JobState> {
        let states = self.states.lock().unwrap_or_else(|p| p.into_inner());
        states.get(name).cloned()
    }

    pub fn all(&self) -> Vec<JobState> {
        let states = self.states.lock().unwrap_or_else(|p| p.into_inner());
        states.values().cloned().collect()
    }
}

fn load(path: &Path) -> Option<BTreeMap<String, JobState>> {
    let content = std::fs::read_to_string(path).ok()?;
    if content.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(&content) {
        Ok(states) => Some(states),
        Err(e) => {
            warn!("State file {} is corrupt, resetting: {}", path.display(), e);
            None
        }
    }
}

fn write_document(path: &Path, states: &BTreeMap<String, JobState>) -> Result<()> {
    let json = serde_json::to_string_pretty(states)?;
    std::fs::write(path, json)?;
    Ok(())
}
