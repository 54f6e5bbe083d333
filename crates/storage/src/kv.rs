use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use snafu::ResultExt;

use super::error::{
    CreateStateDirectorySnafu, ReadStateFileSnafu, RenameStateFileSnafu, SerializeStateSnafu,
    StorageResult, WriteStateFileSnafu,
};

/// Client-local string key-value persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Process-local store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: ArcSwap<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.load().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(key.to_string(), value.to_string());
            next
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(key);
            next
        });
        Ok(())
    }
}

/// Store backed by a single JSON object file.
///
/// Reads are served from memory; every write rewrites the whole file through a
/// temporary sibling and a rename.
pub struct JsonFileStore {
    path: PathBuf,
    entries: ArcSwap<BTreeMap<String, String>>,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens the store, treating a missing or unparseable file as empty.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let entries = Self::load_from_disk(&path)?;
        Ok(Self {
            path,
            entries: ArcSwap::from_pointee(entries),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> StorageResult<BTreeMap<String, String>> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "state file not found; starting empty");
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read(path).context(ReadStateFileSnafu {
            stage: "read-state-file",
            path: display_path(path),
        })?;

        match serde_json::from_slice::<BTreeMap<String, String>>(&content) {
            Ok(entries) => Ok(entries),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "state file is not a JSON string map; starting empty"
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn update<F>(&self, mutate: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = BTreeMap::clone(&self.entries.load());
        mutate(&mut next);
        self.persist(&next)?;
        self.entries.store(Arc::new(next));
        Ok(())
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateStateDirectorySnafu {
                stage: "create-state-directory",
                path: display_path(parent),
            })?;
        }

        let content = serde_json::to_string_pretty(entries).context(SerializeStateSnafu {
            stage: "serialize-state-json",
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteStateFileSnafu {
            stage: "write-temporary-state-file",
            path: display_path(&temp_path),
        })?;

        std::fs::rename(&temp_path, &self.path).context(RenameStateFileSnafu {
            stage: "rename-temporary-state-file",
            from: display_path(&temp_path),
            to: display_path(&self.path),
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.load().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        if !self.entries.load().contains_key(key) {
            return Ok(());
        }

        self.update(|entries| {
            entries.remove(key);
        })
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
