use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::task::{Priority, Task, TaskId};

pub const SESSION_KEY: &str = "taskflow_user";
pub const TASKS_KEY: &str = "taskflow_tasks";

/// String substrate addressed by fixed keys.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// One file per key inside a data directory.
#[derive(Debug)]
pub struct FileKvStore {
    pub data_dir: PathBuf,
}

impl FileKvStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened key-value store");
        Ok(Self { data_dir })
    }

    fn key_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(anyhow!("invalid storage key: {key:?}"));
        }
        Ok(self.data_dir.join(key))
    }
}

impl KeyValueStore for FileKvStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.key_path(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => {
                debug!(file = %path.display(), bytes = raw.len(), "read key");
                Ok(Some(raw))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed reading {}", path.display())),
        }
    }

    #[tracing::instrument(skip(self, value))]
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.key_path(key)?;
        debug!(file = %path.display(), bytes = value.len(), "writing key atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed removing {}", path.display())),
        }
    }
}

/// In-process store. `set_failing(true)` makes every call error, which lets
/// callers exercise the storage-unavailable paths.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    map: HashMap<String, String>,
    failing: bool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing = failing;
        }
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut MemoryInner) -> T) -> anyhow::Result<T> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        if inner.failing {
            return Err(anyhow!("storage unavailable"));
        }
        Ok(f(&mut inner))
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.with_inner(|inner| inner.map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.with_inner(|inner| {
            inner.map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.with_inner(|inner| {
            inner.map.remove(key);
        })
    }
}

/// On-disk task record. Older lists carry neither `id` nor `entry`.
#[derive(Debug, Deserialize)]
struct StoredTask {
    id: Option<TaskId>,
    text: String,
    priority: Priority,
    #[serde(default)]
    completed: bool,
    entry: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct LoadedTasks {
    pub tasks: Vec<Task>,
    pub backfilled: bool,
}

/// Typed access to the two application keys. Substrate failures are logged
/// and replaced with fallbacks; nothing here returns an error.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    #[tracing::instrument(skip(self))]
    pub fn get_session(&self) -> Option<String> {
        match self.backend.get(SESSION_KEY) {
            Ok(value) => value,
            Err(err) => {
                error!(
                    key = SESSION_KEY,
                    error = %format!("{err:#}"),
                    "error reading from storage"
                );
                None
            }
        }
    }

    pub fn get_tasks(&self) -> Vec<Task> {
        self.load_tasks().tasks
    }

    /// Reads the task list, assigning an id and entry time to records
    /// written without them. `backfilled` tells the caller to write the
    /// list back so those ids stay stable across loads.
    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> LoadedTasks {
        let raw = match self.backend.get(TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LoadedTasks::default(),
            Err(err) => {
                error!(
                    key = TASKS_KEY,
                    error = %format!("{err:#}"),
                    "error reading from storage"
                );
                return LoadedTasks::default();
            }
        };

        // `null` is what an emptied list used to be written as.
        let stored = match serde_json::from_str::<Option<Vec<StoredTask>>>(&raw) {
            Ok(stored) => stored.unwrap_or_default(),
            Err(err) => {
                error!(key = TASKS_KEY, error = %err, "failed parsing stored tasks");
                return LoadedTasks::default();
            }
        };

        let now = Utc::now();
        let mut backfilled = false;
        let tasks: Vec<Task> = stored
            .into_iter()
            .map(|record| {
                backfilled |= record.id.is_none() || record.entry.is_none();
                Task {
                    id: record.id.unwrap_or_default(),
                    text: record.text,
                    priority: record.priority,
                    completed: record.completed,
                    entry: record.entry.unwrap_or(now),
                }
            })
            .collect();

        debug!(count = tasks.len(), backfilled, "loaded tasks");
        LoadedTasks { tasks, backfilled }
    }

    #[tracing::instrument(skip(self, name))]
    pub fn set_session(&self, name: &str) {
        if let Err(err) = self.backend.set(SESSION_KEY, name) {
            error!(key = SESSION_KEY, error = %format!("{err:#}"), "error writing to storage");
        }
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn set_tasks(&self, tasks: &[Task]) {
        let serialized = match serde_json::to_string(tasks) {
            Ok(serialized) => serialized,
            Err(err) => {
                error!(key = TASKS_KEY, error = %err, "failed serializing tasks");
                return;
            }
        };
        if let Err(err) = self.backend.set(TASKS_KEY, &serialized) {
            error!(key = TASKS_KEY, error = %format!("{err:#}"), "error writing to storage");
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&self, key: &str) {
        if let Err(err) = self.backend.remove(key) {
            error!(key, error = %format!("{err:#}"), "error removing from storage");
        }
    }
}
