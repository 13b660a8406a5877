use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

pub const TASKS_KEY: &str = "tasks";
pub const FLASHCARDS_KEY: &str = "flashcards";
pub const MOODS_KEY: &str = "moods";
pub const STATS_KEY: &str = "pomodoroStats";
pub const USER_KEY: &str = "user";

/// Raw text storage underneath [`Store`].
///
/// Implementations report failures honestly; absorbing them is the job
/// of [`Store`].
pub trait Backend {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn write(&self, key: &str, text: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// One `<key>.json` file per key inside a data directory.
#[derive(Debug)]
pub struct FileBackend {
    data_dir: PathBuf,
}

impl FileBackend {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file store");
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !valid {
            return Err(anyhow!("invalid store key: {key:?}"));
        }
        Ok(self.data_dir.join(format!("{key}.json")))
    }
}

impl Backend for FileBackend {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(text))
    }

    fn write(&self, key: &str, text: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(text.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed removing {}", path.display()))?;
        }
        Ok(())
    }
}

/// In-process map. An optional byte quota makes writes fail the way a
/// full browser store does.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: RefCell::new(BTreeMap::new()),
            quota: Some(bytes),
        }
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl Backend for MemoryBackend {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, text: &str) -> anyhow::Result<()> {
        if let Some(quota) = self.quota {
            let needed = self.used_bytes_without(key) + key.len() + text.len();
            if needed > quota {
                return Err(anyhow!(
                    "storage quota exceeded: {needed} bytes needed, {quota} allowed"
                ));
            }
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), text.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Fail-soft JSON store shared by every manager.
///
/// `get` turns a missing key, unreadable data, or a backend failure into
/// `None`; `set` logs a failed write and returns normally. In-memory
/// state stays the source of truth for the session either way.
pub struct Store {
    backend: Box<dyn Backend>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    #[tracing::instrument(skip(self))]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "no stored value");
                return None;
            }
            Err(err) => {
                error!(key, error = %format!("{err:#}"), "store read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, bytes = raw.len(), "loaded stored value");
                Some(value)
            }
            Err(err) => {
                warn!(key, error = %err, "discarding unreadable stored value");
                None
            }
        }
    }

    /// Reads a stored array one element at a time. Elements that fail to
    /// decode are logged and skipped; the rest of the collection loads.
    #[tracing::instrument(skip(self))]
    pub fn get_records<T: DeserializeOwned>(&self, key: &str) -> Option<Vec<T>> {
        let raw: Vec<serde_json::Value> = self.get(key)?;
        let total = raw.len();
        let records: Vec<T> = raw
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(key, index, error = %err, "skipping unreadable stored record");
                    None
                }
            })
            .collect();

        if records.len() != total {
            warn!(key, kept = records.len(), total, "loaded a partial collection");
        }
        Some(records)
    }

    #[tracing::instrument(skip(self, value))]
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let text = match serde_json::to_string(value) {
            Ok(text) => text,
            Err(err) => {
                error!(key, error = %err, "failed to serialize value; nothing stored");
                return;
            }
        };

        if let Err(err) = self.backend.write(key, &text) {
            error!(
                key,
                error = %format!("{err:#}"),
                "store write failed; change kept in memory only"
            );
            return;
        }
        debug!(key, bytes = text.len(), "stored value");
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&self, key: &str) {
        if let Err(err) = self.backend.remove(key) {
            error!(key, error = %format!("{err:#}"), "store remove failed");
        }
    }
}
