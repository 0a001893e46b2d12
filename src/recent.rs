//! Bounded, de-duplicated history of opened files and directories.

use std::collections::HashMap;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use livefs::IoResultExt;
use serde::{Deserialize, Serialize};

/// Maximum number of entries kept in the history.
pub const RECENT_LIMIT: usize = 10;

const RECENT_KEY: &str = "recentEntries";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentEntry {
    pub path: PathBuf,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// Milliseconds since the Unix epoch.
    pub opened_at: u64,
}

/// Minimal string key-value persistence.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
}

impl KeyValueStore for Box<dyn KeyValueStore> {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        (**self).set(key, value)
    }
}

/// Stores each key as `<dir>/<key>.json`. Writes go through a temporary file
/// in the same directory and are renamed into place.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        fs_err::read_to_string(self.key_path(key)).with_not_found()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs_err::create_dir_all(&self.dir)?;

        let mut staging = tempfile::NamedTempFile::new_in(&self.dir)?;
        staging.write_all(value.as_bytes())?;
        staging
            .persist(self.key_path(key))
            .map_err(|err| err.error)?;

        Ok(())
    }
}

/// Keeps values in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

pub struct RecentStore<S> {
    store: S,
}

impl<S: KeyValueStore> RecentStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Stored entries, most recent first. Missing or unreadable history is
    /// reported as empty.
    pub fn list(&self) -> Vec<RecentEntry> {
        let raw = match self.store.get(RECENT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                log::debug!("Could not read recent entries: {}", err);
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|err| {
            log::debug!("Ignoring unreadable recent entries: {}", err);
            Vec::new()
        })
    }

    /// Moves `path` to the front of the history and persists the result.
    pub fn record(&mut self, path: &Path, name: &str, kind: EntryKind) -> io::Result<Vec<RecentEntry>> {
        let mut entries = self.list();
        entries.retain(|entry| entry.path != path);
        entries.insert(
            0,
            RecentEntry {
                path: path.to_path_buf(),
                name: name.to_owned(),
                kind,
                opened_at: now_millis(),
            },
        );
        entries.truncate(RECENT_LIMIT);

        self.save(&entries)?;
        Ok(entries)
    }

    pub fn clear(&mut self) -> io::Result<()> {
        self.save(&[])
    }

    fn save(&mut self, entries: &[RecentEntry]) -> io::Result<()> {
        let serialized = serde_json::to_string(entries).map_err(io::Error::other)?;
        self.store.set(RECENT_KEY, &serialized)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_millis() as u64)
        .unwrap_or(0)
}
