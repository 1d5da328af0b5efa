//! Key-value storage behind the JSON and image caches.
//!
//! [`FsStore`] keeps one file per key under a root directory. [`MemoryStore`]
//! is the in-memory stand-in used by tests; it carries its own clock so entry
//! ages can be set precisely.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use crate::error::Result;
use crate::models::CacheKey;

const TEMP_SUFFIX: &str = ".tmp";

pub trait Store {
    // None if the entry does not exist
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<()>;

    fn exists(&self, key: &CacheKey) -> bool;

    /// Remove an entry; removing a missing entry is not an error
    fn delete(&self, key: &CacheKey) -> Result<()>;

    /// Time since the entry was last modified
    fn age(&self, key: &CacheKey) -> Result<Option<Duration>>;

    fn keys(&self) -> Result<Vec<CacheKey>>;

    fn locate(&self, key: &CacheKey) -> PathBuf;
}

/// One file per key directly under `root`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Store for FsStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        match fs::read(self.locate(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<()> {
        // Write next to the target and rename so readers never see a partial file
        let path = self.locate(key);
        let temp = self.root.join(format!("{}{}", key.as_str(), TEMP_SUFFIX));
        let written = fs::write(&temp, value).and_then(|()| fs::rename(&temp, &path));
        if let Err(e) = written {
            // Never leave a temp file behind; keys() skips them
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }

    fn exists(&self, key: &CacheKey) -> bool {
        self.locate(key).is_file()
    }

    fn delete(&self, key: &CacheKey) -> Result<()> {
        match fs::remove_file(self.locate(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn age(&self, key: &CacheKey) -> Result<Option<Duration>> {
        let metadata = match fs::metadata(self.locate(key)) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified = metadata.modified()?;
        // A modification time in the future counts as brand new
        Ok(Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        ))
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.ends_with(TEMP_SUFFIX) {
                    keys.push(CacheKey::new(name));
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn locate(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    bytes: Vec<u8>,
    modified: SystemTime,
}

/// In-memory store with a manually advanced clock.
#[derive(Debug)]
pub struct MemoryStore {
    root: PathBuf,
    entries: Mutex<HashMap<CacheKey, MemoryEntry>>,
    now: Mutex<SystemTime>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_root("memory")
    }

    /// `root` only affects what [`Store::locate`] reports.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Mutex::new(HashMap::new()),
            now: Mutex::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
        }
    }

    /// Move the store's clock forward, ageing every entry.
    pub fn advance(&self, by: Duration) {
        let mut now = self.clock();
        *now += by;
    }

    /// Backdate an existing entry so that it is exactly `age` old.
    pub fn set_age(&self, key: &CacheKey, age: Duration) {
        let now = *self.clock();
        if let Some(entry) = self.entries().get_mut(key) {
            entry.modified = now - age;
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, MemoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clock(&self) -> MutexGuard<'_, SystemTime> {
        self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(self.entries().get(key).map(|entry| entry.bytes.clone()))
    }

    fn put(&self, key: &CacheKey, value: &[u8]) -> Result<()> {
        let modified = *self.clock();
        self.entries().insert(
            key.clone(),
            MemoryEntry {
                bytes: value.to_vec(),
                modified,
            },
        );
        Ok(())
    }

    fn exists(&self, key: &CacheKey) -> bool {
        self.entries().contains_key(key)
    }

    fn delete(&self, key: &CacheKey) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    fn age(&self, key: &CacheKey) -> Result<Option<Duration>> {
        let now = *self.clock();
        Ok(self.entries().get(key).map(|entry| {
            now.duration_since(entry.modified)
                .unwrap_or(Duration::ZERO)
        }))
    }

    fn keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self.entries().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn locate(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }
}
