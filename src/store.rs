use crate::prelude::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// On-disk layout version; bump when the stored document changes incompatibly.
pub const STORAGE_VERSION: u32 = 1;

// PreservedCounters {{{
/// Last known values of the lifetime counters.
///
/// Only keys in [`FieldKey::PRESERVED`] are ever held here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreservedCounters {
    values: BTreeMap<FieldKey, f64>,
}

impl PreservedCounters {
    pub fn get(&self, key: FieldKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    /// Records `value` for `key` if it moves the counter forward.
    ///
    /// Zero, non-finite values, decreases and keys that aren't preserved
    /// counters are ignored. Returns true if the stored value changed.
    pub fn advance(&mut self, key: FieldKey, value: f64) -> bool {
        if !key.is_preserved() || !value.is_finite() || value == 0.0 {
            return false;
        }

        match self.values.get(&key) {
            Some(current) if value <= *current => false,
            _ => {
                self.values.insert(key, value);
                true
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &f64)> {
        self.values.iter()
    }

    // drops anything that isn't a preserved counter or is out of range,
    // used on data read back from disk
    fn sanitized(self) -> Self {
        let values = self
            .values
            .into_iter()
            .filter(|(k, v)| k.is_preserved() && v.is_finite() && *v > 0.0)
            .collect();
        Self { values }
    }
} // }}}

// CounterStore {{{
/// Durable home for the preserved counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Returns None when nothing (usable) has been stored yet.
    async fn load(&self) -> Result<Option<PreservedCounters>>;

    async fn save(&self, counters: &PreservedCounters) -> Result<()>;
} // }}}

#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    version: u32,
    #[serde(default)]
    data: PreservedCounters,
}

// JsonFileStore {{{
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl CounterStore for JsonFileStore {
    async fn load(&self) -> Result<Option<PreservedCounters>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no stored counters at {}, starting fresh", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(crate::file_error!("error reading {}: {}", self.path.display(), e))
            }
        };

        let document: StoredDocument = serde_json::from_str(&content)
            .map_err(|e| crate::file_error!("error parsing {}: {}", self.path.display(), e))?;

        if document.version != STORAGE_VERSION {
            warn!(
                "ignoring stored counters in {}: version {} (expected {})",
                self.path.display(),
                document.version,
                STORAGE_VERSION
            );
            return Ok(None);
        }

        Ok(Some(document.data.sanitized()))
    }

    async fn save(&self, counters: &PreservedCounters) -> Result<()> {
        let document = StoredDocument {
            version: STORAGE_VERSION,
            data: counters.clone(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // write then rename so a crash never leaves a half-written file
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("saved counters to {}", self.path.display());

        Ok(())
    }
} // }}}

// MemoryStore {{{
/// Keeps counters in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: Mutex<Option<PreservedCounters>>,
    saves: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_counters(counters: PreservedCounters) -> Self {
        Self {
            counters: Mutex::new(Some(counters)),
            saves: Mutex::new(0),
        }
    }

    pub fn saved(&self) -> Option<PreservedCounters> {
        self.counters.lock().ok().and_then(|c| c.clone())
    }

    pub fn save_count(&self) -> u64 {
        self.saves.lock().map(|s| *s).unwrap_or(0)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn load(&self) -> Result<Option<PreservedCounters>> {
        Ok(self.saved())
    }

    async fn save(&self, counters: &PreservedCounters) -> Result<()> {
        *self
            .counters
            .lock()
            .map_err(|_| anyhow!("Failed to lock counters"))? = Some(counters.clone());
        *self
            .saves
            .lock()
            .map_err(|_| anyhow!("Failed to lock save counter"))? += 1;
        Ok(())
    }
} // }}}
