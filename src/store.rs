//! store.rs: feed-URL list and key-value settings.
//!
//! The scan core only ever sees a snapshot of URLs and a settings value; these
//! traits are the seam. `JsonFileStore` persists everything to one JSON file,
//! `MemoryStore` keeps it in memory (tests, dry runs).

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Settings key holding the chat id scan results are delivered to.
pub const OUT_CHAT_KEY: &str = "out_chat";

pub const SOURCE_KIND_RSS: &str = "rss";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub kind: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

pub trait SourceStore: Send + Sync {
    fn add_source(&self, url: &str) -> Result<Source>;
    /// Ascending id order.
    fn list_sources(&self) -> Result<Vec<Source>>;
    /// `false` when no source had that id.
    fn delete_source(&self, id: i64) -> Result<bool>;

    fn source_urls(&self) -> Result<Vec<String>> {
        Ok(self
            .list_sources()?
            .into_iter()
            .filter(|s| s.kind == SOURCE_KIND_RSS)
            .map(|s| s.url)
            .collect())
    }
}

pub trait SettingsStore: Send + Sync {
    fn get_setting(&self, key: &str) -> Result<Option<String>>;
    fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    last_id: i64,
    #[serde(default)]
    sources: Vec<Source>,
    #[serde(default)]
    settings: BTreeMap<String, String>,
}

impl StoreState {
    fn add(&mut self, url: &str) -> Source {
        // Ids are never reused, even after deletes.
        let max_seen = self.sources.iter().map(|s| s.id).max().unwrap_or(0);
        self.last_id = self.last_id.max(max_seen) + 1;
        let src = Source {
            id: self.last_id,
            kind: SOURCE_KIND_RSS.to_string(),
            url: url.to_string(),
            created_at: Utc::now(),
        };
        self.sources.push(src.clone());
        src
    }

    fn list(&self) -> Vec<Source> {
        let mut v = self.sources.clone();
        v.sort_by_key(|s| s.id);
        v
    }

    fn delete(&mut self, id: i64) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        self.sources.len() != before
    }
}

fn lock(m: &Mutex<StoreState>) -> Result<MutexGuard<'_, StoreState>> {
    m.lock().map_err(|_| anyhow!("store mutex poisoned"))
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SourceStore for MemoryStore {
    fn add_source(&self, url: &str) -> Result<Source> {
        Ok(lock(&self.state)?.add(url))
    }

    fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(lock(&self.state)?.list())
    }

    fn delete_source(&self, id: i64) -> Result<bool> {
        Ok(lock(&self.state)?.delete(id))
    }
}

impl SettingsStore for MemoryStore {
    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.state)?.settings.get(key).cloned())
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.state)?
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store persisted as a single JSON document. Every write rewrites the file
/// through a temp file + rename, so readers never see a torn document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => StoreState::default(),
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("parsing store {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading store {}", path.display()));
            }
        };
        tracing::debug!(path = %path.display(), sources = state.sources.len(), "store opened");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Apply `f` and persist; the in-memory state is only updated if the write succeeds.
    fn mutate<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> Result<T> {
        let mut guard = lock(&self.state)?;
        let mut next = guard.clone();
        let out = f(&mut next);
        persist(&self.path, &next)?;
        *guard = next;
        Ok(out)
    }
}

fn persist(path: &Path, state: &StoreState) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let body = serde_json::to_string_pretty(state).context("serializing store")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

impl SourceStore for JsonFileStore {
    fn add_source(&self, url: &str) -> Result<Source> {
        self.mutate(|s| s.add(url))
    }

    fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(lock(&self.state)?.list())
    }

    fn delete_source(&self, id: i64) -> Result<bool> {
        self.mutate(|s| s.delete(id))
    }
}

impl SettingsStore for JsonFileStore {
    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.state)?.settings.get(key).cloned())
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|s| {
            s.settings.insert(key.to_string(), value.to_string());
        })
    }
}
