use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::Repository;
use crate::utils::fs::atomic_write;

#[derive(Serialize, Deserialize)]
struct StoredEntry<K, V> {
    key: K,
    value: V,
}

/// Repository persisted as a single JSON document.
///
/// The file is read on first access and rewritten atomically on every save, so a
/// crash mid-write leaves the previous state intact. Entries are kept sorted by key
/// to keep the file stable across runs.
#[derive(Debug)]
pub struct JsonFileRepository<K, V> {
    path: PathBuf,
    state: Mutex<Option<BTreeMap<K, V>>>,
}

impl<K, V> JsonFileRepository<K, V>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> Result<BTreeMap<K, V>> {
        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Reading {}", path.display()));
            }
        };

        let entries: Vec<StoredEntry<K, V>> = serde_json::from_slice(&content)
            .with_context(|| format!("Parsing repository file {}", path.display()))?;

        Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
    }

    fn persist(&self, entries: &BTreeMap<K, V>) -> Result<()> {
        let stored: Vec<StoredEntry<&K, &V>> = entries
            .iter()
            .map(|(key, value)| StoredEntry { key, value })
            .collect();
        let content = serde_json::to_vec_pretty(&stored)?;
        atomic_write(&self.path, &content)
    }
}

impl<K, V> Repository<K, V> for JsonFileRepository<K, V>
where
    K: Ord + Clone + Serialize + DeserializeOwned + Send + Sync,
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn find<'a>(&'a self, key: &'a K) -> BoxFuture<'a, Result<Option<V>>> {
        async move {
            let mut state = self.state.lock().await;
            if state.is_none() {
                *state = Some(Self::load(&self.path).await?);
            }
            Ok(state.as_ref().and_then(|entries| entries.get(key).cloned()))
        }
        .boxed()
    }

    fn save<'a>(&'a self, key: K, value: V) -> BoxFuture<'a, Result<()>> {
        async move {
            let mut state = self.state.lock().await;
            let mut entries = match state.take() {
                Some(entries) => entries,
                None => Self::load(&self.path).await?,
            };
            entries.insert(key, value);

            // Keep the in-memory view in sync with disk even if the write fails.
            let result = self.persist(&entries);
            if result.is_err() {
                *state = None;
            } else {
                *state = Some(entries);
            }
            result.with_context(|| format!("Saving repository file {}", self.path.display()))
        }
        .boxed()
    }
}
