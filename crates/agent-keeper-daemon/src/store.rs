//! Generic file-backed key-value cache.
//!
//! The in-memory map is the source of truth for reads; the backing file is
//! a lagging mirror refreshed by a dedicated writer task. Mutations return
//! as soon as the map is updated, so a crash between a mutation and its
//! flush loses that one update. That trade-off is acceptable for caches;
//! state that must survive a crash belongs in [`crate::pid_repository`],
//! which awaits its writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use agent_keeper_common::mutex_lock_or_recover;

use crate::persist::write_atomic;

enum WriterMsg {
    Write(String),
    Sync(oneshot::Sender<()>),
}

/// File-backed cache of typed records, keyed by string.
///
/// Entries are persisted as a JSON array of `[key, value]` pairs. On load,
/// each value is decoded independently; values that no longer decode are
/// dropped instead of failing the whole store.
pub struct FileCacheStore<T> {
    entries: Mutex<BTreeMap<String, T>>,
    writer: mpsc::UnboundedSender<WriterMsg>,
    write_count: Arc<AtomicU64>,
}

impl<T> FileCacheStore<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    /// Open the store backed by `path`, loading whatever valid entries the
    /// file currently holds. Must be called from within a tokio runtime;
    /// the flush task lives for as long as the store does.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path).await;

        let write_count = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path, rx, Arc::clone(&write_count)));

        Self {
            entries: Mutex::new(entries),
            writer: tx,
            write_count,
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        mutex_lock_or_recover(&self.entries).get(key).cloned()
    }

    pub fn get_all(&self) -> BTreeMap<String, T> {
        mutex_lock_or_recover(&self.entries).clone()
    }

    /// Insert or overwrite `key`. The flush is skipped when the serialized
    /// form of the map is unchanged.
    pub fn set(&self, key: &str, value: T) {
        let payload = {
            let mut entries = mutex_lock_or_recover(&self.entries);
            let before = serialize_entries(&entries);
            entries.insert(key.to_string(), value);
            let after = serialize_entries(&entries);
            if before == after {
                debug!(key, "cache unchanged, skipping flush");
                return;
            }
            after
        };

        if let Some(payload) = payload {
            self.schedule_flush(payload);
        }
    }

    /// Remove `key` if present. Removing an absent key is a no-op and does
    /// not touch the disk.
    pub fn invalidate(&self, key: &str) {
        let payload = {
            let mut entries = mutex_lock_or_recover(&self.entries);
            if entries.remove(key).is_none() {
                return;
            }
            serialize_entries(&entries)
        };

        if let Some(payload) = payload {
            self.schedule_flush(payload);
        }
    }

    /// Number of snapshots actually written to disk. Exposed so tests can
    /// observe that no-op mutations skip the flush.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Wait until every flush scheduled so far has hit the disk.
    pub async fn sync(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writer.send(WriterMsg::Sync(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn schedule_flush(&self, payload: String) {
        if self.writer.send(WriterMsg::Write(payload)).is_err() {
            warn!("cache writer task gone, dropping flush");
        }
    }
}

fn serialize_entries<T: Serialize>(entries: &BTreeMap<String, T>) -> Option<String> {
    let pairs: Vec<(&String, &T)> = entries.iter().collect();
    match serde_json::to_string(&pairs) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(error = %err, "Failed to serialize cache entries");
            None
        }
    }
}

async fn load_entries<T: DeserializeOwned>(path: &Path) -> BTreeMap<String, T> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(_) => return BTreeMap::new(),
    };

    let raw: Vec<(String, serde_json::Value)> = match serde_json::from_str(&content) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "Cache file unparsable, starting empty"
            );
            return BTreeMap::new();
        }
    };

    let mut entries = BTreeMap::new();
    for (key, value) in raw {
        match serde_json::from_value(value) {
            Ok(value) => {
                entries.insert(key, value);
            }
            Err(err) => {
                warn!(key, error = %err, "Dropping invalid cache entry");
            }
        }
    }
    entries
}

async fn run_writer(
    path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<WriterMsg>,
    write_count: Arc<AtomicU64>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WriterMsg::Write(payload) => match write_atomic(&path, &payload).await {
                Ok(()) => {
                    write_count.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Cache flush failed");
                }
            },
            WriterMsg::Sync(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
