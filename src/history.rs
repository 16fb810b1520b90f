//! Calculation history.
//!
//! A [`HistoryStore`] persists [`HistoryEntry`] records. The
//! [`HistoryRecorder`] sits between the calculator and a store: it issues
//! `create`/`list` calls on detached tasks, keeps the most recent page cached,
//! and logs failures instead of returning them. Calculator state never depends
//! on whether a store call succeeded.

use crate::calculator::Calculation;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Number of entries shown in the recent-history list
pub const HISTORY_PAGE_SIZE: usize = 10;

const HISTORY_FILE: &str = "history.json";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("history data is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("history archive is malformed: {0}")]
    Archive(#[from] bincode::Error),
}

/// One completed calculation as kept by a store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub expression: String,
    #[serde(with = "result_repr")]
    pub result: f64,
    /// ISO-8601, UTC, millisecond precision
    pub timestamp: String,
}

impl HistoryEntry {
    pub fn new(expression: impl Into<String>, result: f64, timestamp: impl Into<String>) -> Self {
        HistoryEntry {
            expression: expression.into(),
            result,
            timestamp: timestamp.into(),
        }
    }

    /// Stamp a calculation with the current time.
    pub fn from_calculation(calculation: &Calculation) -> Self {
        HistoryEntry::new(
            calculation.expression.clone(),
            calculation.result,
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }
}

/// JSON numbers can't hold infinities or NaN, so those travel as strings.
mod result_repr {
    use crate::number::{format_number, parse_display};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() || !serializer.is_human_readable() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&format_number(*value))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        if !deserializer.is_human_readable() {
            return f64::deserialize(deserializer);
        }
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(text) => Ok(parse_display(&text)),
        }
    }
}

/// Persistence backend for history entries.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist one entry.
    async fn create(&self, entry: HistoryEntry) -> Result<(), HistoryError>;

    /// Up to `limit` entries, most recent first.
    async fn list(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError>;

    /// Every entry, oldest first.
    async fn all(&self) -> Result<Vec<HistoryEntry>, HistoryError>;
}

/// In-process store. Used by the terminal front end when no user is given.
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn create(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    async fn all(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        Ok(self.entries.read().await.clone())
    }
}

/// Per-user JSON file under the database directory.
///
/// The file holds every entry oldest first. `create` rewrites the whole file
/// under the write half of `file_lock`; reads take the read half so they never
/// see a truncated file.
pub struct FileHistoryStore {
    path: PathBuf,
    file_lock: RwLock<()>,
}

impl FileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileHistoryStore {
            path: path.into(),
            file_lock: RwLock::new(()),
        }
    }

    /// Store at `<database>/<username>/history.json`.
    pub fn for_user(database_dir: &Path, username: &str) -> Self {
        Self::new(database_dir.join(username).join(HISTORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) if data.trim().is_empty() => Ok(Vec::new()),
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn create(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        let _guard = self.file_lock.write().await;

        let mut entries = self.read_entries().await?;
        entries.push(entry);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    async fn list(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let _guard = self.file_lock.read().await;
        let entries = self.read_entries().await?;
        Ok(entries.into_iter().rev().take(limit).collect())
    }

    async fn all(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let _guard = self.file_lock.read().await;
        self.read_entries().await
    }
}

/// Fire-and-forget bridge between the calculator and a [`HistoryStore`].
///
/// Cloning is cheap; clones share the store and the cached recent list.
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
    recent: Arc<RwLock<Vec<HistoryEntry>>>,
    /// Held across list-and-assign so reloads can't land out of order
    reload_lock: Arc<Mutex<()>>,
    page_size: usize,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self::with_page_size(store, HISTORY_PAGE_SIZE)
    }

    pub fn with_page_size(store: Arc<dyn HistoryStore>, page_size: usize) -> Self {
        HistoryRecorder {
            store,
            recent: Arc::new(RwLock::new(Vec::new())),
            reload_lock: Arc::new(Mutex::new(())),
            page_size,
        }
    }

    pub fn store(&self) -> Arc<dyn HistoryStore> {
        Arc::clone(&self.store)
    }

    /// Cached recent list, most recent first.
    pub async fn recent(&self) -> Vec<HistoryEntry> {
        self.recent.read().await.clone()
    }

    /// Reload the recent list on a detached task.
    pub fn refresh(&self) -> JoinHandle<()> {
        let recorder = self.clone();
        tokio::spawn(async move {
            recorder.reload().await;
        })
    }

    /// Persist a completed calculation on a detached task, then reload the
    /// recent list if the store accepted it.
    ///
    /// The timestamp is taken now, not when the task runs.
    pub fn record(&self, calculation: &Calculation) -> JoinHandle<()> {
        let entry = HistoryEntry::from_calculation(calculation);
        let recorder = self.clone();
        tokio::spawn(async move {
            let expression = entry.expression.clone();
            match recorder.store.create(entry).await {
                Ok(()) => {
                    log::debug!("recorded calculation {}", expression);
                    recorder.reload().await;
                }
                Err(e) => log::warn!("failed to record calculation {}: {}", expression, e),
            }
        })
    }

    async fn reload(&self) {
        let _guard = self.reload_lock.lock().await;
        match self.store.list(self.page_size).await {
            Ok(entries) => *self.recent.write().await = entries,
            Err(e) => log::warn!("failed to load calculation history: {}", e),
        }
    }
}
