//! Durable snapshot storage for the catalog.
//!
//! The whole catalog is one document, loaded wholesale at startup and
//! overwritten wholesale after each mutation. No partial writes.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;

use crate::domain::CatalogTree;

/// Current snapshot document version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors from loading or saving a snapshot
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("Snapshot store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// On-disk document wrapping the tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Snapshot format version
    pub version: u32,

    /// When this snapshot was written
    pub saved_at: DateTime<Utc>,

    /// The catalog itself
    #[serde(flatten)]
    pub catalog: CatalogTree,
}

impl SnapshotDocument {
    pub fn new(catalog: CatalogTree) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            catalog,
        }
    }
}

/// Load/save contract for the durable catalog copy
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Human-readable description for logs
    fn describe(&self) -> String;

    /// Load the stored catalog, `None` when nothing has been saved yet
    async fn load(&self) -> Result<Option<CatalogTree>, StoreError>;

    /// Overwrite the stored catalog with `catalog`
    async fn save(&self, catalog: &CatalogTree) -> Result<(), StoreError>;
}

/// JSON file store.
///
/// Writes go to a temp file in the same directory which is then renamed over
/// the target, under an exclusive lock on a sidecar `.lock` file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "catalog.json".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }
}

/// Blocking half of the write: lock, write temp file, rename into place
fn write_atomically(path: &Path, lock_path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    use std::io::Write;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let lock = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .map_err(|e| StoreError::io(lock_path, e))?;
    lock.lock_exclusive()
        .map_err(|e| StoreError::io(lock_path, e))?;

    let result = (|| {
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        tmp.write_all(bytes).map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(path, e))?;
        tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
        Ok(())
    })();

    // Lock is also released when the handle drops
    let _ = FileExt::unlock(&lock);
    result
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }

    async fn load(&self) -> Result<Option<CatalogTree>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        let document: SnapshotDocument = serde_json::from_str(&content)?;

        if document.version != SNAPSHOT_VERSION {
            return Err(StoreError::Version {
                found: document.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        Ok(Some(document.catalog))
    }

    async fn save(&self, catalog: &CatalogTree) -> Result<(), StoreError> {
        let document = SnapshotDocument::new(catalog.clone());
        let bytes = serde_json::to_vec_pretty(&document)?;
        let digest = hex::encode(&Sha256::digest(&bytes)[..8]);

        let path = self.path.clone();
        let lock_path = self.lock_path();
        let size = bytes.len();
        tokio::task::spawn_blocking(move || write_atomically(&path, &lock_path, &bytes))
            .await
            .map_err(|e| StoreError::Unavailable(format!("snapshot writer panicked: {}", e)))??;

        tracing::debug!(path = %self.path.display(), size, %digest, "Snapshot written");
        Ok(())
    }
}

/// In-memory store, mostly for tests and dry runs.
///
/// `fail_saves(true)` makes every following save return
/// [`StoreError::Unavailable`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    saved: Option<CatalogTree>,
    saves: usize,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a snapshot
    pub fn with_snapshot(catalog: CatalogTree) -> Self {
        let store = Self::default();
        store.lock().saved = Some(catalog);
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-save; the data is
        // still a whole snapshot.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_saves(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Last successfully saved snapshot
    pub fn saved(&self) -> Option<CatalogTree> {
        self.lock().saved.clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> Result<Option<CatalogTree>, StoreError> {
        Ok(self.lock().saved.clone())
    }

    async fn save(&self, catalog: &CatalogTree) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.failing {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()));
        }
        state.saved = Some(catalog.clone());
        state.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CatalogKey, EntryPath, MediaRef, QualityLabel};
    use tempfile::TempDir;

    fn sample_tree() -> CatalogTree {
        let mut tree = CatalogTree::new();
        tree.upsert(
            &EntryPath::standalone(
                CatalogKey::normalize("your name").unwrap(),
                QualityLabel::parse("1080p").unwrap(),
            ),
            MediaRef::video("AAA"),
        )
        .unwrap();
        tree
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path().join("catalog.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path().join("nested").join("catalog.json"));

        let tree = sample_tree();
        store.save(&tree).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, tree);
        assert!(temp.path().join("nested").join("catalog.json.lock").exists());
    }

    #[tokio::test]
    async fn test_save_overwrites_wholesale() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp.path().join("catalog.json"));

        store.save(&sample_tree()).await.unwrap();
        store.save(&CatalogTree::new()).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_unknown_version() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.json");
        tokio::fs::write(&path, r#"{"version": 9, "saved_at": "2024-01-01T00:00:00Z", "titles": {}}"#)
            .await
            .unwrap();

        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Version { found: 9, .. }));
    }

    #[tokio::test]
    async fn test_memory_store_failure_toggle() {
        let store = MemoryStore::new();
        store.save(&sample_tree()).await.unwrap();
        assert_eq!(store.save_count(), 1);

        store.fail_saves(true);
        assert!(store.save(&CatalogTree::new()).await.is_err());
        assert_eq!(store.saved().unwrap(), sample_tree());
    }
}
