//! Shared, persisted media catalog.
//!
//! Readers grab an immutable snapshot of the tree and never block each other.
//! Writers are serialized through a single write gate, mutate a private copy,
//! swap it in, then persist the full snapshot outside the pointer lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

use super::snapshot::{SnapshotStore, StoreError};
use crate::domain::{CatalogStats, CatalogTree, EntryPath, MediaRef, ShapeConflict, UpsertOutcome};

/// Errors from catalog mutations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The mutation was rejected and nothing changed
    #[error(transparent)]
    ShapeConflict(#[from] ShapeConflict),

    /// The mutation is live in memory but the snapshot write failed
    #[error("Stored {entry} in memory but the snapshot write failed: {source}")]
    Persistence {
        entry: EntryPath,
        outcome: UpsertOutcome,
        #[source]
        source: StoreError,
    },
}

/// In-memory catalog backed by a [`SnapshotStore`]
pub struct Catalog {
    tree: RwLock<Arc<CatalogTree>>,
    write_gate: Mutex<()>,
    store: Arc<dyn SnapshotStore>,
    durable: AtomicBool,
}

impl Catalog {
    /// Load the catalog from `store`, starting empty when nothing is saved
    pub async fn load(store: Arc<dyn SnapshotStore>) -> Result<Self, StoreError> {
        let tree = store.load().await?.unwrap_or_default();
        let stats = tree.stats();
        info!(
            store = %store.describe(),
            titles = stats.titles,
            leaves = stats.leaves,
            "Catalog loaded"
        );
        Ok(Self::with_tree(tree, store))
    }

    /// Wrap an existing tree without reading the store
    pub fn with_tree(tree: CatalogTree, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            tree: RwLock::new(Arc::new(tree)),
            write_gate: Mutex::new(()),
            store,
            durable: AtomicBool::new(true),
        }
    }

    /// Current immutable view of the tree
    pub fn snapshot(&self) -> Arc<CatalogTree> {
        match self.tree.read() {
            Ok(guard) => Arc::clone(&guard),
            // Only a pointer swap happens under the write lock, so the
            // stored Arc is always a complete tree.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn swap(&self, next: Arc<CatalogTree>) {
        match self.tree.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Store `media` at `entry` and persist the full snapshot.
    ///
    /// Every successful upsert is followed by a save, including ones that
    /// changed nothing, so a previously failed save gets another chance.
    pub async fn upsert(
        &self,
        entry: &EntryPath,
        media: MediaRef,
    ) -> Result<UpsertOutcome, CatalogError> {
        let _gate = self.write_gate.lock().await;

        let mut next = CatalogTree::clone(&self.snapshot());
        let outcome = next.upsert(entry, media)?;
        let next = Arc::new(next);
        self.swap(Arc::clone(&next));

        match self.store.save(&next).await {
            Ok(()) => {
                self.durable.store(true, Ordering::SeqCst);
                Ok(outcome)
            }
            Err(source) => {
                self.durable.store(false, Ordering::SeqCst);
                error!(
                    entry = %entry,
                    store = %self.store.describe(),
                    error = %source,
                    "Snapshot write failed; change is live in memory but unconfirmed until the next successful save"
                );
                Err(CatalogError::Persistence {
                    entry: entry.clone(),
                    outcome,
                    source,
                })
            }
        }
    }

    /// Re-save the current tree, e.g. after a failed write
    pub async fn flush(&self) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        let tree = self.snapshot();
        let result = self.store.save(&tree).await;
        self.durable.store(result.is_ok(), Ordering::SeqCst);
        result
    }

    /// False while an in-memory change has not reached the store
    pub fn is_durable(&self) -> bool {
        self.durable.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> CatalogStats {
        self.snapshot().stats()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("store", &self.store.describe())
            .field("stats", &self.stats())
            .field("durable", &self.is_durable())
            .finish()
    }
}
