//! Catalog storage.
//!
//! The catalog lives in memory and is persisted as a single snapshot
//! document after every mutation.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.reelshelf/
//! ├── catalog.json              # Full catalog snapshot
//! └── catalog.json.lock         # Advisory lock held while writing
//! ```

pub mod catalog;
pub mod legacy;
pub mod snapshot;

pub use catalog::{Catalog, CatalogError};
pub use legacy::{parse_legacy, LegacyImport, SkippedEntry};
pub use snapshot::{JsonFileStore, MemoryStore, SnapshotDocument, SnapshotStore, StoreError};
