//! Domain types for the media catalog.
//!
//! This module contains the core data structures:
//! - Labels: normalized title, season, episode and quality keys
//! - Media: opaque references to stored media
//! - Path: partial catalog paths used by queries and callback tokens
//! - Node: the catalog tree itself

pub mod labels;
pub mod media;
pub mod node;
pub mod path;

// Re-export commonly used types
pub use labels::{CatalogKey, EpisodeLabel, LabelError, QualityLabel, SeasonLabel};
pub use media::{MediaKind, MediaRef};
pub use node::{
    CatalogNode, CatalogStats, CatalogTree, EntryPath, EntrySlot, EpisodeMap, QualityMap,
    SeasonMap, Shape, ShapeConflict, TitleNode, UpsertOutcome,
};
pub use path::{CatalogPath, ChildKey};
