//! reelshelf - Telegram media catalog bot
//!
//! Uploads with a structured caption are filed into a hierarchical catalog
//! (title → season → episode → quality). Users query the catalog with a
//! path-like string and either get the media directly or a menu of the
//! next level's options.
//!
//! # Architecture
//!
//! - The catalog is an in-memory copy-on-write tree, snapshotted to disk
//!   after every mutation
//! - Menu buttons carry the partial path in a signed token; every press is
//!   resolved again against the current catalog
//!
//! # Modules
//!
//! - `adapters`: Messaging transport (Telegram)
//! - `core`: Query resolution, callback tokens, update routing
//! - `domain`: Labels, paths and the catalog tree
//! - `ingest`: Caption parsing and the ingestion pipeline
//! - `library`: The shared catalog and its snapshot stores
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the bot
//! TELEGRAM_BOT_TOKEN=... reelshelf serve
//!
//! # Add a file by hand
//! reelshelf ingest --caption "angel next door | s01 | ep03 | 1080p" --file-id BAAC...
//!
//! # Resolve a query offline
//! reelshelf resolve angel_next_door_s01_ep03
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod library;

// Re-export main types at crate root for convenience
pub use core::{BotService, CallbackDispatcher, CallbackOutcome, QueryResolver, Resolution};
pub use domain::{CatalogPath, CatalogTree, EntryPath, MediaKind, MediaRef};
pub use ingest::{IngestEvent, IngestOutcome, IngestionPipeline};
pub use library::{Catalog, CatalogError, JsonFileStore, MemoryStore, SnapshotStore};

// Telegram integration
pub use adapters::{Messenger, TelegramClient};
