//! Media ingestion pipeline.
//!
//! Uploads arrive with a caption and an attached media reference:
//!
//! 1. **Caption**: parse the caption into a catalog entry
//! 2. **Pipeline**: gate on owner, upsert into the catalog, persist
//!
//! # Architecture
//!
//! ```text
//! upload → CaptionParser → IngestionPipeline → Catalog.upsert → snapshot
//! ```

pub mod caption;
pub mod pipeline;

// Re-export key types
pub use caption::{parse as parse_caption, ParseFailure};
pub use pipeline::{IgnoreReason, IngestEvent, IngestOutcome, IngestionPipeline};
