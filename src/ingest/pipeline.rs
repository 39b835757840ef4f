//! Ingestion of uploaded media into the catalog.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::caption::{self, ParseFailure};
use crate::domain::{EntryPath, MediaRef, UpsertOutcome};
use crate::library::{Catalog, CatalogError};

/// An inbound upload as seen by the core
#[derive(Debug, Clone, Default)]
pub struct IngestEvent {
    /// Identity of the uploader (user or channel id), if known
    pub sender: Option<i64>,

    /// Free-form caption text
    pub caption: Option<String>,

    /// Attached media, if any
    pub media: Option<MediaRef>,
}

impl IngestEvent {
    pub fn new(caption: impl Into<String>, media: MediaRef) -> Self {
        Self {
            sender: None,
            caption: Some(caption.into()),
            media: Some(media),
        }
    }

    pub fn from_sender(mut self, sender: i64) -> Self {
        self.sender = Some(sender);
        self
    }
}

/// Why an event was dropped without touching the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// An owner is configured and this sender is someone else
    NotOwner,
    MissingCaption,
    MissingMedia,
}

/// Result of ingesting one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored {
        entry: EntryPath,
        outcome: UpsertOutcome,
    },
    Ignored(IgnoreReason),
    Unparsed(ParseFailure),
}

/// Validates uploads, parses captions and upserts into the catalog
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    catalog: Arc<Catalog>,
    owner_id: Option<i64>,
}

impl IngestionPipeline {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            owner_id: None,
        }
    }

    /// Only accept uploads from `owner_id`
    pub fn with_owner(mut self, owner_id: Option<i64>) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub fn owner_id(&self) -> Option<i64> {
        self.owner_id
    }

    /// Ingest one event.
    ///
    /// Dropped and unparsable events are normal outcomes; only catalog
    /// mutations can fail.
    pub async fn ingest(&self, event: IngestEvent) -> Result<IngestOutcome, CatalogError> {
        if let Some(owner) = self.owner_id {
            if event.sender != Some(owner) {
                debug!(sender = ?event.sender, "Ignoring upload from non-owner");
                return Ok(IngestOutcome::Ignored(IgnoreReason::NotOwner));
            }
        }

        let Some(caption_text) = event.caption.as_deref() else {
            debug!("Ignoring upload without caption");
            return Ok(IngestOutcome::Ignored(IgnoreReason::MissingCaption));
        };

        let Some(media) = event.media else {
            debug!("Ignoring caption without media");
            return Ok(IngestOutcome::Ignored(IgnoreReason::MissingMedia));
        };

        let entry = match caption::parse(caption_text) {
            Ok(entry) => entry,
            Err(failure) => {
                warn!(caption = %caption_text, reason = %failure, "Caption not understood");
                return Ok(IngestOutcome::Unparsed(failure));
            }
        };

        let fingerprint = media.fingerprint();
        let kind = media.kind;
        match self.catalog.upsert(&entry, media).await {
            Ok(outcome) => {
                info!(
                    entry = %entry,
                    %kind,
                    media = %fingerprint,
                    ?outcome,
                    "Stored media"
                );
                Ok(IngestOutcome::Stored { entry, outcome })
            }
            Err(CatalogError::ShapeConflict(conflict)) => {
                warn!(entry = %entry, error = %conflict, "Rejected upload");
                Err(CatalogError::ShapeConflict(conflict))
            }
            Err(e) => Err(e),
        }
    }
}
