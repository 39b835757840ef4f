//! Command-line interface for reelshelf.
//!
//! Provides commands for running the bot, adding media by hand, resolving
//! queries offline, browsing the catalog and importing legacy data.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapters::TelegramClient;
use crate::config;
use crate::core::{BotService, QueryResolver, Resolution};
use crate::domain::{CatalogKey, MediaKind, MediaRef, TitleNode, UpsertOutcome};
use crate::ingest::{IngestEvent, IngestOutcome, IngestionPipeline};
use crate::library::{parse_legacy, Catalog, CatalogError, JsonFileStore, SnapshotStore};

/// reelshelf - Telegram media catalog bot
#[derive(Parser, Debug)]
#[command(name = "reelshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Catalog snapshot file (overrides config)
    #[arg(long, global = true, env = "REELSHELF_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bot (long polling)
    Serve,

    /// Add one media item as if it had been uploaded
    Ingest {
        /// Caption text, e.g. "angel next door | s01 | ep03 | 1080p"
        #[arg(short, long)]
        caption: String,

        /// Telegram file id
        #[arg(short, long)]
        file_id: String,

        /// Media kind
        #[arg(short, long, value_enum, default_value = "video")]
        kind: KindArg,

        /// Uploader id (checked against the configured owner)
        #[arg(long)]
        sender: Option<i64>,
    },

    /// Resolve a query against the catalog
    Resolve {
        /// Query, e.g. "angel_next_door_s01_ep03"
        query: String,
    },

    /// List titles, or the tree under one title
    List {
        title: Option<String>,
    },

    /// Import a legacy series document
    ImportLegacy {
        /// JSON file to import
        file: PathBuf,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Media kind for CLI (maps to MediaKind)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Video,
    Document,
}

impl From<KindArg> for MediaKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Video => MediaKind::Video,
            KindArg::Document => MediaKind::Document,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let snapshot = self.snapshot;
        match self.command {
            Commands::Serve => serve(snapshot).await,
            Commands::Ingest {
                caption,
                file_id,
                kind,
                sender,
            } => ingest(snapshot, caption, MediaRef::new(kind.into(), file_id), sender).await,
            Commands::Resolve { query } => resolve(snapshot, &query).await,
            Commands::List { title } => list(snapshot, title.as_deref()).await,
            Commands::ImportLegacy { file } => import_legacy(snapshot, &file).await,
            Commands::Config => show_config(),
        }
    }
}

fn snapshot_path(overridden: Option<PathBuf>) -> Result<PathBuf> {
    match overridden {
        Some(path) => Ok(path),
        None => config::snapshot_path(),
    }
}

/// Load the catalog from the configured snapshot
async fn open_catalog(snapshot: Option<PathBuf>) -> Result<Arc<Catalog>> {
    let path = snapshot_path(snapshot)?;
    let store: Arc<dyn SnapshotStore> = Arc::new(JsonFileStore::new(path));
    let catalog = Catalog::load(store.clone())
        .await
        .with_context(|| format!("Failed to load catalog from {}", store.describe()))?;
    Ok(Arc::new(catalog))
}

/// Run the bot until interrupted
async fn serve(snapshot: Option<PathBuf>) -> Result<()> {
    let cfg = config::config()?;
    let token = cfg.require_bot_token()?;
    let catalog = open_catalog(snapshot).await?;

    let stats = catalog.stats();
    eprintln!("📚 Catalog: {} titles, {} files", stats.titles, stats.leaves);
    match cfg.owner_id {
        Some(owner) => eprintln!("🔒 Uploads accepted from {} only", owner),
        None => eprintln!("🔓 Uploads accepted from anyone (set REELSHELF_OWNER_ID to restrict)"),
    }
    eprintln!(
        "⚠️  If a snapshot write fails, the change stays live in memory but is \
         unconfirmed until a later write succeeds. Watch the log for errors."
    );

    let client = Arc::new(TelegramClient::new(token.to_string()));
    let service = BotService::new(catalog, client.clone())
        .with_owner(cfg.owner_id)
        .with_footer(cfg.footer.clone());

    tokio::select! {
        result = Arc::new(service).run_polling(client, cfg.poll_timeout_seconds) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nShutting down");
            Ok(())
        }
    }
}

async fn ingest(
    snapshot: Option<PathBuf>,
    caption: String,
    media: MediaRef,
    sender: Option<i64>,
) -> Result<()> {
    let catalog = open_catalog(snapshot).await?;
    let owner = config::config()?.owner_id;
    let pipeline = IngestionPipeline::new(catalog).with_owner(owner);

    let event = IngestEvent {
        sender,
        caption: Some(caption),
        media: Some(media),
    };

    match pipeline.ingest(event).await? {
        IngestOutcome::Stored { entry, outcome } => {
            let verb = match outcome {
                UpsertOutcome::Created => "Added",
                UpsertOutcome::Replaced => "Replaced",
                UpsertOutcome::Unchanged => "Unchanged",
            };
            eprintln!("✅ {}: {}", verb, entry);
        }
        IngestOutcome::Ignored(reason) => eprintln!("Ignored: {:?}", reason),
        IngestOutcome::Unparsed(failure) => anyhow::bail!("Caption not understood: {}", failure),
    }

    Ok(())
}

async fn resolve(snapshot: Option<PathBuf>, query: &str) -> Result<()> {
    let catalog = open_catalog(snapshot).await?;
    let resolver = QueryResolver::new(catalog);

    match resolver.resolve(query) {
        Resolution::Single { path, media } => {
            println!("{}\t{}\t{}", path, media.kind, media.file_id);
        }
        Resolution::Batch { path, items } => {
            for (episode, media) in items {
                println!("{}\t{}\t{}", path.clone().with_episode(episode), media.kind, media.file_id);
            }
        }
        Resolution::Disambiguate(menu) => {
            println!("{} needs a choice:", menu.path);
            for label in menu.labels() {
                println!("  {}", label);
            }
        }
        Resolution::NotFound => {
            println!("Not found: {}", query);
        }
    }

    Ok(())
}

async fn list(snapshot: Option<PathBuf>, title: Option<&str>) -> Result<()> {
    let catalog = open_catalog(snapshot).await?;
    let tree = catalog.snapshot();

    let Some(title) = title else {
        if tree.is_empty() {
            println!("Catalog is empty. Upload media with a caption or use 'reelshelf ingest'.");
            return Ok(());
        }

        println!("{:<40} {:<12} {:>6}", "TITLE", "SHAPE", "FILES");
        println!("{}", "-".repeat(60));
        for (key, node) in tree.titles() {
            println!("{:<40} {:<12} {:>6}", key, node.shape(), node.leaf_count());
        }
        let stats = tree.stats();
        println!(
            "\nTotal: {} titles ({} series, {} standalone), {} files",
            stats.titles, stats.series, stats.standalone, stats.leaves
        );
        return Ok(());
    };

    let key = CatalogKey::normalize(title)?;
    let node = tree
        .title(&key)
        .with_context(|| format!("No such title: {}", key))?;

    println!("{}", key);
    match node {
        TitleNode::Standalone { qualities } => {
            for (quality, media) in qualities.iter() {
                println!("  {:<10} {}", quality, media.file_id);
            }
        }
        TitleNode::Series { seasons } => {
            for (season, episodes) in seasons.iter() {
                println!("  {}", season);
                for (episode, qualities) in episodes.iter() {
                    let labels: Vec<String> = qualities.qualities().map(ToString::to_string).collect();
                    println!("    {}  [{}]", episode, labels.join(", "));
                }
            }
        }
    }

    Ok(())
}

async fn import_legacy(snapshot: Option<PathBuf>, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read legacy file: {}", file.display()))?;
    let import = parse_legacy(&json)?;
    let catalog = open_catalog(snapshot).await?;

    let mut added = 0usize;
    let mut conflicts = 0usize;
    for (entry, media) in import.entries {
        match catalog.upsert(&entry, media).await {
            Ok(UpsertOutcome::Unchanged) => {}
            Ok(_) => added += 1,
            Err(CatalogError::ShapeConflict(conflict)) => {
                eprintln!("  ⚠️  {}", conflict);
                conflicts += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    for skipped in &import.skipped {
        eprintln!("  skipped {}: {}", skipped.key, skipped.reason);
    }

    eprintln!(
        "✅ Imported {} entries ({} skipped, {} conflicts)",
        added,
        import.skipped.len(),
        conflicts
    );
    Ok(())
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("reelshelf configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Snapshot: {}", cfg.snapshot.display());
    println!();
    println!("Bot:");
    println!(
        "  Token:        {}",
        if cfg.bot_token.is_some() { "(set)" } else { "(missing)" }
    );
    println!(
        "  Owner:        {}",
        cfg.owner_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "(anyone)".to_string())
    );
    println!("  Poll timeout: {}s", cfg.poll_timeout_seconds);
    println!("  Footer:       {}", cfg.footer.as_deref().unwrap_or("(none)"));

    Ok(())
}
