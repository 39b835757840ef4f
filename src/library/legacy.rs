//! Import of the flat episode document used by the first version of the bot.
//!
//! That document maps `<series>_s<NN>` to quality to episode number to file
//! id, optionally wrapped as `{"_id": ..., "content": {...}}`. Every file id
//! in it was a video.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

use crate::domain::{CatalogKey, EntryPath, EpisodeLabel, MediaRef, QualityLabel, SeasonLabel};

// Quality order in the document is upload order and must survive import
type LegacyContent = IndexMap<String, IndexMap<String, BTreeMap<String, String>>>;

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyDocument {
    Wrapped { content: LegacyContent },
    Bare(LegacyContent),
}

/// One entry from a legacy document that could not be mapped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub key: String,
    pub reason: String,
}

/// Result of converting a legacy document
#[derive(Debug, Default)]
pub struct LegacyImport {
    pub entries: Vec<(EntryPath, MediaRef)>,
    pub skipped: Vec<SkippedEntry>,
}

fn series_key() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?P<title>.+)_s(?P<season>\d+)$").expect("series key pattern is valid"))
}

/// Convert a legacy JSON document into catalog entries
pub fn parse_legacy(json: &str) -> Result<LegacyImport> {
    let document: LegacyDocument =
        serde_json::from_str(json).context("Failed to parse legacy episode document")?;
    let content = match document {
        LegacyDocument::Wrapped { content } => content,
        LegacyDocument::Bare(content) => content,
    };

    let mut import = LegacyImport::default();

    for (series, qualities) in content {
        let Some(caps) = series_key().captures(&series) else {
            import.skipped.push(SkippedEntry {
                key: series.clone(),
                reason: "key has no _sNN season suffix".to_string(),
            });
            continue;
        };

        let (title, season) = match (
            CatalogKey::normalize(&caps["title"]),
            SeasonLabel::parse(&caps["season"]),
        ) {
            (Ok(title), Ok(season)) => (title, season),
            (Err(e), _) | (_, Err(e)) => {
                import.skipped.push(SkippedEntry {
                    key: series.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        for (quality_raw, episodes) in qualities {
            let quality = match QualityLabel::parse(&quality_raw) {
                Ok(q) => q,
                Err(e) => {
                    import.skipped.push(SkippedEntry {
                        key: format!("{}/{}", series, quality_raw),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            for (episode_raw, file_id) in episodes {
                match EpisodeLabel::parse(&episode_raw) {
                    Ok(episode) => import.entries.push((
                        EntryPath::episode(title.clone(), season, episode, quality.clone()),
                        MediaRef::video(file_id),
                    )),
                    Err(e) => import.skipped.push(SkippedEntry {
                        key: format!("{}/{}/{}", series, quality_raw, episode_raw),
                        reason: e.to_string(),
                    }),
                }
            }
        }
    }

    Ok(import)
}
