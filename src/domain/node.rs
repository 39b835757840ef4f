//! The catalog tree.
//!
//! A title maps either straight to a [`QualityMap`] (standalone item) or to a
//! [`SeasonMap`] (series). The two shapes never mix under one title.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::labels::{CatalogKey, EpisodeLabel, QualityLabel, SeasonLabel};
use super::media::MediaRef;
use super::path::{CatalogPath, ChildKey};

/// Whether an upsert created, overwrote, or re-stored an identical leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Replaced,
    Unchanged,
}

/// Shape of a title entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Standalone,
    Series,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Standalone => f.pad("standalone"),
            Shape::Series => f.pad("series"),
        }
    }
}

/// An upsert would place a leaf of one shape under a title of the other
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Title '{title}' is already a {existing} entry, cannot store a {requested} item under it")]
pub struct ShapeConflict {
    pub title: CatalogKey,
    pub existing: Shape,
    pub requested: Shape,
}

/// Where a leaf lives below its title
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntrySlot {
    Standalone,
    Episode {
        season: SeasonLabel,
        episode: EpisodeLabel,
    },
}

/// Full address of one leaf: title, slot and quality
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPath {
    pub title: CatalogKey,
    pub slot: EntrySlot,
    pub quality: QualityLabel,
}

impl EntryPath {
    pub fn standalone(title: CatalogKey, quality: QualityLabel) -> Self {
        Self {
            title,
            slot: EntrySlot::Standalone,
            quality,
        }
    }

    pub fn episode(
        title: CatalogKey,
        season: SeasonLabel,
        episode: EpisodeLabel,
        quality: QualityLabel,
    ) -> Self {
        Self {
            title,
            slot: EntrySlot::Episode { season, episode },
            quality,
        }
    }

    pub fn shape(&self) -> Shape {
        match self.slot {
            EntrySlot::Standalone => Shape::Standalone,
            EntrySlot::Episode { .. } => Shape::Series,
        }
    }

    pub fn season(&self) -> Option<SeasonLabel> {
        match self.slot {
            EntrySlot::Standalone => None,
            EntrySlot::Episode { season, .. } => Some(season),
        }
    }

    pub fn episode_label(&self) -> Option<EpisodeLabel> {
        match self.slot {
            EntrySlot::Standalone => None,
            EntrySlot::Episode { episode, .. } => Some(episode),
        }
    }

    /// The equivalent fully-specified catalog path
    pub fn path(&self) -> CatalogPath {
        CatalogPath {
            title: self.title.clone(),
            season: self.season(),
            episode: self.episode_label(),
            quality: Some(self.quality.clone()),
        }
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path(), f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityEntry {
    pub quality: QualityLabel,
    pub media: MediaRef,
}

/// Quality label → leaf, in first-upload order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityMap(Vec<QualityEntry>);

impl QualityMap {
    pub fn get(&self, quality: &QualityLabel) -> Option<&MediaRef> {
        self.0
            .iter()
            .find(|e| &e.quality == quality)
            .map(|e| &e.media)
    }

    /// Insert or overwrite in place; a new quality goes to the end
    pub fn insert(&mut self, quality: QualityLabel, media: MediaRef) -> UpsertOutcome {
        match self.0.iter_mut().find(|e| e.quality == quality) {
            Some(existing) if existing.media == media => UpsertOutcome::Unchanged,
            Some(existing) => {
                existing.media = media;
                UpsertOutcome::Replaced
            }
            None => {
                self.0.push(QualityEntry { quality, media });
                UpsertOutcome::Created
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QualityLabel, &MediaRef)> {
        self.0.iter().map(|e| (&e.quality, &e.media))
    }

    pub fn qualities(&self) -> impl Iterator<Item = &QualityLabel> {
        self.0.iter().map(|e| &e.quality)
    }

    /// The only leaf, when exactly one quality exists
    pub fn sole(&self) -> Option<(&QualityLabel, &MediaRef)> {
        match self.0.as_slice() {
            [only] => Some((&only.quality, &only.media)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Episode label → qualities, ordered by episode number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeMap(BTreeMap<EpisodeLabel, QualityMap>);

impl EpisodeMap {
    pub fn get(&self, episode: &EpisodeLabel) -> Option<&QualityMap> {
        self.0.get(episode)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EpisodeLabel, &QualityMap)> {
        self.0.iter()
    }

    pub fn episodes(&self) -> impl Iterator<Item = &EpisodeLabel> {
        self.0.keys()
    }

    /// Every episode that has `quality`, in episode order
    pub fn in_quality(&self, quality: &QualityLabel) -> Vec<(EpisodeLabel, &MediaRef)> {
        self.0
            .iter()
            .filter_map(|(episode, qualities)| qualities.get(quality).map(|m| (*episode, m)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Season label → episodes, ordered by season number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeasonMap(BTreeMap<SeasonLabel, EpisodeMap>);

impl SeasonMap {
    pub fn get(&self, season: &SeasonLabel) -> Option<&EpisodeMap> {
        self.0.get(season)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeasonLabel, &EpisodeMap)> {
        self.0.iter()
    }

    pub fn seasons(&self) -> impl Iterator<Item = &SeasonLabel> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a title holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TitleNode {
    Standalone { qualities: QualityMap },
    Series { seasons: SeasonMap },
}

impl TitleNode {
    pub fn shape(&self) -> Shape {
        match self {
            TitleNode::Standalone { .. } => Shape::Standalone,
            TitleNode::Series { .. } => Shape::Series,
        }
    }

    /// Number of stored media items under this title
    pub fn leaf_count(&self) -> usize {
        match self {
            TitleNode::Standalone { qualities } => qualities.len(),
            TitleNode::Series { seasons } => seasons
                .iter()
                .flat_map(|(_, episodes)| episodes.iter())
                .map(|(_, qualities)| qualities.len())
                .sum(),
        }
    }
}

/// Borrowed view of the node found at a catalog path
#[derive(Debug, Clone, Copy)]
pub enum CatalogNode<'a> {
    Leaf(&'a MediaRef),
    QualityMap(&'a QualityMap),
    EpisodeMap(&'a EpisodeMap),
    SeasonMap(&'a SeasonMap),
}

impl<'a> CatalogNode<'a> {
    /// Keys of the immediate children in presentation order
    pub fn child_keys(&self) -> Vec<ChildKey> {
        match self {
            CatalogNode::Leaf(_) => Vec::new(),
            CatalogNode::QualityMap(q) => q.qualities().cloned().map(ChildKey::Quality).collect(),
            CatalogNode::EpisodeMap(e) => e.episodes().copied().map(ChildKey::Episode).collect(),
            CatalogNode::SeasonMap(s) => s.seasons().copied().map(ChildKey::Season).collect(),
        }
    }
}

/// Counts reported by `list` and on startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub titles: usize,
    pub series: usize,
    pub standalone: usize,
    pub leaves: usize,
}

/// The whole catalog: title key → node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTree {
    titles: BTreeMap<CatalogKey, TitleNode>,
}

impl CatalogTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self, key: &CatalogKey) -> Option<&TitleNode> {
        self.titles.get(key)
    }

    pub fn titles(&self) -> impl Iterator<Item = (&CatalogKey, &TitleNode)> {
        self.titles.iter()
    }

    /// Store a leaf, creating intermediate maps on the way.
    ///
    /// Shape is checked before anything is touched, so a conflict leaves the
    /// tree as it was.
    pub fn upsert(&mut self, entry: &EntryPath, media: MediaRef) -> Result<UpsertOutcome, ShapeConflict> {
        if let Some(existing) = self.titles.get(&entry.title) {
            if existing.shape() != entry.shape() {
                return Err(ShapeConflict {
                    title: entry.title.clone(),
                    existing: existing.shape(),
                    requested: entry.shape(),
                });
            }
        }

        let node = self
            .titles
            .entry(entry.title.clone())
            .or_insert_with(|| match entry.slot {
                EntrySlot::Standalone => TitleNode::Standalone {
                    qualities: QualityMap::default(),
                },
                EntrySlot::Episode { .. } => TitleNode::Series {
                    seasons: SeasonMap::default(),
                },
            });

        let qualities = match (node, &entry.slot) {
            (TitleNode::Standalone { qualities }, EntrySlot::Standalone) => qualities,
            (TitleNode::Series { seasons }, EntrySlot::Episode { season, episode }) => seasons
                .0
                .entry(*season)
                .or_default()
                .0
                .entry(*episode)
                .or_default(),
            // Ruled out by the shape check above
            (node, _) => {
                return Err(ShapeConflict {
                    title: entry.title.clone(),
                    existing: node.shape(),
                    requested: entry.shape(),
                })
            }
        };

        Ok(qualities.insert(entry.quality.clone(), media))
    }

    /// Node at a possibly partial path.
    ///
    /// A quality on a path that stops above the episode level names no node.
    pub fn get(&self, path: &CatalogPath) -> Option<CatalogNode<'_>> {
        let node = self.titles.get(&path.title)?;

        let qualities = match node {
            TitleNode::Standalone { qualities } => {
                if path.season.is_some() || path.episode.is_some() {
                    return None;
                }
                qualities
            }
            TitleNode::Series { seasons } => {
                let Some(season) = &path.season else {
                    if path.episode.is_some() || path.quality.is_some() {
                        return None;
                    }
                    return Some(CatalogNode::SeasonMap(seasons));
                };
                let episodes = seasons.get(season)?;

                let Some(episode) = &path.episode else {
                    if path.quality.is_some() {
                        return None;
                    }
                    return Some(CatalogNode::EpisodeMap(episodes));
                };
                episodes.get(episode)?
            }
        };

        match &path.quality {
            Some(quality) => qualities.get(quality).map(CatalogNode::Leaf),
            None => Some(CatalogNode::QualityMap(qualities)),
        }
    }

    /// Keys under `path` in presentation order, empty when nothing is there
    pub fn child_keys(&self, path: &CatalogPath) -> Vec<ChildKey> {
        self.get(path).map(|n| n.child_keys()).unwrap_or_default()
    }

    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats::default();
        for node in self.titles.values() {
            stats.titles += 1;
            stats.leaves += node.leaf_count();
            match node.shape() {
                Shape::Series => stats.series += 1,
                Shape::Standalone => stats.standalone += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}
