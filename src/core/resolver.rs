//! Query resolution against the catalog.
//!
//! The resolver walks a catalog path one level at a time. It returns a
//! direct result when the path pins down exactly one media item and a menu
//! of the next level's keys otherwise. When more than one quality exists it
//! always asks; it never picks a "best" one.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{
    CatalogNode, CatalogPath, CatalogTree, ChildKey, EpisodeLabel, MediaRef, TitleNode,
};
use crate::library::Catalog;

/// A choice the user has to make at the next unresolved depth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disambiguation {
    /// Path resolved so far
    pub path: CatalogPath,

    /// Sibling keys in presentation order
    pub options: Vec<ChildKey>,
}

impl Disambiguation {
    /// Option labels as displayed
    pub fn labels(&self) -> Vec<String> {
        self.options.iter().map(ToString::to_string).collect()
    }
}

/// Outcome of resolving a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one item; `path` is fully qualified
    Single { path: CatalogPath, media: MediaRef },

    /// Every episode of a season in one quality, in episode order
    Batch {
        path: CatalogPath,
        items: Vec<(EpisodeLabel, MediaRef)>,
    },

    /// The user has to pick among `options`
    Disambiguate(Disambiguation),

    NotFound,
}

impl Resolution {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Resolution::NotFound)
    }
}

/// Resolves user paths against the current catalog state
#[derive(Debug, Clone)]
pub struct QueryResolver {
    catalog: Arc<Catalog>,
}

impl QueryResolver {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Resolve raw query text.
    ///
    /// The readings of the text are tried longest title first; the first
    /// one that names something in the catalog wins.
    pub fn resolve(&self, raw: &str) -> Resolution {
        let candidates = match CatalogPath::query_candidates(raw) {
            Ok(candidates) => candidates,
            Err(e) => {
                debug!(query = %raw, error = %e, "Query not understood");
                return Resolution::NotFound;
            }
        };

        let tree = self.catalog.snapshot();
        candidates
            .iter()
            .map(|path| resolve_in(&tree, path))
            .find(|resolution| !resolution.is_not_found())
            .unwrap_or(Resolution::NotFound)
    }

    /// Resolve an already structured path against a fresh snapshot
    pub fn resolve_path(&self, path: &CatalogPath) -> Resolution {
        resolve_in(&self.catalog.snapshot(), path)
    }
}

/// Resolve `path` against a specific tree
pub fn resolve_in(tree: &CatalogTree, path: &CatalogPath) -> Resolution {
    // Season + quality without an episode: whole-season delivery
    if let (Some(season), None, Some(quality)) = (&path.season, &path.episode, &path.quality) {
        let Some(TitleNode::Series { seasons }) = tree.title(&path.title) else {
            return Resolution::NotFound;
        };
        let items: Vec<(EpisodeLabel, MediaRef)> = seasons
            .get(season)
            .map(|episodes| {
                episodes
                    .in_quality(quality)
                    .into_iter()
                    .map(|(episode, media)| (episode, media.clone()))
                    .collect()
            })
            .unwrap_or_default();

        if items.is_empty() {
            return Resolution::NotFound;
        }
        return Resolution::Batch {
            path: path.clone(),
            items,
        };
    }

    let Some(node) = tree.get(path) else {
        return Resolution::NotFound;
    };

    match node {
        CatalogNode::Leaf(media) => Resolution::Single {
            path: path.clone(),
            media: media.clone(),
        },
        CatalogNode::QualityMap(qualities) => {
            if let Some((quality, media)) = qualities.sole() {
                return Resolution::Single {
                    path: path.clone().with_quality(quality.clone()),
                    media: media.clone(),
                };
            }
            disambiguate(path, node)
        }
        CatalogNode::EpisodeMap(_) | CatalogNode::SeasonMap(_) => disambiguate(path, node),
    }
}

fn disambiguate(path: &CatalogPath, node: CatalogNode<'_>) -> Resolution {
    let options = node.child_keys();
    if options.is_empty() {
        return Resolution::NotFound;
    }
    Resolution::Disambiguate(Disambiguation {
        path: path.clone(),
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CatalogKey, EntryPath, QualityLabel, SeasonLabel};

    fn upsert(tree: &mut CatalogTree, title: &str, season: u32, ep: u32, quality: &str, id: &str) {
        tree.upsert(
            &EntryPath::episode(
                CatalogKey::normalize(title).unwrap(),
                SeasonLabel::new(season),
                EpisodeLabel::new(ep),
                QualityLabel::parse(quality).unwrap(),
            ),
            MediaRef::video(id),
        )
        .unwrap();
    }

    fn path(query: &str) -> CatalogPath {
        CatalogPath::parse_query(query).unwrap()
    }

    #[test]
    fn test_single_quality_auto_resolves() {
        let mut tree = CatalogTree::new();
        upsert(&mut tree, "bleach", 1, 1, "720p", "A");

        match resolve_in(&tree, &path("bleach_s01_ep01")) {
            Resolution::Single { path, media } => {
                assert_eq!(media, MediaRef::video("A"));
                assert_eq!(path.to_string(), "bleach_s01_ep01_720p");
            }
            other => panic!("Expected single, got {:?}", other),
        }
    }

    #[test]
    fn test_title_only_lists_seasons() {
        let mut tree = CatalogTree::new();
        upsert(&mut tree, "bleach", 2, 1, "720p", "A");
        upsert(&mut tree, "bleach", 1, 1, "720p", "B");

        match resolve_in(&tree, &path("bleach")) {
            Resolution::Disambiguate(d) => assert_eq!(d.labels(), vec!["s01", "s02"]),
            other => panic!("Expected disambiguation, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_in_episode_order() {
        let mut tree = CatalogTree::new();
        upsert(&mut tree, "bleach", 1, 10, "720p", "E10");
        upsert(&mut tree, "bleach", 1, 2, "720p", "E2");
        upsert(&mut tree, "bleach", 1, 5, "1080p", "E5");

        match resolve_in(&tree, &path("bleach_s01_720p")) {
            Resolution::Batch { items, .. } => {
                let ids: Vec<&str> = items.iter().map(|(_, m)| m.file_id.as_str()).collect();
                assert_eq!(ids, vec!["E2", "E10"]);
            }
            other => panic!("Expected batch, got {:?}", other),
        }

        assert!(resolve_in(&tree, &path("bleach_s01_480p")).is_not_found());
        assert!(resolve_in(&tree, &path("bleach_s09_720p")).is_not_found());
    }

    #[test]
    fn test_missing_levels_are_not_found() {
        let mut tree = CatalogTree::new();
        upsert(&mut tree, "bleach", 1, 1, "720p", "A");

        assert!(resolve_in(&tree, &path("bleach_s02")).is_not_found());
        assert!(resolve_in(&tree, &path("bleach_s01_ep02")).is_not_found());
        assert!(resolve_in(&tree, &path("bleach_s01_ep01_1080p")).is_not_found());
        assert!(resolve_in(&tree, &path("naruto")).is_not_found());
    }
}
