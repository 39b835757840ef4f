//! Catalog paths: the partial-resolution value shared by queries,
//! ingestion and callback tokens.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use super::labels::{CatalogKey, EpisodeLabel, LabelError, QualityLabel, SeasonLabel};

/// Ordered sequence of normalized labels identifying a catalog node.
///
/// Season and episode only make sense together with a series title;
/// `quality` may appear at any depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogPath {
    pub title: CatalogKey,
    pub season: Option<SeasonLabel>,
    pub episode: Option<EpisodeLabel>,
    pub quality: Option<QualityLabel>,
}

/// One child key at the next unresolved depth
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChildKey {
    Season(SeasonLabel),
    Episode(EpisodeLabel),
    Quality(QualityLabel),
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildKey::Season(s) => write!(f, "{}", s),
            ChildKey::Episode(e) => write!(f, "{}", e),
            ChildKey::Quality(q) => write!(f, "{}", q),
        }
    }
}

/// Labels that may trail a title in an underscore query
fn suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:_s(?P<season>\d+))?(?:_ep(?P<episode>\d+))?(?:_(?P<quality>\d{3,4}p))?$")
            .expect("suffix pattern is valid")
    })
}

/// Marks a delimited field as a quality whatever it looks like
const QUALITY_PREFIX: &str = "q:";

fn season_field() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^(s|season)\s*\d+$").expect("season pattern is valid"))
}

fn episode_field() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(ep|e|episode)\s*\d+$").expect("episode pattern is valid")
    })
}

impl CatalogPath {
    /// Path naming just a title
    pub fn title(title: CatalogKey) -> Self {
        Self {
            title,
            season: None,
            episode: None,
            quality: None,
        }
    }

    pub fn with_season(mut self, season: SeasonLabel) -> Self {
        self.season = Some(season);
        self
    }

    pub fn with_episode(mut self, episode: EpisodeLabel) -> Self {
        self.episode = Some(episode);
        self
    }

    pub fn with_quality(mut self, quality: QualityLabel) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Extend this path by one chosen child key
    pub fn child(&self, key: &ChildKey) -> Self {
        let next = self.clone();
        match key {
            ChildKey::Season(s) => next.with_season(*s),
            ChildKey::Episode(e) => next.with_episode(*e),
            ChildKey::Quality(q) => next.with_quality(q.clone()),
        }
    }

    /// Parse a user query, taking the shortest title the text allows.
    ///
    /// Titles may themselves end in something like `_s2` or `_1080p`; use
    /// [`CatalogPath::query_candidates`] when a catalog is at hand to pick
    /// the reading that names an existing title.
    pub fn parse_query(raw: &str) -> Result<Self, LabelError> {
        match Self::query_candidates(raw)?.pop() {
            Some(path) => Ok(path),
            None => Err(LabelError::EmptyTitle(raw.to_string())),
        }
    }

    /// Every reading of a query, longest title first.
    ///
    /// Without `|` the text is normalized like a key. The first candidate is
    /// the whole key as a bare title; each following one moves the split
    /// left to the next `_` whose remainder reads as `[_sNN][_epNN][_NNNp]`.
    /// With `|` there is exactly one reading: the first field is the title
    /// and the others are classified by shape.
    pub fn query_candidates(raw: &str) -> Result<Vec<Self>, LabelError> {
        if raw.contains('|') {
            return Ok(vec![Self::parse_delimited(raw)?]);
        }

        let normalized = CatalogKey::normalize(raw)?;
        let key = normalized.as_str();
        let mut candidates = vec![Self::title(normalized.clone())];

        let splits: Vec<usize> = key.match_indices('_').map(|(idx, _)| idx).collect();
        for idx in splits.into_iter().rev() {
            if let Some(path) = Self::split_at(&key[..idx], &key[idx..]) {
                candidates.push(path);
            }
        }
        Ok(candidates)
    }

    fn split_at(title: &str, suffix: &str) -> Option<Self> {
        let caps = suffix_pattern().captures(suffix)?;
        let mut path = Self::title(CatalogKey::normalize(title).ok()?);
        if let Some(season) = caps.name("season") {
            path.season = Some(SeasonLabel::parse(season.as_str()).ok()?);
        }
        if let Some(episode) = caps.name("episode") {
            path.episode = Some(EpisodeLabel::parse(episode.as_str()).ok()?);
        }
        if let Some(quality) = caps.name("quality") {
            path.quality = Some(QualityLabel::parse(quality.as_str()).ok()?);
        }
        Some(path)
    }

    /// Render as a `|` query that parses back to exactly this path
    pub fn to_delimited(&self) -> String {
        let mut fields = vec![self.title.to_string()];
        fields.extend(self.season.map(|s| s.to_string()));
        fields.extend(self.episode.map(|e| e.to_string()));
        if let Some(quality) = &self.quality {
            let text = quality.as_str();
            if season_field().is_match(text)
                || episode_field().is_match(text)
                || text.starts_with(QUALITY_PREFIX)
            {
                fields.push(format!("{}{}", QUALITY_PREFIX, text));
            } else {
                fields.push(text.to_string());
            }
        }
        fields.join(" | ")
    }

    fn parse_delimited(raw: &str) -> Result<Self, LabelError> {
        let mut fields = raw.split('|').map(str::trim);
        let title = CatalogKey::normalize(fields.next().unwrap_or_default())?;
        let mut path = Self::title(title);

        for field in fields.filter(|f| !f.is_empty()) {
            let forced_quality = field
                .get(..QUALITY_PREFIX.len())
                .filter(|head| head.eq_ignore_ascii_case(QUALITY_PREFIX))
                .map(|_| &field[QUALITY_PREFIX.len()..]);

            if let Some(quality) = forced_quality {
                path.quality = Some(QualityLabel::parse(quality)?);
            } else if season_field().is_match(field) {
                path.season = Some(SeasonLabel::parse(field)?);
            } else if episode_field().is_match(field) {
                path.episode = Some(EpisodeLabel::parse(field)?);
            } else {
                path.quality = Some(QualityLabel::parse(field)?);
            }
        }
        Ok(path)
    }
}

/// Renders the path in query form, which `parse_query` accepts back
impl fmt::Display for CatalogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)?;
        if let Some(season) = &self.season {
            write!(f, "_{}", season)?;
        }
        if let Some(episode) = &self.episode {
            write!(f, "_{}", episode)?;
        }
        if let Some(quality) = &self.quality {
            write!(f, "_{}", quality)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CatalogKey {
        CatalogKey::normalize(s).unwrap()
    }

    #[test]
    fn test_parse_full_query() {
        let path = CatalogPath::parse_query("angel_next_door_s01_ep03").unwrap();
        assert_eq!(path.title, key("angel_next_door"));
        assert_eq!(path.season, Some(SeasonLabel::new(1)));
        assert_eq!(path.episode, Some(EpisodeLabel::new(3)));
        assert_eq!(path.quality, None);
    }

    #[test]
    fn test_parse_partial_queries() {
        let path = CatalogPath::parse_query("Angel Next Door S01").unwrap();
        assert_eq!(path, CatalogPath::title(key("angel_next_door")).with_season(SeasonLabel::new(1)));

        let path = CatalogPath::parse_query("your_name_1080p").unwrap();
        assert_eq!(path.title, key("your_name"));
        assert_eq!(path.quality.unwrap().as_str(), "1080p");

        let path = CatalogPath::parse_query("unknown_title").unwrap();
        assert_eq!(path, CatalogPath::title(key("unknown_title")));
    }

    #[test]
    fn test_parse_delimited_query() {
        let path = CatalogPath::parse_query("angel next door | Season 2 | EP 7 | 720P").unwrap();
        assert_eq!(path.title, key("angel_next_door"));
        assert_eq!(path.season, Some(SeasonLabel::new(2)));
        assert_eq!(path.episode, Some(EpisodeLabel::new(7)));
        assert_eq!(path.quality.unwrap().as_str(), "720p");
    }

    #[test]
    fn test_empty_query_is_an_error() {
        assert!(CatalogPath::parse_query("   ").is_err());
        assert!(CatalogPath::parse_query(" | s01").is_err());
    }

    #[test]
    fn test_candidates_longest_title_first() {
        let candidates = CatalogPath::query_candidates("ghost_s1_1080p").unwrap();
        let quality = QualityLabel::parse("1080p").unwrap();
        assert_eq!(
            candidates,
            vec![
                CatalogPath::title(key("ghost_s1_1080p")),
                CatalogPath::title(key("ghost_s1")).with_quality(quality.clone()),
                CatalogPath::title(key("ghost"))
                    .with_season(SeasonLabel::new(1))
                    .with_quality(quality),
            ]
        );

        // Splits whose remainder isn't a label sequence are skipped
        let candidates = CatalogPath::query_candidates("angel_next_door").unwrap();
        assert_eq!(candidates, vec![CatalogPath::title(key("angel_next_door"))]);
    }

    #[test]
    fn test_delimited_render_keeps_odd_qualities() {
        for quality in ["web-dl", "s2", "e3", "q:x"] {
            let path = CatalogPath::title(key("bleach"))
                .with_season(SeasonLabel::new(1))
                .with_episode(EpisodeLabel::new(3))
                .with_quality(QualityLabel::parse(quality).unwrap());
            assert_eq!(CatalogPath::parse_query(&path.to_delimited()).unwrap(), path);
        }

        let plain = CatalogPath::title(key("bleach")).with_quality(QualityLabel::parse("720p").unwrap());
        assert_eq!(plain.to_delimited(), "bleach | 720p");
    }

    #[test]
    fn test_display_reparses() {
        let path = CatalogPath::title(key("mob psycho"))
            .with_season(SeasonLabel::new(3))
            .with_episode(EpisodeLabel::new(12))
            .with_quality(QualityLabel::parse("480p").unwrap());
        assert_eq!(path.to_string(), "mob_psycho_s03_ep12_480p");
        assert_eq!(CatalogPath::parse_query(&path.to_string()).unwrap(), path);
    }
}
