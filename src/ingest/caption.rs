//! Caption parsing for uploaded media.
//!
//! Two grammars are understood:
//!
//! ```text
//! angel next door | s01 | ep03 | 1080p     # delimited episode
//! your name | MOVIE | 720p                 # delimited standalone
//! angel_next_door s01 ep03 1080p           # inline episode
//! ```
//!
//! A caption containing `|` is only read with the delimited grammar.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::domain::{CatalogKey, EntryPath, EpisodeLabel, LabelError, QualityLabel, SeasonLabel};

/// Field delimiter for the delimited grammar
pub const DELIMITER: char = '|';

/// Marker in the second field that flags a standalone item
pub const STANDALONE_MARKER: &str = "movie";

/// Why a caption could not be turned into a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("Caption is empty")]
    Empty,

    #[error("Caption matches neither the delimited nor the inline form")]
    NoGrammarMatched,

    #[error("Expected 3 or 4 '|' separated fields, found {0}")]
    FieldCount(usize),

    #[error("Title is missing")]
    MissingTitle,

    #[error("Season has no number")]
    MissingSeasonNumber,

    #[error("Episode has no number")]
    MissingEpisodeNumber,

    #[error("Quality is empty")]
    EmptyQuality,
}

impl From<LabelError> for ParseFailure {
    fn from(e: LabelError) -> Self {
        match e {
            LabelError::EmptyTitle(_) => ParseFailure::MissingTitle,
            LabelError::NoSeasonNumber(_) => ParseFailure::MissingSeasonNumber,
            LabelError::NoEpisodeNumber(_) => ParseFailure::MissingEpisodeNumber,
            LabelError::EmptyQuality => ParseFailure::EmptyQuality,
        }
    }
}

fn inline_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?P<title>\w+)\s*s(?P<season>\d+)\s*ep(?P<episode>\d+)\s*(?P<quality>\d{3,4}p)")
            .expect("inline caption pattern is valid")
    })
}

/// Parse a caption into the catalog entry it describes
pub fn parse(raw: &str) -> Result<EntryPath, ParseFailure> {
    let caption = raw.trim();
    if caption.is_empty() {
        return Err(ParseFailure::Empty);
    }

    if caption.contains(DELIMITER) {
        parse_delimited(caption)
    } else {
        parse_inline(caption)
    }
}

fn parse_delimited(caption: &str) -> Result<EntryPath, ParseFailure> {
    let fields: Vec<&str> = caption.split(DELIMITER).map(str::trim).collect();

    match fields.as_slice() {
        [title, marker, quality] if marker.eq_ignore_ascii_case(STANDALONE_MARKER) => {
            Ok(EntryPath::standalone(
                CatalogKey::normalize(title)?,
                QualityLabel::parse(quality)?,
            ))
        }
        [title, season, episode, quality] => Ok(EntryPath::episode(
            CatalogKey::normalize(title)?,
            SeasonLabel::parse(season)?,
            EpisodeLabel::parse(episode)?,
            QualityLabel::parse(quality)?,
        )),
        // Three fields without the marker: an episode missing its season or number
        [_, _, _] => Err(ParseFailure::MissingEpisodeNumber),
        other => Err(ParseFailure::FieldCount(other.len())),
    }
}

fn parse_inline(caption: &str) -> Result<EntryPath, ParseFailure> {
    let caps = inline_pattern()
        .captures(caption)
        .ok_or(ParseFailure::NoGrammarMatched)?;

    Ok(EntryPath::episode(
        CatalogKey::normalize(&caps["title"])?,
        SeasonLabel::parse(&caps["season"])?,
        EpisodeLabel::parse(&caps["episode"])?,
        QualityLabel::parse(&caps["quality"])?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CatalogPath, EntrySlot, Shape};

    #[test]
    fn test_delimited_episode() {
        let entry = parse("angel next door | s01 | ep03 | 1080p").unwrap();
        assert_eq!(entry.title.as_str(), "angel_next_door");
        assert_eq!(
            entry.slot,
            EntrySlot::Episode {
                season: SeasonLabel::new(1),
                episode: EpisodeLabel::new(3)
            }
        );
        assert_eq!(entry.quality.as_str(), "1080p");
    }

    #[test]
    fn test_delimited_free_labels() {
        let entry = parse("Frieren | Season 2 | Episode 11 | 720P").unwrap();
        assert_eq!(entry.to_string(), "frieren_s02_ep11_720p");
    }

    #[test]
    fn test_delimited_standalone() {
        let entry = parse("Your Name | MOVIE | 2160p").unwrap();
        assert_eq!(entry.shape(), Shape::Standalone);
        assert_eq!(entry.to_string(), "your_name_2160p");
    }

    #[test]
    fn test_inline_form() {
        let entry = parse("🔥 NEW angel_next_door S01 EP03 1080p").unwrap();
        assert_eq!(entry.to_string(), "angel_next_door_s01_ep03_1080p");

        let entry = parse("bleach s2ep7 480p").unwrap();
        assert_eq!(entry.to_string(), "bleach_s02_ep07_480p");
    }

    #[test]
    fn test_failures() {
        assert_eq!(parse("   "), Err(ParseFailure::Empty));
        assert_eq!(parse("just a nice clip"), Err(ParseFailure::NoGrammarMatched));
        assert_eq!(parse("a | b"), Err(ParseFailure::FieldCount(2)));
        assert_eq!(parse("a | s1 | ep2 | 1080p | extra"), Err(ParseFailure::FieldCount(5)));
        assert_eq!(parse("title | special | ep2 | 1080p"), Err(ParseFailure::MissingSeasonNumber));
        assert_eq!(parse("title | s1 | finale | 1080p"), Err(ParseFailure::MissingEpisodeNumber));
        assert_eq!(parse("title | s1 | ep2 |  "), Err(ParseFailure::EmptyQuality));
        assert_eq!(parse(" | MOVIE | 1080p"), Err(ParseFailure::MissingTitle));
        assert_eq!(parse("title | s1 | 1080p"), Err(ParseFailure::MissingEpisodeNumber));
    }

    #[test]
    fn test_parsed_path_reparses_as_query() {
        for caption in [
            "angel next door | s01 | ep03 | 1080p",
            "Mob Psycho 100 | S3 | E12 | 480p",
            "Your Name | movie | 720p",
            "Ghost S1 | movie | 1080p",
            "Re Zero S2 | s01 | ep01 | 720p",
        ] {
            let entry = parse(caption).unwrap();
            let query = entry.path().to_string();
            assert!(
                CatalogPath::query_candidates(&query)
                    .unwrap()
                    .contains(&entry.path()),
                "{:?} does not read back as {:?}",
                query,
                entry.path()
            );
            assert_eq!(CatalogPath::parse_query(&entry.path().to_delimited()).unwrap(), entry.path());
        }
    }
}
