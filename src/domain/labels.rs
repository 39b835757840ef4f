//! Normalized catalog labels.
//!
//! Every label is derived from raw user text through a total, idempotent
//! normalization: feeding a label's display form back through its parser
//! yields the same label.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error returned when raw text does not produce a valid label
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("Title is empty after normalization: {0:?}")]
    EmptyTitle(String),

    #[error("No number found in season label: {0:?}")]
    NoSeasonNumber(String),

    #[error("No number found in episode label: {0:?}")]
    NoEpisodeNumber(String),

    #[error("Quality label is empty")]
    EmptyQuality,
}

/// Top-level series/title key.
///
/// Alphanumerics are kept and lowercased, whitespace and `-`, `_`, `.`
/// collapse into a single `_`, anything else is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CatalogKey(String);

impl CatalogKey {
    /// Normalize raw text into a key
    pub fn normalize(raw: &str) -> Result<Self, LabelError> {
        let mut key = String::with_capacity(raw.len());
        let mut pending_sep = false;

        for c in raw.chars() {
            if c.is_alphanumeric() {
                if pending_sep && !key.is_empty() {
                    key.push('_');
                }
                pending_sep = false;
                key.extend(c.to_lowercase());
            } else if c.is_whitespace() || matches!(c, '-' | '_' | '.') {
                pending_sep = true;
            }
        }

        if key.is_empty() {
            return Err(LabelError::EmptyTitle(raw.to_string()));
        }
        Ok(Self(key))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for CatalogKey {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

/// Extract the first run of ASCII digits as a number
fn first_number(raw: &str) -> Option<u32> {
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    let digits: String = raw[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Season number, displayed as `s01`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeasonLabel(u32);

impl SeasonLabel {
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    /// Parse a free label such as `S1`, `season 01` or `s01`
    pub fn parse(raw: &str) -> Result<Self, LabelError> {
        first_number(raw)
            .map(Self)
            .ok_or_else(|| LabelError::NoSeasonNumber(raw.to_string()))
    }

    pub fn number(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SeasonLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{:02}", self.0)
    }
}

impl FromStr for SeasonLabel {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Episode number, displayed as `ep03`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeLabel(u32);

impl EpisodeLabel {
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    /// Parse a free label such as `EP3`, `episode 03` or `3`
    pub fn parse(raw: &str) -> Result<Self, LabelError> {
        first_number(raw)
            .map(Self)
            .ok_or_else(|| LabelError::NoEpisodeNumber(raw.to_string()))
    }

    pub fn number(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EpisodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep{:02}", self.0)
    }
}

impl FromStr for EpisodeLabel {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Free-form quality label (`1080p`, `4k`, `hdrip`), lowercased with no whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualityLabel(String);

impl QualityLabel {
    pub fn parse(raw: &str) -> Result<Self, LabelError> {
        let label: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        if label.is_empty() {
            return Err(LabelError::EmptyQuality);
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for QualityLabel {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Labels travel as their display strings so the snapshot stays readable and
// can be used as JSON object keys.
macro_rules! string_serde {
    ($($ty:ty),+) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }

            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let raw = String::deserialize(deserializer)?;
                    raw.parse().map_err(serde::de::Error::custom)
                }
            }
        )+
    };
}

string_serde!(CatalogKey, SeasonLabel, EpisodeLabel, QualityLabel);
