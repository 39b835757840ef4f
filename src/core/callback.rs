//! Continuation tokens for multi-step disambiguation.
//!
//! A token carries the partial path chosen so far. Nothing is remembered
//! server-side: on decode the path is resolved again against the catalog as
//! it is *now*, so a node that disappeared or changed in the meantime shows
//! up as [`CallbackOutcome::Expired`] instead of a stale answer.
//!
//! # Token layout
//!
//! ```text
//! flags:u8 [season:u16be] [episode:u16be] [qlen:u8 quality] title  checksum:2
//! ```
//!
//! base64url without padding. The checksum is the first two bytes of the
//! SHA-256 of everything before it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::resolver::{Disambiguation, QueryResolver, Resolution};
use crate::domain::{CatalogKey, CatalogPath, ChildKey, EpisodeLabel, QualityLabel, SeasonLabel};

/// Transport limit for button payloads, in bytes
pub const MAX_TOKEN_LEN: usize = 64;

const TOKEN_VERSION: u8 = 1;
const FLAG_SEASON: u8 = 0b0001_0000;
const FLAG_EPISODE: u8 = 0b0010_0000;
const FLAG_QUALITY: u8 = 0b0100_0000;
const VERSION_MASK: u8 = 0b0000_1111;
const CHECKSUM_LEN: usize = 2;

/// Errors producing or reading a token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token would be {len} bytes, limit is {limit}")]
    TooLarge { len: usize, limit: usize },

    #[error("Season or episode number {0} does not fit in a token")]
    NumberOutOfRange(u32),

    #[error("Malformed token: {0}")]
    Malformed(&'static str),

    #[error("Token checksum mismatch")]
    Checksum,
}

/// Opaque, transport-safe encoding of a [`CatalogPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackToken(String);

impl CallbackToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A menu entry: what to show and what to send back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionButton {
    pub label: String,
    pub token: CallbackToken,
}

/// What a pressed button turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Fresh resolution of the encoded path
    Resolved(Resolution),

    /// The path no longer resolves to anything
    Expired(CatalogPath),

    /// The payload was not a token we issued
    Invalid(TokenError),
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(payload);
    [digest[0], digest[1]]
}

fn number(n: u32) -> Result<[u8; 2], TokenError> {
    u16::try_from(n)
        .map(u16::to_be_bytes)
        .map_err(|_| TokenError::NumberOutOfRange(n))
}

/// Encode a partial path into a token
pub fn encode(path: &CatalogPath) -> Result<CallbackToken, TokenError> {
    let mut flags = TOKEN_VERSION;
    let mut payload = vec![0u8];

    if let Some(season) = &path.season {
        flags |= FLAG_SEASON;
        payload.extend_from_slice(&number(season.number())?);
    }
    if let Some(episode) = &path.episode {
        flags |= FLAG_EPISODE;
        payload.extend_from_slice(&number(episode.number())?);
    }
    if let Some(quality) = &path.quality {
        flags |= FLAG_QUALITY;
        let bytes = quality.as_str().as_bytes();
        let len = u8::try_from(bytes.len()).map_err(|_| TokenError::TooLarge {
            len: bytes.len(),
            limit: MAX_TOKEN_LEN,
        })?;
        payload.push(len);
        payload.extend_from_slice(bytes);
    }
    payload[0] = flags;
    payload.extend_from_slice(path.title.as_str().as_bytes());

    let sum = checksum(&payload);
    payload.extend_from_slice(&sum);

    let token = URL_SAFE_NO_PAD.encode(&payload);
    if token.len() > MAX_TOKEN_LEN {
        return Err(TokenError::TooLarge {
            len: token.len(),
            limit: MAX_TOKEN_LEN,
        });
    }
    Ok(CallbackToken(token))
}

fn take<'a>(bytes: &mut &'a [u8], n: usize) -> Result<&'a [u8], TokenError> {
    if bytes.len() < n {
        return Err(TokenError::Malformed("truncated"));
    }
    let (head, tail) = bytes.split_at(n);
    *bytes = tail;
    Ok(head)
}

fn take_number(bytes: &mut &[u8]) -> Result<u32, TokenError> {
    let raw = take(bytes, 2)?;
    Ok(u32::from(u16::from_be_bytes([raw[0], raw[1]])))
}

/// Decode a token back into the path it was built from
pub fn decode(token: &str) -> Result<CatalogPath, TokenError> {
    if token.len() > MAX_TOKEN_LEN {
        return Err(TokenError::TooLarge {
            len: token.len(),
            limit: MAX_TOKEN_LEN,
        });
    }

    let raw = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| TokenError::Malformed("not base64url"))?;
    if raw.len() < 1 + CHECKSUM_LEN {
        return Err(TokenError::Malformed("truncated"));
    }

    let (payload, sum) = raw.split_at(raw.len() - CHECKSUM_LEN);
    if checksum(payload) != sum {
        return Err(TokenError::Checksum);
    }

    let mut rest = payload;
    let flags = take(&mut rest, 1)?[0];
    if flags & VERSION_MASK != TOKEN_VERSION {
        return Err(TokenError::Malformed("unknown version"));
    }

    let season = if flags & FLAG_SEASON != 0 {
        Some(SeasonLabel::new(take_number(&mut rest)?))
    } else {
        None
    };
    let episode = if flags & FLAG_EPISODE != 0 {
        Some(EpisodeLabel::new(take_number(&mut rest)?))
    } else {
        None
    };
    let quality = if flags & FLAG_QUALITY != 0 {
        let len = take(&mut rest, 1)?[0] as usize;
        let bytes = take(&mut rest, len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| TokenError::Malformed("quality not utf-8"))?;
        Some(QualityLabel::parse(text).map_err(|_| TokenError::Malformed("empty quality"))?)
    } else {
        None
    };

    let title = std::str::from_utf8(rest).map_err(|_| TokenError::Malformed("title not utf-8"))?;
    let title = CatalogKey::normalize(title).map_err(|_| TokenError::Malformed("empty title"))?;

    Ok(CatalogPath {
        title,
        season,
        episode,
        quality,
    })
}

/// Builds menu buttons and turns pressed buttons back into resolutions
#[derive(Debug, Clone)]
pub struct CallbackDispatcher {
    resolver: QueryResolver,
}

impl CallbackDispatcher {
    pub fn new(resolver: QueryResolver) -> Self {
        Self { resolver }
    }

    /// One button per option, each carrying the path extended by that option
    pub fn option_tokens(&self, menu: &Disambiguation) -> Result<Vec<OptionButton>, TokenError> {
        menu.options
            .iter()
            .map(|option: &ChildKey| {
                Ok(OptionButton {
                    label: option.to_string(),
                    token: encode(&menu.path.child(option))?,
                })
            })
            .collect()
    }

    /// Decode `token` and resolve it against the current catalog
    pub fn dispatch(&self, token: &str) -> CallbackOutcome {
        let path = match decode(token) {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected callback token");
                return CallbackOutcome::Invalid(e);
            }
        };

        match self.resolver.resolve_path(&path) {
            Resolution::NotFound => {
                tracing::info!(path = %path, "Callback target no longer available");
                CallbackOutcome::Expired(path)
            }
            resolution => CallbackOutcome::Resolved(resolution),
        }
    }
}
