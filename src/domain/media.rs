//! Stored media references.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of stored media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Streamable video
    Video,

    /// Generic file attachment
    Document,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Document => write!(f, "document"),
        }
    }
}

/// Opaque reference to a media item held by the messaging service.
///
/// The file id is whatever the transport hands us; it is never inspected,
/// only replayed back when delivering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    pub file_id: String,
    pub kind: MediaKind,
}

impl MediaRef {
    pub fn new(kind: MediaKind, file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            kind,
        }
    }

    pub fn video(file_id: impl Into<String>) -> Self {
        Self::new(MediaKind::Video, file_id)
    }

    pub fn document(file_id: impl Into<String>) -> Self {
        Self::new(MediaKind::Document, file_id)
    }

    /// Short digest of the file id, safe to put in logs
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.file_id.as_bytes());
        hex::encode(&digest[..4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_serializes_lowercase() {
        let json = serde_json::to_string(&MediaRef::document("F")).unwrap();
        assert_eq!(json, r#"{"file_id":"F","kind":"document"}"#);
        assert_eq!(MediaKind::Video.to_string(), "video");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = MediaRef::video("BAACAgQAAxkBAAI");
        let b = MediaRef::document("BAACAgQAAxkBAAI");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 8);
        assert_ne!(a.fingerprint(), MediaRef::video("other").fingerprint());
    }
}
