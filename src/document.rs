//! Documents handed in by an upstream text-extraction step

use serde::{Deserialize, Serialize};

/// A plain-text document to be indexed into a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier (content digest unless supplied by the caller)
    pub id: String,
    /// Human-readable label, usually the source file name
    pub filename: String,
    /// Extracted UTF-8 text
    pub raw_text: String,
}

impl Document {
    /// Create a document whose id is derived from its text.
    ///
    /// Identical text always yields the same id, which lets ingestion skip
    /// documents a case already holds.
    pub fn new(filename: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        Self {
            id: content_id(&raw_text),
            filename: filename.into(),
            raw_text,
        }
    }

    /// Create a document with a caller-supplied id
    pub fn with_id(
        id: impl Into<String>,
        filename: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// First 16 bytes of the BLAKE3 digest, hex encoded
pub fn content_id(text: &str) -> String {
    let hash = blake3::hash(text.as_bytes());
    hash.to_hex()[..32].to_string()
}
