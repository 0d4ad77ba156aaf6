use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::normalize::{normalize, Normalized};

/// A normalized document: opaque id, cleaned sentence text, lemmatized token
/// sequence. Immutable once constructed; owned by the scoring invocation that
/// created it and never persisted here.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub cleaned: String,
    pub tokens: Vec<String>,
}

impl Document {
    pub fn new(raw_text: &str) -> Self {
        let Normalized { cleaned, tokens } = normalize(raw_text);
        Self {
            id: Uuid::new_v4(),
            cleaned,
            tokens,
        }
    }

    /// True when normalization produced no content at all.
    pub fn is_empty(&self) -> bool {
        self.cleaned.is_empty() && self.tokens.is_empty()
    }

    /// Stable SHA-256 fingerprint of the normalized content. Two documents
    /// with the same normalized text fingerprint identically regardless of id.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.cleaned.as_bytes());
        hasher.update([0x1f]);
        for token in &self.tokens {
            hasher.update(token.as_bytes());
            hasher.update([0x1f]);
        }
        format!("{:x}", hasher.finalize())
    }
}
