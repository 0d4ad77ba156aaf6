//! Similarity models — pluggable, trait-based scorers over a normalized
//! document pair. Three backends: lexical (TF-IDF), distributional (averaged
//! word vectors), contextual (sentence encoder). Each returns a score in
//! [0, 100]; the combiner weights them into one number.

pub mod encoder;
pub mod sbert;
pub mod tfidf;
pub mod word2vec;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::errors::ScoreError;

/// The three model families. Doubles as the model-cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Tfidf,
    #[serde(rename = "word2vec")]
    Word2Vec,
    Sbert,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Tfidf => write!(f, "tfidf"),
            ModelKind::Word2Vec => write!(f, "word2vec"),
            ModelKind::Sbert => write!(f, "sbert"),
        }
    }
}

/// Per-model score: the raw cosine similarity alongside its normalized
/// [0, 100] form. The public result carries the normalized value; the raw
/// cosine is kept for diagnostics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelScore {
    pub raw: f64,
    pub normalized: f64,
}

impl ModelScore {
    pub(crate) fn from_cosine(raw: f32) -> Self {
        Self {
            raw: f64::from(raw),
            normalized: to_percent(raw),
        }
    }

    /// The degenerate-by-convention score (zero vector, empty side, all-OOV).
    pub(crate) fn zero() -> Self {
        Self {
            raw: 0.0,
            normalized: 0.0,
        }
    }
}

/// A similarity model scores a (resume, job) pair.
///
/// Models are stateless with respect to each other and read-only after
/// construction, so one request can run all three concurrently.
#[async_trait]
pub trait SimilarityModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    async fn score(&self, resume: &Document, job: &Document) -> Result<ModelScore, ScoreError>;
}

/// Cosine similarity of two equal-length vectors.
///
/// Returns `None` for a length mismatch or when either vector is (near) zero;
/// callers map `None` to a 0 score by convention rather than erroring.
pub(crate) fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f32> {
    if left.len() != right.len() || left.is_empty() {
        return None;
    }

    let mut dot = 0.0_f32;
    let mut left_norm_sq = 0.0_f32;
    let mut right_norm_sq = 0.0_f32;

    for (a, b) in left.iter().zip(right.iter()) {
        dot += a * b;
        left_norm_sq += a * a;
        right_norm_sq += b * b;
    }

    let denom = left_norm_sq.sqrt() * right_norm_sq.sqrt();
    if denom <= f32::EPSILON {
        return None;
    }

    Some((dot / denom).clamp(-1.0, 1.0))
}

/// Scale a raw cosine similarity onto [0, 100] with 2-decimal rounding.
/// Negative cosine clamps to 0: text vectors are non-negative in the lexical
/// space, and the dense models treat anti-similarity as "no match".
pub(crate) fn to_percent(raw: f32) -> f64 {
    round2(f64::from(raw.clamp(0.0, 1.0)) * 100.0)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
