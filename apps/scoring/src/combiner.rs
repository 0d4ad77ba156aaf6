//! Score combination — fixed, documented weights over the per-model
//! sub-scores, with deterministic 2-decimal rounding.
//!
//! Published calibration: 40% lexical (TF-IDF) + 60% contextual (SBERT). The
//! distributional (word2vec) score is computed and reported for diagnostic
//! value but carries weight 0.0 in the current calibration — preserved as
//! shipped, flagged for product sign-off in DESIGN.md.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ScoreError;
use crate::models::round2;

/// Per-model weights, normalized to sum to 1 on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub tfidf: f64,
    pub word2vec: f64,
    pub sbert: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            tfidf: 0.4,
            word2vec: 0.0,
            sbert: 0.6,
        }
    }
}

impl Weights {
    /// Validate and normalize a weight set: no negative weights, sum must be
    /// positive, normalized to unit sum.
    pub fn new(tfidf: f64, word2vec: f64, sbert: f64) -> Result<Self, ScoreError> {
        if tfidf < 0.0 || word2vec < 0.0 || sbert < 0.0 {
            return Err(ScoreError::Internal(anyhow::anyhow!(
                "weights cannot be negative"
            )));
        }
        let total = tfidf + word2vec + sbert;
        if total <= 0.0 {
            return Err(ScoreError::Internal(anyhow::anyhow!(
                "weights cannot sum to zero"
            )));
        }
        Ok(Self {
            tfidf: tfidf / total,
            word2vec: word2vec / total,
            sbert: sbert / total,
        })
    }
}

/// The result of one scoring invocation. Sub-scores are in [0, 100]; a `None`
/// sub-score marks a model that was unavailable for this request (reported
/// explicitly rather than substituted with 0). Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub tfidf_score: Option<f64>,
    pub word2vec_score: Option<f64>,
    pub sbert_score: Option<f64>,
    pub combined_score: f64,
    pub calculated_at: DateTime<Utc>,
}

/// Weighted combination of the available sub-scores.
///
/// Unavailable models are omitted and the remaining weights re-normalized, so
/// a degraded request still yields a score on the same [0, 100] scale. `None`
/// when no positively-weighted sub-score is available.
pub fn combine(
    weights: &Weights,
    tfidf: Option<f64>,
    word2vec: Option<f64>,
    sbert: Option<f64>,
) -> Option<f64> {
    let contributions = [
        (weights.tfidf, tfidf),
        (weights.word2vec, word2vec),
        (weights.sbert, sbert),
    ];

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (weight, score) in contributions {
        if let Some(score) = score {
            weighted_sum += weight * score;
            weight_total += weight;
        }
    }

    if weight_total <= 0.0 {
        return None;
    }
    Some(round2(weighted_sum / weight_total))
}
