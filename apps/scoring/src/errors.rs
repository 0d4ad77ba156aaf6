use thiserror::Error;

use crate::models::ModelKind;

/// Library-level error type.
/// The external API layer maps these onto its own HTTP/status vocabulary.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// Both documents normalized to nothing. Cosine similarity of two zero
    /// vectors is undefined, so we refuse to report a number for this case.
    /// A single-sided empty document is a valid 0 score, not this error.
    #[error("both resume and job description are empty after normalization")]
    EmptyInput,

    /// A pretrained model/table failed to load (or failed recently and is in
    /// its retry-backoff window). Fatal for that model's sub-score only; the
    /// combiner re-normalizes over the models that did produce a score.
    #[error("{kind} model unavailable: {reason}")]
    ModelUnavailable { kind: ModelKind, reason: String },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
