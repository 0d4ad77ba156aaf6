//! Contextual similarity — sentence-level embeddings.
//!
//! Operates on the cleaned sentence text rather than the lemmatized token
//! sequence: the underlying encoder is sensitive to word order and context.

use std::sync::Arc;

use async_trait::async_trait;

use crate::document::Document;
use crate::errors::ScoreError;
use crate::models::encoder::SentenceEncoder;
use crate::models::{cosine_similarity, ModelKind, ModelScore, SimilarityModel};

/// Sentence-embedding scorer over a shared encoder handle.
pub struct SbertModel {
    encoder: Arc<dyn SentenceEncoder>,
}

impl SbertModel {
    pub fn new(encoder: Arc<dyn SentenceEncoder>) -> Self {
        Self { encoder }
    }

    /// Encode a document into one embedding. Text longer than the encoder's
    /// input limit is chunked on token boundaries and the chunk embeddings
    /// mean-pooled — a documented policy, not an implementation accident.
    /// `None` for empty text.
    fn document_embedding(&self, cleaned: &str) -> Result<Option<Vec<f32>>, ScoreError> {
        if cleaned.is_empty() {
            return Ok(None);
        }

        let words: Vec<&str> = cleaned.split_whitespace().collect();
        let max_tokens = self.encoder.max_input_tokens().max(1);

        let mut pooled = vec![0.0_f32; self.encoder.dimension()];
        let mut chunks = 0_usize;
        for chunk in words.chunks(max_tokens) {
            let embedding = self
                .encoder
                .encode(&chunk.join(" "))
                .map_err(|e| ScoreError::ModelUnavailable {
                    kind: ModelKind::Sbert,
                    reason: format!("{e:#}"),
                })?;
            if embedding.len() != self.encoder.dimension() {
                return Err(ScoreError::ModelUnavailable {
                    kind: ModelKind::Sbert,
                    reason: format!(
                        "encoder returned dimension {}, expected {}",
                        embedding.len(),
                        self.encoder.dimension()
                    ),
                });
            }
            for (acc, v) in pooled.iter_mut().zip(&embedding) {
                *acc += v;
            }
            chunks += 1;
        }

        for v in &mut pooled {
            *v /= chunks as f32;
        }
        Ok(Some(pooled))
    }
}

#[async_trait]
impl SimilarityModel for SbertModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Sbert
    }

    async fn score(&self, resume: &Document, job: &Document) -> Result<ModelScore, ScoreError> {
        let (Some(resume_vec), Some(job_vec)) = (
            self.document_embedding(&resume.cleaned)?,
            self.document_embedding(&job.cleaned)?,
        ) else {
            return Ok(ModelScore::zero());
        };

        Ok(match cosine_similarity(&resume_vec, &job_vec) {
            Some(cos) => ModelScore::from_cosine(cos),
            None => ModelScore::zero(),
        })
    }
}
