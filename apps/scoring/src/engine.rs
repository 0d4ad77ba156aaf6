//! The scoring engine — the crate's single entry point.
//!
//! One call takes (resume_text, job_text), normalizes both, fans the three
//! similarity models out as parallel tasks, joins them, and combines the
//! sub-scores under the documented weights. Expensive model handles come from
//! the process-scope cache; (pair → result) memoization sits in front of the
//! whole computation.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::cache::ModelCache;
use crate::combiner::{combine, ScoreResult, Weights};
use crate::config::Config;
use crate::document::Document;
use crate::errors::ScoreError;
use crate::models::encoder::SentenceEncoder;
use crate::models::sbert::SbertModel;
use crate::models::tfidf::TfidfModel;
use crate::models::word2vec::{Word2VecModel, WordEmbeddings};
use crate::models::{ModelKind, ModelScore, SimilarityModel};

/// Constructs a sentence-encoder handle on first use. Runs on a blocking
/// thread inside the single-flight load, so it may do disk I/O freely.
pub type EncoderLoader =
    Arc<dyn Fn() -> anyhow::Result<Arc<dyn SentenceEncoder>> + Send + Sync>;

/// Multi-model similarity scoring engine. Cheap to clone; all heavyweight
/// state lives behind the shared cache.
#[derive(Clone)]
pub struct ScoringEngine {
    config: Arc<Config>,
    weights: Weights,
    cache: Arc<ModelCache>,
    encoder_loader: EncoderLoader,
}

impl ScoringEngine {
    /// Engine with the published 40/60 tfidf/sbert calibration.
    pub fn new(config: Config, encoder_loader: EncoderLoader) -> Self {
        Self::with_weights(config, encoder_loader, Weights::default())
    }

    pub fn with_weights(config: Config, encoder_loader: EncoderLoader, weights: Weights) -> Self {
        let cache = Arc::new(ModelCache::new(
            config.result_cache_capacity,
            config.model_retry,
        ));
        Self {
            config: Arc::new(config),
            weights,
            cache,
            encoder_loader,
        }
    }

    /// Engine wired to the ONNX Runtime encoder, reading the model directory
    /// from `SBERT_MODEL_PATH` (or the OS cache default).
    #[cfg(feature = "semantic-ort")]
    pub fn from_config(config: Config) -> Self {
        use crate::models::encoder::OrtSentenceEncoder;

        let model_dir = config.sbert_model_path.clone();
        let loader: EncoderLoader = Arc::new(move || {
            let dir = match &model_dir {
                Some(dir) => dir.clone(),
                None => OrtSentenceEncoder::default_model_dir()?,
            };
            Ok(Arc::new(OrtSentenceEncoder::load(&dir)?) as Arc<dyn SentenceEncoder>)
        });
        Self::new(config, loader)
    }

    /// Score a resume against a job description.
    ///
    /// Degraded mode: if a model's pretrained resource is unavailable, its
    /// sub-score is reported as `None` and the combiner re-normalizes the
    /// remaining weights. Only when no weighted model can score does the
    /// whole request fail.
    #[instrument(skip_all)]
    pub async fn score(
        &self,
        resume_text: &str,
        job_text: &str,
    ) -> Result<ScoreResult, ScoreError> {
        let resume = Document::new(resume_text);
        let job = Document::new(job_text);

        // Two empty documents have no defined similarity; refuse rather than
        // report a fabricated 0. One-sided emptiness is a legitimate 0 score.
        if resume.is_empty() && job.is_empty() {
            return Err(ScoreError::EmptyInput);
        }

        let key = ModelCache::pair_fingerprint(&self.weights, &resume, &job);
        if let Some(hit) = self.cache.cached_result(&key).await {
            return Ok(hit);
        }

        let (tfidf, word2vec, sbert) = self.fan_out(Arc::new(resume), Arc::new(job)).await?;

        let (tfidf_sub, tfidf_err) = accept(ModelKind::Tfidf, tfidf);
        let (word2vec_sub, _) = accept(ModelKind::Word2Vec, word2vec);
        let (sbert_sub, sbert_err) = accept(ModelKind::Sbert, sbert);
        debug!(
            tfidf_raw = tfidf_sub.map(|s| s.raw),
            word2vec_raw = word2vec_sub.map(|s| s.raw),
            sbert_raw = sbert_sub.map(|s| s.raw),
            "per-model raw cosines"
        );

        let tfidf_score = tfidf_sub.map(|s| s.normalized);
        let word2vec_score = word2vec_sub.map(|s| s.normalized);
        let sbert_score = sbert_sub.map(|s| s.normalized);

        let combined_score = match combine(&self.weights, tfidf_score, word2vec_score, sbert_score)
        {
            Some(score) => score,
            // Every weighted model failed; surface the first failure instead
            // of inventing a number.
            None => {
                return Err(tfidf_err.or(sbert_err).unwrap_or_else(|| {
                    ScoreError::Internal(anyhow::anyhow!("no weighted sub-score available"))
                }));
            }
        };

        let result = ScoreResult {
            tfidf_score,
            word2vec_score,
            sbert_score,
            combined_score,
            calculated_at: Utc::now(),
        };
        debug!(
            combined = result.combined_score,
            "scored resume/job pair"
        );
        // Memoize only fully-scored results. A degraded result would outlive
        // the model-failure retry window inside the LRU and keep serving a
        // stale sub-score after the model recovers.
        if tfidf_score.is_some() && word2vec_score.is_some() && sbert_score.is_some() {
            self.cache.store_result(key, result.clone()).await;
        }
        Ok(result)
    }

    /// Run the three models as parallel tasks and join them. The `JoinSet`
    /// aborts its tasks when dropped, so abandoning a scoring request cancels
    /// the per-request work — shared model loads run in their own tasks and
    /// are unaffected.
    async fn fan_out(
        &self,
        resume: Arc<Document>,
        job: Arc<Document>,
    ) -> Result<ThreeScores, ScoreError> {
        let mut tasks: JoinSet<(ModelKind, Result<ModelScore, ScoreError>)> = JoinSet::new();

        {
            let (resume, job) = (Arc::clone(&resume), Arc::clone(&job));
            tasks.spawn(async move {
                (ModelKind::Tfidf, TfidfModel.score(&resume, &job).await)
            });
        }

        {
            let (resume, job) = (Arc::clone(&resume), Arc::clone(&job));
            let cache = Arc::clone(&self.cache);
            let path = self.config.word2vec_path.clone();
            tasks.spawn(async move {
                let score = async {
                    let table = cache
                        .word_embeddings(move || WordEmbeddings::load(&path).map(Arc::new))
                        .await?;
                    Word2VecModel::new(table).score(&resume, &job).await
                }
                .await;
                (ModelKind::Word2Vec, score)
            });
        }

        {
            let (resume, job) = (Arc::clone(&resume), Arc::clone(&job));
            let cache = Arc::clone(&self.cache);
            let loader = Arc::clone(&self.encoder_loader);
            tasks.spawn(async move {
                let score = async {
                    let encoder = cache.encoder(move || loader()).await?;
                    SbertModel::new(encoder).score(&resume, &job).await
                }
                .await;
                (ModelKind::Sbert, score)
            });
        }

        let mut tfidf = None;
        let mut word2vec = None;
        let mut sbert = None;
        while let Some(joined) = tasks.join_next().await {
            let (kind, score) = joined
                .map_err(|e| ScoreError::Internal(anyhow::anyhow!("model task failed: {e}")))?;
            match kind {
                ModelKind::Tfidf => tfidf = Some(score),
                ModelKind::Word2Vec => word2vec = Some(score),
                ModelKind::Sbert => sbert = Some(score),
            }
        }

        match (tfidf, word2vec, sbert) {
            (Some(t), Some(w), Some(s)) => Ok((t, w, s)),
            _ => Err(ScoreError::Internal(anyhow::anyhow!(
                "model fan-out completed without all three results"
            ))),
        }
    }

}

type ThreeScores = (
    Result<ModelScore, ScoreError>,
    Result<ModelScore, ScoreError>,
    Result<ModelScore, ScoreError>,
);

/// Split a per-model outcome into an optional sub-score and the error that
/// explains its absence, logging degraded models. Unavailable means absent,
/// never 0.
fn accept(
    kind: ModelKind,
    outcome: Result<ModelScore, ScoreError>,
) -> (Option<ModelScore>, Option<ScoreError>) {
    match outcome {
        Ok(score) => (Some(score), None),
        Err(e) => {
            warn!("{kind} model unavailable for this request: {e}");
            (None, Some(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(word2vec_path: &str) -> Config {
        Config {
            word2vec_path: word2vec_path.into(),
            sbert_model_path: None,
            result_cache_capacity: 16,
            model_retry: Duration::from_secs(60),
        }
    }

    fn failing_encoder_loader() -> EncoderLoader {
        Arc::new(|| anyhow::bail!("no encoder in this build"))
    }

    #[tokio::test]
    async fn test_both_empty_is_input_error() {
        let engine = ScoringEngine::new(config("/nonexistent"), failing_encoder_loader());
        let err = engine.score("", "   ").await.unwrap_err();
        assert!(matches!(err, ScoreError::EmptyInput));
    }

    #[tokio::test]
    async fn test_degraded_mode_scores_on_tfidf_alone() {
        // Word2vec table missing and encoder loader failing: the lexical
        // model still scores, and the combiner renormalizes onto it.
        let engine = ScoringEngine::new(config("/nonexistent/vectors.txt"), failing_encoder_loader());
        let text = "Python developer with machine learning experience";
        let result = engine.score(text, text).await.unwrap();

        assert_eq!(result.tfidf_score, Some(100.0));
        assert_eq!(result.word2vec_score, None);
        assert_eq!(result.sbert_score, None);
        assert_eq!(result.combined_score, 100.0);
    }

    #[tokio::test]
    async fn test_one_sided_empty_yields_zero_scores_not_error() {
        let engine = ScoringEngine::new(config("/nonexistent"), failing_encoder_loader());
        let result = engine
            .score("Python developer", "")
            .await
            .unwrap();
        assert_eq!(result.tfidf_score, Some(0.0));
        assert_eq!(result.combined_score, 0.0);
    }

    #[tokio::test]
    async fn test_all_weighted_models_unavailable_fails_the_request() {
        // Zero weight on tfidf leaves sbert as the only weighted model, and
        // its encoder loader fails.
        let weights = Weights::new(0.0, 0.0, 1.0).unwrap();
        let engine = ScoringEngine::with_weights(
            config("/nonexistent"),
            failing_encoder_loader(),
            weights,
        );
        let err = engine
            .score("Python developer", "Python engineer")
            .await
            .unwrap_err();
        assert!(matches!(err, ScoreError::ModelUnavailable { .. }));
    }
}
