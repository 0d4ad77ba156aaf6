//! Process-scope caching.
//!
//! Two layers: single-flight model-handle loading (load once, share
//! read-only, with bounded failure caching so a corrupted model does not
//! trigger a retry storm), and a bounded LRU of per-pair score results keyed
//! by content fingerprint.
//!
//! Loads run in their own spawned task and publish through a watch channel:
//! a caller that abandons its scoring request stops waiting, but the load
//! itself keeps running for every other in-flight request.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info};

use crate::combiner::{ScoreResult, Weights};
use crate::document::Document;
use crate::errors::ScoreError;
use crate::models::encoder::SentenceEncoder;
use crate::models::word2vec::WordEmbeddings;
use crate::models::ModelKind;

type LoadOutcome<T> = Result<T, String>;

enum LoadState<T> {
    Idle,
    /// A load is in flight; waiters subscribe to the channel.
    Loading(watch::Receiver<Option<LoadOutcome<T>>>),
    Ready(T),
    Failed { at: Instant, reason: String },
}

/// Single-flight lazy loader for one model handle.
struct SingleFlight<T> {
    kind: ModelKind,
    state: Arc<StdMutex<LoadState<T>>>,
    retry_after: Duration,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    fn new(kind: ModelKind, retry_after: Duration) -> Self {
        Self {
            kind,
            state: Arc::new(StdMutex::new(LoadState::Idle)),
            retry_after,
        }
    }

    /// Return the loaded handle, starting the load if nobody has yet.
    /// Concurrent callers during a load all await the same in-flight attempt.
    /// A failed load is cached and re-reported until `retry_after` elapses.
    async fn get_or_load<F>(&self, load: F) -> Result<T, ScoreError>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let mut rx = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| ScoreError::Internal(anyhow::anyhow!("model cache lock poisoned")))?;
            match &*state {
                LoadState::Ready(handle) => return Ok(handle.clone()),
                LoadState::Failed { at, reason } if at.elapsed() < self.retry_after => {
                    return Err(ScoreError::ModelUnavailable {
                        kind: self.kind,
                        reason: format!(
                            "load failed recently ({reason}); retry allowed after {}s",
                            self.retry_after.as_secs()
                        ),
                    });
                }
                LoadState::Loading(rx) => rx.clone(),
                LoadState::Idle | LoadState::Failed { .. } => {
                    let (tx, rx) = watch::channel(None);
                    *state = LoadState::Loading(rx.clone());
                    self.spawn_load(tx, load);
                    rx
                }
            }
        };

        // Await outside the lock. The loader task owns the state transition.
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome.map_err(|reason| ScoreError::ModelUnavailable {
                    kind: self.kind,
                    reason,
                });
            }
            if rx.changed().await.is_err() {
                return Err(ScoreError::Internal(anyhow::anyhow!(
                    "{} model loader task dropped before completing",
                    self.kind
                )));
            }
        }
    }

    fn spawn_load<F>(&self, tx: watch::Sender<Option<LoadOutcome<T>>>, load: F)
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let kind = self.kind;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let outcome: LoadOutcome<T> = match tokio::task::spawn_blocking(load).await {
                Ok(Ok(handle)) => Ok(handle),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(e) => Err(format!("loader task panicked: {e}")),
            };

            match &outcome {
                Ok(_) => info!("{kind} model loaded"),
                Err(reason) => error!("{kind} model load failed: {reason}"),
            }

            if let Ok(mut guard) = state.lock() {
                *guard = match &outcome {
                    Ok(handle) => LoadState::Ready(handle.clone()),
                    Err(reason) => LoadState::Failed {
                        at: Instant::now(),
                        reason: reason.clone(),
                    },
                };
            }
            let _ = tx.send(Some(outcome));
        });
    }
}

/// Process-scope model cache plus the per-pair result cache.
pub struct ModelCache {
    word2vec: SingleFlight<Arc<WordEmbeddings>>,
    encoder: SingleFlight<Arc<dyn SentenceEncoder>>,
    results: Mutex<LruCache<String, ScoreResult>>,
}

impl ModelCache {
    pub fn new(result_capacity: usize, retry_after: Duration) -> Self {
        let capacity = NonZeroUsize::new(result_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            word2vec: SingleFlight::new(ModelKind::Word2Vec, retry_after),
            encoder: SingleFlight::new(ModelKind::Sbert, retry_after),
            results: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Word-embedding table, loaded at most once per process.
    pub async fn word_embeddings<F>(&self, load: F) -> Result<Arc<WordEmbeddings>, ScoreError>
    where
        F: FnOnce() -> anyhow::Result<Arc<WordEmbeddings>> + Send + 'static,
    {
        self.word2vec.get_or_load(load).await
    }

    /// Sentence-encoder handle, loaded at most once per process.
    pub async fn encoder<F>(&self, load: F) -> Result<Arc<dyn SentenceEncoder>, ScoreError>
    where
        F: FnOnce() -> anyhow::Result<Arc<dyn SentenceEncoder>> + Send + 'static,
    {
        self.encoder.get_or_load(load).await
    }

    pub async fn cached_result(&self, key: &str) -> Option<ScoreResult> {
        let mut results = self.results.lock().await;
        let hit = results.get(key).cloned();
        if hit.is_some() {
            debug!("result cache hit for {key}");
        }
        hit
    }

    pub async fn store_result(&self, key: String, result: ScoreResult) {
        self.results.lock().await.put(key, result);
    }

    /// Stable fingerprint of (weights, normalized resume, normalized job).
    pub fn pair_fingerprint(weights: &Weights, resume: &Document, job: &Document) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{:.6}:{:.6}:{:.6}",
            weights.tfidf, weights.word2vec, weights.sbert
        ));
        hasher.update([0x1f]);
        hasher.update(resume.fingerprint());
        hasher.update([0x1f]);
        hasher.update(job.fingerprint());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn table() -> Arc<WordEmbeddings> {
        Arc::new(WordEmbeddings::from_pairs(2, &[("rust", &[1.0, 0.0])]))
    }

    #[tokio::test]
    async fn test_concurrent_first_use_loads_exactly_once() {
        let cache = Arc::new(ModelCache::new(8, Duration::from_secs(60)));
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let loads = Arc::clone(&loads);
            handles.push(tokio::spawn(async move {
                cache
                    .word_embeddings(move || {
                        loads.fetch_add(1, Ordering::SeqCst);
                        // Slow load so all 16 callers arrive before it finishes.
                        std::thread::sleep(Duration::from_millis(50));
                        Ok(table())
                    })
                    .await
            }));
        }

        let mut tables = Vec::new();
        for handle in handles {
            tables.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        // Everyone shares the same handle.
        for t in &tables[1..] {
            assert!(Arc::ptr_eq(&tables[0], t));
        }
    }

    #[tokio::test]
    async fn test_second_call_reuses_loaded_handle() {
        let cache = ModelCache::new(8, Duration::from_secs(60));
        let loads = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let loads = Arc::clone(&loads);
            cache
                .word_embeddings(move || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(table())
                })
                .await
                .unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_failure_is_cached_until_retry_window_elapses() {
        let cache = ModelCache::new(8, Duration::from_millis(40));
        let loads = Arc::new(AtomicUsize::new(0));

        let failing = |loads: Arc<AtomicUsize>| {
            move || {
                loads.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("corrupted table")
            }
        };

        let err = cache
            .word_embeddings(failing(Arc::clone(&loads)))
            .await
            .unwrap_err();
        assert!(matches!(err, ScoreError::ModelUnavailable { .. }));

        // Within the window: reported from the failure cache, no new load.
        let err = cache
            .word_embeddings(failing(Arc::clone(&loads)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed recently"));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        // After the window: a retry is allowed.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let _ = cache.word_embeddings(failing(Arc::clone(&loads))).await;
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_does_not_cancel_the_load() {
        let cache = Arc::new(ModelCache::new(8, Duration::from_secs(60)));
        let loads = Arc::new(AtomicUsize::new(0));

        let waiter = {
            let cache = Arc::clone(&cache);
            let loads = Arc::clone(&loads);
            tokio::spawn(async move {
                cache
                    .word_embeddings(move || {
                        loads.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(50));
                        Ok(table())
                    })
                    .await
            })
        };

        // Abandon the first caller mid-load.
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.abort();

        // A later caller still gets the handle from the same single load.
        tokio::time::sleep(Duration::from_millis(80)).await;
        let loads2 = Arc::clone(&loads);
        let handle = cache
            .word_embeddings(move || {
                loads2.fetch_add(1, Ordering::SeqCst);
                Ok(table())
            })
            .await
            .unwrap();
        assert_eq!(handle.dim(), 2);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_result_cache_roundtrip_and_eviction() {
        let cache = ModelCache::new(2, Duration::from_secs(60));
        let result = ScoreResult {
            tfidf_score: Some(40.0),
            word2vec_score: Some(10.0),
            sbert_score: Some(80.0),
            combined_score: 64.0,
            calculated_at: Utc::now(),
        };

        cache.store_result("a".to_string(), result.clone()).await;
        cache.store_result("b".to_string(), result.clone()).await;
        assert!(cache.cached_result("a").await.is_some());

        // Capacity 2: inserting "c" evicts the least recently used ("b").
        cache.store_result("c".to_string(), result).await;
        assert!(cache.cached_result("b").await.is_none());
        assert!(cache.cached_result("a").await.is_some());
        assert!(cache.cached_result("c").await.is_some());
    }

    #[tokio::test]
    async fn test_pair_fingerprint_is_order_sensitive_and_content_stable() {
        let w = Weights::default();
        let a = Document::new("Python developer");
        let b = Document::new("Seeking Python engineer");

        let ab = ModelCache::pair_fingerprint(&w, &a, &b);
        let ba = ModelCache::pair_fingerprint(&w, &b, &a);
        assert_ne!(ab, ba);

        let a2 = Document::new("Python developer");
        assert_eq!(ab, ModelCache::pair_fingerprint(&w, &a2, &b));
    }
}
