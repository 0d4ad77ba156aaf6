use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Word-embedding table in word2vec/GloVe text format (`token v1 .. vD`).
    pub word2vec_path: PathBuf,
    /// Sentence-encoder model directory. Only consulted by the `semantic-ort`
    /// loader; embedded/stub encoders ignore it.
    pub sbert_model_path: Option<PathBuf>,
    /// Upper bound on memoized (resume, job) score results.
    pub result_cache_capacity: usize,
    /// How long a model-load failure is cached before a retry is allowed.
    pub model_retry: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            word2vec_path: PathBuf::from(require_env("WORD2VEC_PATH")?),
            sbert_model_path: std::env::var("SBERT_MODEL_PATH").ok().map(PathBuf::from),
            result_cache_capacity: std::env::var("RESULT_CACHE_CAPACITY")
                .unwrap_or_else(|_| "1000".to_string())
                .parse::<usize>()
                .context("RESULT_CACHE_CAPACITY must be a positive integer")?,
            model_retry: Duration::from_secs(
                std::env::var("MODEL_RETRY_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse::<u64>()
                    .context("MODEL_RETRY_SECS must be a number of seconds")?,
            ),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_plainly_constructible_for_tests() {
        let config = Config {
            word2vec_path: PathBuf::from("/tmp/vectors.txt"),
            sbert_model_path: None,
            result_cache_capacity: 16,
            model_retry: Duration::from_secs(1),
        };
        assert_eq!(config.result_cache_capacity, 16);
        assert!(config.sbert_model_path.is_none());
    }
}
