//! Sentence encoder abstraction.
//!
//! The contextual model consumes pretrained encoders as black boxes: text in,
//! fixed-dimension vector out. The engine carries one as
//! `Arc<dyn SentenceEncoder>`, swapped at startup. An ONNX Runtime backend is
//! available behind the `semantic-ort` feature; deployments without it inject
//! their own implementation.

use anyhow::Result;

/// A pretrained sentence-embedding model. Implementations must be read-only
/// after construction so one handle can serve concurrent scoring calls.
pub trait SentenceEncoder: Send + Sync {
    /// Human-readable model identifier (for logs and diagnostics).
    fn name(&self) -> &str;

    /// Output embedding dimension.
    fn dimension(&self) -> usize;

    /// Maximum input length in whitespace tokens. Longer documents are
    /// chunked by the caller and mean-pooled.
    fn max_input_tokens(&self) -> usize;

    /// Encode one text into a single embedding.
    fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

#[cfg(feature = "semantic-ort")]
pub use ort_encoder::OrtSentenceEncoder;

#[cfg(feature = "semantic-ort")]
mod ort_encoder {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use anyhow::{bail, Context, Result};
    use ort::session::Session;
    use tokenizers::Tokenizer;
    use tracing::info;

    use super::SentenceEncoder;

    const MODEL_FILENAME: &str = "model.onnx";
    const TOKENIZER_FILENAME: &str = "tokenizer.json";

    /// MiniLM-class encoder running on ONNX Runtime. Expects a model
    /// directory containing `model.onnx` and `tokenizer.json`.
    pub struct OrtSentenceEncoder {
        name: String,
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        dimension: usize,
        max_tokens: usize,
    }

    impl OrtSentenceEncoder {
        pub fn load(model_dir: &Path) -> Result<Self> {
            let model_path = model_dir.join(MODEL_FILENAME);
            let tokenizer_path = model_dir.join(TOKENIZER_FILENAME);

            let session = Session::builder()
                .context("failed to create ONNX Runtime session builder")?
                .commit_from_file(&model_path)
                .with_context(|| {
                    format!("failed to load sentence encoder from {}", model_path.display())
                })?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

            info!("loaded sentence encoder from {}", model_dir.display());
            Ok(Self {
                name: format!("ort:{}", model_dir.display()),
                session: Mutex::new(session),
                tokenizer,
                dimension: 384,
                max_tokens: 256,
            })
        }

        /// Default model directory: `<os cache>/scoring/models/minilm-l6-v2`.
        pub fn default_model_dir() -> Result<PathBuf> {
            let mut path =
                dirs::cache_dir().context("unable to determine OS cache directory")?;
            path.push("scoring");
            path.push("models");
            path.push("minilm-l6-v2");
            Ok(path)
        }
    }

    impl SentenceEncoder for OrtSentenceEncoder {
        fn name(&self) -> &str {
            &self.name
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn max_input_tokens(&self) -> usize {
            self.max_tokens
        }

        fn encode(&self, text: &str) -> Result<Vec<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

            let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
            let mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| i64::from(m))
                .collect();
            let token_type: Vec<i64> = vec![0; ids.len()];
            let seq_len = ids.len();
            if seq_len == 0 {
                bail!("tokenizer produced no tokens");
            }

            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow::anyhow!("encoder session lock poisoned"))?;

            let outputs = session
                .run(ort::inputs![
                    "input_ids" => ([1, seq_len], ids),
                    "attention_mask" => ([1, seq_len], mask.clone()),
                    "token_type_ids" => ([1, seq_len], token_type),
                ])
                .context("sentence encoder inference failed")?;

            let (_, hidden) = outputs["last_hidden_state"]
                .try_extract_tensor::<f32>()
                .context("failed to extract encoder output tensor")?;

            // Mean-pool the token embeddings under the attention mask.
            let mut pooled = vec![0.0_f32; self.dimension];
            let mut attended = 0.0_f32;
            for (t, &m) in mask.iter().enumerate() {
                if m == 0 {
                    continue;
                }
                attended += 1.0;
                let offset = t * self.dimension;
                for (d, value) in pooled.iter_mut().enumerate() {
                    *value += hidden[offset + d];
                }
            }
            if attended == 0.0 {
                bail!("attention mask is all zeros");
            }
            for value in &mut pooled {
                *value /= attended;
            }
            Ok(pooled)
        }
    }
}
