//! Distributional similarity — averaged pretrained word embeddings.
//!
//! The embedding table is the single most expensive load in the system, so it
//! is read once per process and shared read-only through the model cache.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::document::Document;
use crate::errors::ScoreError;
use crate::models::{cosine_similarity, ModelKind, ModelScore, SimilarityModel};

/// A pretrained token → dense-vector lookup table. Immutable after load.
#[derive(Debug)]
pub struct WordEmbeddings {
    dim: usize,
    table: HashMap<String, Vec<f32>>,
}

impl WordEmbeddings {
    /// Parse a word2vec/GloVe text-format file: one `token v1 .. vD` row per
    /// line, with an optional `count dim` header row.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open embedding table {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut dim = 0_usize;
        let mut table = HashMap::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.with_context(|| {
                format!("failed to read embedding table {} line {}", path.display(), line_no + 1)
            })?;
            let mut parts = line.split_whitespace();
            let Some(token) = parts.next() else {
                continue; // blank line
            };

            let values: Vec<f32> = parts
                .map(str::parse)
                .collect::<Result<_, _>>()
                .with_context(|| format!("malformed embedding row at line {}", line_no + 1))?;

            // word2vec text files open with a "vocab_count dimension" header.
            if line_no == 0 && values.len() == 1 && token.parse::<usize>().is_ok() {
                continue;
            }

            if dim == 0 {
                dim = values.len();
            } else if values.len() != dim {
                bail!(
                    "inconsistent embedding dimension at line {}: expected {dim}, got {}",
                    line_no + 1,
                    values.len()
                );
            }
            table.insert(token.to_string(), values);
        }

        if table.is_empty() || dim == 0 {
            bail!("embedding table {} contains no vectors", path.display());
        }

        info!(
            vocab = table.len(),
            dim, "loaded word embedding table from {}", path.display()
        );
        Ok(Self { dim, table })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, token: &str) -> Option<&[f32]> {
        self.table.get(token).map(Vec::as_slice)
    }

    /// Mean of the in-vocabulary token vectors. OOV tokens are skipped rather
    /// than zero-padded so they do not bias the average toward the origin.
    /// `None` when no token is in vocabulary.
    pub fn document_vector(&self, tokens: &[String]) -> Option<Vec<f32>> {
        let mut sum = vec![0.0_f32; self.dim];
        let mut hits = 0_usize;

        for token in tokens {
            if let Some(vector) = self.get(token) {
                for (acc, v) in sum.iter_mut().zip(vector) {
                    *acc += v;
                }
                hits += 1;
            }
        }

        if hits == 0 {
            return None;
        }
        for v in &mut sum {
            *v /= hits as f32;
        }
        Some(sum)
    }

    /// Build a table directly from (token, vector) pairs. Test fixtures only.
    #[cfg(test)]
    pub fn from_pairs(dim: usize, pairs: &[(&str, &[f32])]) -> Self {
        let table = pairs
            .iter()
            .map(|(token, vector)| ((*token).to_string(), vector.to_vec()))
            .collect();
        Self { dim, table }
    }
}

/// Averaged-embedding scorer over a shared read-only table.
pub struct Word2VecModel {
    embeddings: Arc<WordEmbeddings>,
}

impl Word2VecModel {
    pub fn new(embeddings: Arc<WordEmbeddings>) -> Self {
        Self { embeddings }
    }
}

#[async_trait]
impl SimilarityModel for Word2VecModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Word2Vec
    }

    async fn score(&self, resume: &Document, job: &Document) -> Result<ModelScore, ScoreError> {
        let (Some(resume_vec), Some(job_vec)) = (
            self.embeddings.document_vector(&resume.tokens),
            self.embeddings.document_vector(&job.tokens),
        ) else {
            // Zero in-vocabulary tokens on either side scores 0, never errors.
            return Ok(ModelScore::zero());
        };

        Ok(match cosine_similarity(&resume_vec, &job_vec) {
            Some(cos) => ModelScore::from_cosine(cos),
            None => ModelScore::zero(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture_table() -> Arc<WordEmbeddings> {
        Arc::new(WordEmbeddings::from_pairs(
            3,
            &[
                ("python", &[0.9, 0.1, 0.0]),
                ("developer", &[0.8, 0.2, 0.0]),
                ("machine", &[0.7, 0.3, 0.0]),
                ("learning", &[0.75, 0.25, 0.0]),
                ("chef", &[0.0, 0.1, 0.9]),
                ("pastry", &[0.0, 0.2, 0.8]),
            ],
        ))
    }

    fn doc(text: &str) -> Document {
        Document::new(text)
    }

    #[tokio::test]
    async fn test_related_documents_score_high() {
        let model = Word2VecModel::new(fixture_table());
        let score = model
            .score(&doc("python developer"), &doc("machine learning"))
            .await
            .unwrap();
        assert!(score.normalized > 90.0, "score was {}", score.normalized);
        assert!(score.raw > 0.9, "raw was {}", score.raw);
    }

    #[tokio::test]
    async fn test_unrelated_documents_score_low() {
        let model = Word2VecModel::new(fixture_table());
        let score = model
            .score(&doc("python developer"), &doc("pastry chef"))
            .await
            .unwrap();
        assert!(score.normalized < 40.0, "score was {}", score.normalized);
    }

    #[tokio::test]
    async fn test_all_oov_side_scores_0() {
        let model = Word2VecModel::new(fixture_table());
        let score = model
            .score(&doc("python developer"), &doc("quantum blockchain"))
            .await
            .unwrap();
        assert_eq!(score.normalized, 0.0);
    }

    #[tokio::test]
    async fn test_empty_side_scores_0() {
        let model = Word2VecModel::new(fixture_table());
        let score = model
            .score(&doc("python developer"), &doc(""))
            .await
            .unwrap();
        assert_eq!(score.normalized, 0.0);
    }

    #[tokio::test]
    async fn test_symmetry() {
        let model = Word2VecModel::new(fixture_table());
        let a = doc("python developer");
        let b = doc("machine learning chef");
        let ab = model.score(&a, &b).await.unwrap();
        let ba = model.score(&b, &a).await.unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_oov_tokens_skipped_not_zero_padded() {
        let table = fixture_table();
        let with_oov = table
            .document_vector(&["python".to_string(), "zzz".to_string()])
            .unwrap();
        let without = table.document_vector(&["python".to_string()]).unwrap();
        assert_eq!(with_oov, without);
    }

    #[test]
    fn test_load_parses_text_format_with_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "2 3").unwrap();
        writeln!(file, "python 0.9 0.1 0.0").unwrap();
        writeln!(file, "chef 0.0 0.1 0.9").unwrap();
        file.flush().unwrap();

        let table = WordEmbeddings::load(file.path()).unwrap();
        assert_eq!(table.dim(), 3);
        assert_eq!(table.get("python"), Some(&[0.9, 0.1, 0.0][..]));
        assert!(table.get("rust").is_none());
    }

    #[test]
    fn test_load_rejects_inconsistent_dimensions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "python 0.9 0.1 0.0").unwrap();
        writeln!(file, "chef 0.0 0.1").unwrap();
        file.flush().unwrap();

        let err = WordEmbeddings::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("inconsistent"));
    }

    #[test]
    fn test_load_rejects_empty_table() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = WordEmbeddings::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("no vectors"));
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = WordEmbeddings::load(Path::new("/nonexistent/vectors.txt")).unwrap_err();
        assert!(err.to_string().contains("failed to open"));
    }
}
