//! Lexical similarity — TF-IDF over a pair-local vector space.
//!
//! The corpus is exactly the two documents being compared (corpus size = 2),
//! so IDF is pair-local by design: scores are not comparable across unrelated
//! pairs. Sharing a global IDF table would change the score semantics.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::document::Document;
use crate::errors::ScoreError;
use crate::models::{cosine_similarity, ModelKind, ModelScore, SimilarityModel};

/// TF-IDF + cosine scorer. Stateless; the vector space is rebuilt per call.
pub struct TfidfModel;

#[async_trait]
impl SimilarityModel for TfidfModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Tfidf
    }

    async fn score(&self, resume: &Document, job: &Document) -> Result<ModelScore, ScoreError> {
        Ok(pair_score(&resume.tokens, &job.tokens))
    }
}

/// Score two token sequences. A zero-token document vectorizes to the zero
/// vector, and cosine against a zero vector is 0 by convention.
pub fn pair_score(resume_tokens: &[String], job_tokens: &[String]) -> ModelScore {
    let (resume_vec, job_vec) = tfidf_vectors(resume_tokens, job_tokens);
    match cosine_similarity(&resume_vec, &job_vec) {
        Some(cos) => ModelScore::from_cosine(cos),
        None => ModelScore::zero(),
    }
}

/// Build L2-normalized TF-IDF vectors for the pair over their joint
/// vocabulary. Smoothed IDF: `ln((1 + n) / (1 + df)) + 1` with n = 2.
fn tfidf_vectors(doc_a: &[String], doc_b: &[String]) -> (Vec<f32>, Vec<f32>) {
    // Joint vocabulary in first-seen order for reproducible vector layout.
    let mut vocab: Vec<&str> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for token in doc_a.iter().chain(doc_b.iter()) {
        if !index.contains_key(token.as_str()) {
            index.insert(token.as_str(), vocab.len());
            vocab.push(token.as_str());
        }
    }

    let tf_a = term_counts(doc_a, &index, vocab.len());
    let tf_b = term_counts(doc_b, &index, vocab.len());

    let n_docs = 2.0_f32;
    let mut vec_a = vec![0.0_f32; vocab.len()];
    let mut vec_b = vec![0.0_f32; vocab.len()];
    for i in 0..vocab.len() {
        let df = f32::from(u8::from(tf_a[i] > 0)) + f32::from(u8::from(tf_b[i] > 0));
        let idf = ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0;
        vec_a[i] = tf_a[i] as f32 * idf;
        vec_b[i] = tf_b[i] as f32 * idf;
    }

    l2_normalize(&mut vec_a);
    l2_normalize(&mut vec_b);
    (vec_a, vec_b)
}

fn term_counts(doc: &[String], index: &HashMap<&str, usize>, vocab_len: usize) -> Vec<u32> {
    let mut counts = vec![0_u32; vocab_len];
    for token in doc {
        if let Some(&i) = index.get(token.as_str()) {
            counts[i] += 1;
        }
    }
    counts
}

fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}
