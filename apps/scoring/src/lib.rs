//! Multi-model resume/job-description similarity scoring.
//!
//! Takes two pieces of already-extracted plain text, runs them through three
//! independent similarity models (TF-IDF, averaged word embeddings, sentence
//! embeddings), and combines the sub-scores into one calibrated number in
//! [0, 100]. File extraction, storage, and the HTTP surface are external
//! collaborators; this crate's boundary is [`ScoringEngine::score`].

pub mod cache;
pub mod combiner;
pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod models;
pub mod normalize;

pub use combiner::{ScoreResult, Weights};
pub use config::Config;
pub use engine::{EncoderLoader, ScoringEngine};
pub use errors::ScoreError;
pub use models::encoder::SentenceEncoder;
pub use models::{ModelKind, ModelScore};
