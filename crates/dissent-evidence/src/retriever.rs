//! Similarity capabilities that rank text spans against a query

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use dissent_llm::EmbeddingProvider;

use crate::error::RetrievalError;

/// Scores spans against a query; higher is more similar.
///
/// Implementations must be deterministic for identical input.
#[async_trait]
pub trait Retriever: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// One score per span, in span order
    async fn score(&self, query: &str, spans: &[String]) -> Result<Vec<f32>, RetrievalError>;
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "had",
    "has", "have", "he", "her", "his", "in", "is", "it", "its", "of", "on", "or", "she", "that",
    "the", "their", "they", "this", "to", "was", "were", "what", "when", "where", "which", "who",
    "whom", "why", "with",
];

fn term_frequencies(text: &str) -> HashMap<String, f32> {
    let mut tf = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let token = token.to_lowercase();
        if STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        *tf.entry(token).or_insert(0.0) += 1.0;
    }
    tf
}

fn sparse_cosine(a: &HashMap<String, f32>, b: &HashMap<String, f32>) -> f32 {
    let dot: f32 = a
        .iter()
        .filter_map(|(term, x)| b.get(term).map(|y| x * y))
        .sum();
    let norm_a: f32 = a.values().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.values().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Term-frequency cosine over lowercased, stopword-filtered tokens
#[derive(Debug, Clone, Default)]
pub struct LexicalRetriever;

impl LexicalRetriever {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Retriever for LexicalRetriever {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(&self, query: &str, spans: &[String]) -> Result<Vec<f32>, RetrievalError> {
        let query_tf = term_frequencies(query);
        Ok(spans
            .iter()
            .map(|span| sparse_cosine(&query_tf, &term_frequencies(span)))
            .collect())
    }
}

/// Cosine similarity over vectors from an embedding capability
#[derive(Debug)]
pub struct EmbeddingRetriever<E: EmbeddingProvider + ?Sized> {
    embedder: Arc<E>,
}

impl<E: EmbeddingProvider + ?Sized> EmbeddingRetriever<E> {
    pub fn new(embedder: Arc<E>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl<E: EmbeddingProvider + ?Sized + 'static> Retriever for EmbeddingRetriever<E> {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn score(&self, query: &str, spans: &[String]) -> Result<Vec<f32>, RetrievalError> {
        if spans.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;
        let span_vecs = self.embedder.embed_batch(spans).await?;
        if span_vecs.len() != spans.len() {
            return Err(RetrievalError::Capability(format!(
                "expected {} embeddings, got {}",
                spans.len(),
                span_vecs.len()
            )));
        }

        span_vecs
            .iter()
            .map(|v| {
                if v.len() != query_vec.len() {
                    return Err(RetrievalError::DimensionMismatch(query_vec.len(), v.len()));
                }
                Ok(cosine_similarity(&query_vec, v))
            })
            .collect()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
