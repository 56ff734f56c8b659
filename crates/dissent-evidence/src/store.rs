//! Per-session evidence store
//!
//! Owns the chunks of one debate's documents and ranks them per document
//! against the query.

use std::collections::BTreeMap;
use std::sync::Arc;

use dissent_core::{DocId, Document, EvidenceSnippet};

use crate::chunker::{Chunk, Chunker};
use crate::error::RetrievalError;
use crate::retriever::Retriever;

/// Snippets per document, keyed by document id
pub type EvidenceMap = BTreeMap<DocId, Vec<EvidenceSnippet>>;

#[derive(Debug)]
pub struct EvidenceStore {
    chunker: Chunker,
    retriever: Arc<dyn Retriever>,
    documents: Vec<DocId>,
    chunks: Vec<Chunk>,
}

impl EvidenceStore {
    pub fn new(retriever: Arc<dyn Retriever>, chunker: Chunker) -> Self {
        Self {
            chunker,
            retriever,
            documents: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// Chunk and hold `documents`; returns the number of chunks produced
    pub fn index(&mut self, documents: &[Document]) -> usize {
        for document in documents {
            let chunks = self.chunker.split(document);
            tracing::debug!(doc_id = document.id, chunks = chunks.len(), "Indexed document");
            self.documents.push(document.id);
            self.chunks.extend(chunks);
        }
        self.chunks.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn retriever_name(&self) -> &str {
        self.retriever.name()
    }

    /// Rank every indexed document's chunks against `query` and keep the top `top_k` of each.
    ///
    /// Ties break by chunk position, so output is stable for identical input.
    /// Every indexed document gets an entry, possibly empty.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<EvidenceMap, RetrievalError> {
        if self.documents.is_empty() {
            return Err(RetrievalError::EmptyCorpus);
        }

        let spans: Vec<String> = self.chunks.iter().map(|c| c.text.clone()).collect();
        let scores = self.retriever.score(query, &spans).await?;
        if scores.len() != spans.len() {
            return Err(RetrievalError::Capability(format!(
                "{} returned {} scores for {} spans",
                self.retriever.name(),
                scores.len(),
                spans.len()
            )));
        }

        let mut per_doc: BTreeMap<DocId, Vec<(f32, &Chunk)>> =
            self.documents.iter().map(|id| (*id, Vec::new())).collect();
        for (chunk, score) in self.chunks.iter().zip(scores) {
            let score = if score.is_finite() { score } else { 0.0 };
            per_doc.entry(chunk.doc_id).or_default().push((score, chunk));
        }

        let evidence = per_doc
            .into_iter()
            .map(|(doc_id, mut scored)| {
                scored.sort_by(|a, b| {
                    b.0.partial_cmp(&a.0)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.1.start.cmp(&b.1.start))
                });
                let snippets = scored
                    .into_iter()
                    .take(top_k)
                    .enumerate()
                    .map(|(i, (score, chunk))| EvidenceSnippet {
                        doc_id,
                        rank: i as u32 + 1,
                        score,
                        start: chunk.start,
                        text: chunk.text.clone(),
                    })
                    .collect();
                (doc_id, snippets)
            })
            .collect();

        Ok(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::LexicalRetriever;

    fn store() -> EvidenceStore {
        EvidenceStore::new(Arc::new(LexicalRetriever::new()), Chunker::new(60, 10))
    }

    #[tokio::test]
    async fn test_retrieve_ranks_per_document() {
        let mut store = store();
        let docs = vec![
            Document::new(1, "Bananas are yellow and sweet. Michael Jordan was born in 1963 in Brooklyn."),
            Document::new(2, "A professor named Michael Jordan was born in 1956."),
        ];
        let chunks = store.index(&docs);
        assert!(chunks >= 3);

        let evidence = store
            .retrieve("Which year was he born in Brooklyn?", 1)
            .await
            .unwrap();
        assert_eq!(evidence.len(), 2);
        assert_eq!(evidence[&1].len(), 1);
        assert!(evidence[&1][0].text.contains("1963"));
        assert_eq!(evidence[&1][0].rank, 1);
        assert_eq!(evidence[&2][0].doc_id, 2);
    }

    #[tokio::test]
    async fn test_retrieve_is_deterministic() {
        let mut store = store();
        store.index(&[Document::new(1, "alpha beta gamma delta ".repeat(10))]);
        let a = store.retrieve("beta", 6).await.unwrap();
        let b = store.retrieve("beta", 6).await.unwrap();
        assert_eq!(a, b);
        let ranks: Vec<u32> = a[&1].iter().map(|s| s.rank).collect();
        assert_eq!(ranks, (1..=a[&1].len() as u32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_empty_store_fails() {
        let store = store();
        assert_eq!(
            store.retrieve("anything", 3).await,
            Err(RetrievalError::EmptyCorpus)
        );
    }
}
