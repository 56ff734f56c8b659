//! # Dissent Evidence
//!
//! Turns a debate's documents into ranked evidence and binds agents to it.
//!
//! - [`Chunker`] splits documents into overlapping windows
//! - [`EvidenceStore`] ranks each document's chunks against the query
//! - [`Retriever`] is the similarity capability; [`LexicalRetriever`] is the
//!   deterministic default, [`EmbeddingRetriever`] uses an embedding provider
//! - [`assign_agents`] binds up to three agents to the documents

pub mod assign;
pub mod chunker;
pub mod error;
pub mod retriever;
pub mod store;

pub use assign::{assign_agents, MAX_AGENTS};
pub use chunker::{compact, Chunk, Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use error::RetrievalError;
pub use retriever::{cosine_similarity, EmbeddingRetriever, LexicalRetriever, Retriever};
pub use store::{EvidenceMap, EvidenceStore};
