//! Vector storage contracts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunker::TextChunk;
use crate::core::errors::RagError;

/// A chunk together with its embedding, as persisted in a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: TextChunk,
    pub embedding: Vec<f32>,
}

/// A similarity-ranked candidate. Keeps the embedding so the retriever can
/// measure candidates against each other, not only against the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub embedding: Vec<f32>,
    pub score: f32,
}

/// Storage backend for named collections of embedded chunks.
///
/// `replace` and `append` are the two rebuild policies; `top_k` is a raw
/// similarity ranking — diversity-aware selection happens above the store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Drop any persisted state for `collection` and write `records`.
    async fn replace(&self, collection: &str, records: Vec<EmbeddedChunk>) -> Result<(), RagError>;

    /// Add `records` to `collection`, keeping what is already there.
    /// Rejects records whose dimension differs from the collection's.
    async fn append(&self, collection: &str, records: Vec<EmbeddedChunk>) -> Result<(), RagError>;

    /// All persisted records of `collection` in insertion order; empty if
    /// the collection does not exist.
    async fn load(&self, collection: &str) -> Result<Vec<EmbeddedChunk>, RagError>;

    /// Top `limit` records of `collection` by cosine similarity to `query`,
    /// best first.
    async fn top_k(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RagError>;

    async fn count(&self, collection: &str) -> Result<usize, RagError>;

    /// Embedding dimension recorded for `collection`, `None` if it was
    /// never built.
    async fn dimension(&self, collection: &str) -> Result<Option<usize>, RagError>;
}
