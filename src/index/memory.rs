//! In-memory vector store.
//!
//! Same contract as the SQLite store, without persistence. Suits tests and
//! throwaway indexes.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::store::{EmbeddedChunk, ScoredChunk, VectorStore};
use crate::core::errors::RagError;
use crate::vector_math::cosine_similarity;

#[derive(Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, Vec<EmbeddedChunk>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Vec<EmbeddedChunk>>>, RagError>
    {
        self.collections
            .read()
            .map_err(|_| RagError::Storage("store lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<EmbeddedChunk>>>, RagError>
    {
        self.collections
            .write()
            .map_err(|_| RagError::Storage("store lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn replace(&self, collection: &str, records: Vec<EmbeddedChunk>) -> Result<(), RagError> {
        self.write()?.insert(collection.to_string(), records);
        Ok(())
    }

    async fn append(&self, collection: &str, records: Vec<EmbeddedChunk>) -> Result<(), RagError> {
        let mut collections = self.write()?;
        let entry = collections.entry(collection.to_string()).or_default();

        if let (Some(existing), Some(incoming)) = (entry.first(), records.first()) {
            if existing.embedding.len() != incoming.embedding.len() {
                return Err(RagError::DimensionMismatch {
                    expected: existing.embedding.len(),
                    got: incoming.embedding.len(),
                });
            }
        }

        entry.extend(records);
        Ok(())
    }

    async fn load(&self, collection: &str) -> Result<Vec<EmbeddedChunk>, RagError> {
        Ok(self.read()?.get(collection).cloned().unwrap_or_default())
    }

    async fn top_k(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        let collections = self.read()?;
        let records = collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);

        let mut scored: Vec<ScoredChunk> = records
            .iter()
            .map(|record| ScoredChunk {
                chunk: record.chunk.clone(),
                embedding: record.embedding.clone(),
                score: cosine_similarity(query, &record.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<usize, RagError> {
        Ok(self.read()?.get(collection).map(Vec::len).unwrap_or(0))
    }

    async fn dimension(&self, collection: &str) -> Result<Option<usize>, RagError> {
        Ok(self
            .read()?
            .get(collection)
            .and_then(|records| records.first())
            .map(|record| record.embedding.len()))
    }
}
