//! Vector index lifecycle.
//!
//! Owns the build-or-load path for named collections: chunk embedding,
//! persistence policy, and the guard that keeps retrievers off an unbuilt
//! index. Builds for one collection name are serialized; distinct names
//! proceed independently, and searches never wait on builds of unrelated
//! collections.

pub mod memory;
pub mod sqlite;
pub mod store;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;
pub use store::{EmbeddedChunk, ScoredChunk, VectorStore};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use crate::chunker::TextChunk;
use crate::core::config::RebuildPolicy;
use crate::core::errors::RagError;
use crate::gateway::EmbeddingGateway;
use crate::retriever::Retriever;

/// Build-or-load front of a [`VectorStore`].
///
/// Clones share the per-collection build locks, so sessions holding clones
/// of one index cannot build the same collection concurrently.
#[derive(Clone)]
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingGateway>,
    rebuild: RebuildPolicy,
    build_locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
    active: Option<String>,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingGateway>,
        rebuild: RebuildPolicy,
    ) -> Self {
        Self {
            store,
            embedder,
            rebuild,
            build_locks: Arc::new(Mutex::new(HashMap::new())),
            active: None,
        }
    }

    /// Embed and persist `chunks` under `collection`, or load the existing
    /// collection when `chunks` is empty. Either way the index is ready
    /// for [`VectorIndex::as_retriever`] afterwards.
    pub async fn build_or_load(
        &mut self,
        chunks: Vec<TextChunk>,
        collection: &str,
    ) -> Result<(), RagError> {
        if chunks.is_empty() {
            match self.store.dimension(collection).await? {
                Some(dimension) => {
                    tracing::info!(collection, dimension, "loaded existing collection");
                }
                None => return Err(RagError::IndexNotFound(collection.to_string())),
            }
        } else {
            let lock = self.build_lock(collection);
            let _guard = lock.lock().await;
            self.build(chunks, collection).await?;
        }

        self.active = Some(collection.to_string());
        Ok(())
    }

    async fn build(&self, chunks: Vec<TextChunk>, collection: &str) -> Result<(), RagError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingGateway(format!(
                "gateway returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimension = embeddings.first().map(Vec::len).unwrap_or(0);
        for embedding in &embeddings {
            if embedding.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    got: embedding.len(),
                });
            }
        }

        let records: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect();
        let count = records.len();

        match self.rebuild {
            RebuildPolicy::Replace => self.store.replace(collection, records).await?,
            RebuildPolicy::Accumulate => self.store.append(collection, records).await?,
        }

        tracing::info!(collection, chunks = count, dimension, "indexed collection");
        Ok(())
    }

    fn build_lock(&self, collection: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .build_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Diversity-aware retriever over the active collection. Fails with
    /// [`RagError::IndexNotBuilt`] before any successful build or load.
    pub fn as_retriever(&self, k: usize, lambda: f32) -> Result<Retriever, RagError> {
        let collection = self.active.clone().ok_or(RagError::IndexNotBuilt)?;
        Ok(Retriever::new(
            self.store.clone(),
            self.embedder.clone(),
            collection,
            k,
            lambda,
        ))
    }
}
