//! Diversity-aware retrieval.
//!
//! Embeds the query, pulls an oversampled candidate pool ranked by cosine
//! similarity, then greedily selects k results by maximal marginal
//! relevance so near-duplicate passages don't crowd out distinct ones.

use std::sync::Arc;

use crate::chunker::TextChunk;
use crate::core::errors::RagError;
use crate::gateway::EmbeddingGateway;
use crate::index::store::{ScoredChunk, VectorStore};
use crate::vector_math::cosine_similarity;

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingGateway>,
    collection: String,
    k: usize,
    lambda: f32,
}

impl Retriever {
    pub(crate) fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingGateway>,
        collection: String,
        k: usize,
        lambda: f32,
    ) -> Self {
        Self {
            store,
            embedder,
            collection,
            k,
            lambda: lambda.clamp(0.0, 1.0),
        }
    }

    /// Candidate pool size for the configured `k`.
    fn fetch_k(&self) -> usize {
        (self.k * 3).max(10)
    }

    /// Top-k chunks for `query`, relevance-ranked and mutually diverse.
    pub async fn search(&self, query: &str) -> Result<Vec<TextChunk>, RagError> {
        let embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let query_vec = embeddings.into_iter().next().ok_or_else(|| {
            RagError::EmbeddingGateway("no embedding returned for query".to_string())
        })?;

        let pool = self
            .store
            .top_k(&self.collection, &query_vec, self.fetch_k())
            .await?;
        let selected = mmr_select(&query_vec, pool, self.k, self.lambda);

        tracing::debug!(
            collection = %self.collection,
            results = selected.len(),
            "search complete"
        );
        Ok(selected.into_iter().map(|s| s.chunk).collect())
    }
}

/// Greedy maximal marginal relevance over a relevance-ranked pool.
///
/// The first pick is the most query-similar candidate; each further pick
/// maximizes `λ·sim(c, query) − (1−λ)·max_sim(c, selected)`. Ties keep the
/// earlier pool rank.
fn mmr_select(query: &[f32], pool: Vec<ScoredChunk>, k: usize, lambda: f32) -> Vec<ScoredChunk> {
    if pool.is_empty() || k == 0 {
        return Vec::new();
    }

    let k = k.min(pool.len());
    let mut selected: Vec<ScoredChunk> = Vec::with_capacity(k);
    let mut remaining = pool;

    for _ in 0..k {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (idx, candidate) in remaining.iter().enumerate() {
            let relevance = cosine_similarity(query, &candidate.embedding);
            let redundancy = if selected.is_empty() {
                0.0
            } else {
                selected
                    .iter()
                    .map(|s| cosine_similarity(&candidate.embedding, &s.embedding))
                    .fold(f32::NEG_INFINITY, f32::max)
            };

            let score = lambda * relevance - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }

        selected.push(remaining.remove(best_idx));
        if remaining.is_empty() {
            break;
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceType;
    use crate::index::MemoryVectorStore;
    use crate::index::store::EmbeddedChunk;
    use crate::test_support::LetterFrequencyEmbedder;

    fn candidate(text: &str, embedding: Vec<f32>) -> ScoredChunk {
        ScoredChunk {
            chunk: TextChunk {
                text: text.to_string(),
                offset: 0,
                source_type: SourceType::Web,
            },
            embedding,
            score: 0.0,
        }
    }

    #[test]
    fn empty_pool_or_zero_k_selects_nothing() {
        assert!(mmr_select(&[1.0, 0.0], Vec::new(), 5, 0.5).is_empty());
        let pool = vec![candidate("a", vec![1.0, 0.0])];
        assert!(mmr_select(&[1.0, 0.0], pool, 0, 0.5).is_empty());
    }

    #[test]
    fn selects_at_most_k_results() {
        let pool = vec![
            candidate("a", vec![0.9, 0.1, 0.0]),
            candidate("b", vec![0.8, 0.2, 0.0]),
            candidate("c", vec![0.7, 0.3, 0.0]),
            candidate("d", vec![0.6, 0.4, 0.0]),
        ];
        let selected = mmr_select(&[1.0, 0.0, 0.0], pool, 3, 0.5);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn pure_relevance_preserves_pool_order() {
        let pool = vec![
            candidate("best", vec![0.9, 0.1]),
            candidate("second", vec![0.8, 0.2]),
            candidate("third", vec![0.5, 0.5]),
        ];
        let selected = mmr_select(&[1.0, 0.0], pool, 3, 1.0);
        assert_eq!(selected[0].chunk.text, "best");
        assert_eq!(selected[1].chunk.text, "second");
        assert_eq!(selected[2].chunk.text, "third");
    }

    #[test]
    fn near_duplicates_are_pushed_out_of_the_top_two() {
        let pool = vec![
            candidate("original", vec![0.99, 0.01, 0.0]),
            candidate("duplicate", vec![0.98, 0.02, 0.0]),
            candidate("distinct", vec![0.0, 0.0, 1.0]),
        ];
        let selected = mmr_select(&[1.0, 0.0, 0.0], pool, 2, 0.5);

        assert_eq!(selected[0].chunk.text, "original");
        assert_eq!(
            selected[1].chunk.text, "distinct",
            "a distinct passage must beat a near-duplicate"
        );
    }

    #[test]
    fn ties_keep_the_earlier_pool_rank() {
        let pool = vec![
            candidate("first", vec![1.0, 0.0]),
            candidate("twin", vec![1.0, 0.0]),
            candidate("other", vec![0.0, 1.0]),
        ];
        let selected = mmr_select(&[1.0, 0.0], pool, 1, 0.5);
        assert_eq!(selected[0].chunk.text, "first");
    }

    #[test]
    fn k_beyond_pool_size_returns_the_whole_pool() {
        let pool = vec![candidate("only", vec![1.0, 0.0])];
        let selected = mmr_select(&[1.0, 0.0], pool, 10, 0.5);
        assert_eq!(selected.len(), 1);
    }

    #[tokio::test]
    async fn search_returns_relevant_chunks_without_vectors() {
        let embedder = Arc::new(LetterFrequencyEmbedder::new());
        let store = Arc::new(MemoryVectorStore::new());

        let texts = [
            "Paris is the capital of France.",
            "It has a population of over 2 million.",
            "Bananas are rich in potassium.",
        ];
        let records: Vec<EmbeddedChunk> = texts
            .iter()
            .map(|text| EmbeddedChunk {
                chunk: TextChunk {
                    text: text.to_string(),
                    offset: 0,
                    source_type: SourceType::Web,
                },
                embedding: LetterFrequencyEmbedder::embed_one(text),
            })
            .collect();
        store.replace("genius_web", records).await.unwrap();

        let retriever = Retriever::new(store, embedder, "genius_web".to_string(), 2, 0.5);
        let results = retriever.search("capital of France").await.unwrap();

        assert!(results.len() <= 2);
        assert!(!results.is_empty());
        assert!(results
            .iter()
            .any(|chunk| chunk.text.contains("capital of France")));
    }

    #[test]
    fn fetch_k_oversamples_with_a_floor() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(LetterFrequencyEmbedder::new());

        let small = Retriever::new(store.clone(), embedder.clone(), "c".to_string(), 2, 0.5);
        assert_eq!(small.fetch_k(), 10);

        let large = Retriever::new(store, embedder, "c".to_string(), 6, 0.5);
        assert_eq!(large.fetch_k(), 18);
    }
}
