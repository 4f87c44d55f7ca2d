//! SQLite-backed vector store.
//!
//! Chunk rows and little-endian f32 embedding blobs in a single database
//! file under the persist directory. Search is a brute-force cosine scan
//! over the collection; a `collections` meta table records each
//! collection's embedding dimension.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};

use super::store::{EmbeddedChunk, ScoredChunk, VectorStore};
use crate::chunker::TextChunk;
use crate::core::errors::RagError;
use crate::document::SourceType;
use crate::vector_math::cosine_similarity;

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open (or create) the store under `persist_dir`.
    pub async fn open(persist_dir: &Path) -> Result<Self, RagError> {
        std::fs::create_dir_all(persist_dir).map_err(RagError::storage)?;
        Self::with_path(persist_dir.join("vectorstore.db")).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, RagError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::storage)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                content TEXT NOT NULL,
                source_type TEXT NOT NULL,
                start_offset INTEGER NOT NULL DEFAULT 0,
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection)")
            .execute(&self.pool)
            .await
            .map_err(RagError::storage)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimension INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::storage)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &SqliteRow) -> Result<TextChunk, RagError> {
        let source: String = row.get("source_type");
        let source_type = SourceType::from_str(&source)
            .map_err(|_| RagError::Storage(format!("unknown source type: {source}")))?;

        Ok(TextChunk {
            text: row.get("content"),
            offset: row.get::<i64, _>("start_offset") as usize,
            source_type,
        })
    }

    async fn insert_records(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        collection: &str,
        records: &[EmbeddedChunk],
    ) -> Result<(), RagError> {
        for record in records {
            let blob = Self::serialize_embedding(&record.embedding);
            sqlx::query(
                "INSERT INTO chunks (chunk_id, collection, content, source_type, start_offset, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(collection)
            .bind(&record.chunk.text)
            .bind(record.chunk.source_type.as_str())
            .bind(record.chunk.offset as i64)
            .bind(&blob)
            .execute(&mut **tx)
            .await
            .map_err(RagError::storage)?;
        }
        Ok(())
    }

    async fn upsert_meta(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        collection: &str,
        dimension: usize,
    ) -> Result<(), RagError> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO collections (name, dimension, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET dimension = excluded.dimension,
                                             updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(dimension as i64)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(RagError::storage)?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn replace(&self, collection: &str, records: Vec<EmbeddedChunk>) -> Result<(), RagError> {
        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;

        sqlx::query("DELETE FROM chunks WHERE collection = ?1")
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(RagError::storage)?;

        match records.first() {
            Some(first) => {
                let dimension = first.embedding.len();
                Self::insert_records(&mut tx, collection, &records).await?;
                Self::upsert_meta(&mut tx, collection, dimension).await?;
            }
            None => {
                sqlx::query("DELETE FROM collections WHERE name = ?1")
                    .bind(collection)
                    .execute(&mut *tx)
                    .await
                    .map_err(RagError::storage)?;
            }
        }

        tx.commit().await.map_err(RagError::storage)?;
        Ok(())
    }

    async fn append(&self, collection: &str, records: Vec<EmbeddedChunk>) -> Result<(), RagError> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let dimension = first.embedding.len();

        let mut tx = self.pool.begin().await.map_err(RagError::storage)?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT dimension FROM collections WHERE name = ?1")
                .bind(collection)
                .fetch_optional(&mut *tx)
                .await
                .map_err(RagError::storage)?;

        if let Some(existing) = existing {
            if existing as usize != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: existing as usize,
                    got: dimension,
                });
            }
        }

        Self::insert_records(&mut tx, collection, &records).await?;
        Self::upsert_meta(&mut tx, collection, dimension).await?;

        tx.commit().await.map_err(RagError::storage)?;
        Ok(())
    }

    async fn load(&self, collection: &str) -> Result<Vec<EmbeddedChunk>, RagError> {
        let rows = sqlx::query(
            "SELECT content, source_type, start_offset, embedding
             FROM chunks WHERE collection = ?1 ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::storage)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let embedding_bytes: Vec<u8> = row.get("embedding");
            records.push(EmbeddedChunk {
                chunk: Self::row_to_chunk(row)?,
                embedding: Self::deserialize_embedding(&embedding_bytes),
            });
        }
        Ok(records)
    }

    async fn top_k(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        let records = self.load(collection).await?;

        let mut scored: Vec<ScoredChunk> = records
            .into_iter()
            .map(|record| {
                let score = cosine_similarity(query, &record.embedding);
                ScoredChunk {
                    chunk: record.chunk,
                    embedding: record.embedding,
                    score,
                }
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
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::storage)?;
        Ok(count as usize)
    }

    async fn dimension(&self, collection: &str) -> Result<Option<usize>, RagError> {
        let dimension: Option<i64> =
            sqlx::query_scalar("SELECT dimension FROM collections WHERE name = ?1")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await
                .map_err(RagError::storage)?;
        Ok(dimension.map(|d| d as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceType;

    fn record(text: &str, offset: usize, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: TextChunk {
                text: text.to_string(),
                offset,
                source_type: SourceType::Pdf,
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn records_survive_reopening_the_store() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = SqliteVectorStore::open(dir.path()).await.unwrap();
            store
                .replace(
                    "genius_pdf",
                    vec![
                        record("first passage", 0, vec![1.0, 0.0]),
                        record("second passage", 10, vec![0.0, 1.0]),
                    ],
                )
                .await
                .unwrap();
        }

        let reopened = SqliteVectorStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.count("genius_pdf").await.unwrap(), 2);
        assert_eq!(reopened.dimension("genius_pdf").await.unwrap(), Some(2));

        let records = reopened.load("genius_pdf").await.unwrap();
        assert_eq!(records[0].chunk.text, "first passage");
        assert_eq!(records[0].chunk.offset, 0);
        assert_eq!(records[0].embedding, vec![1.0, 0.0]);
        assert_eq!(records[1].chunk.text, "second passage");
        assert_eq!(records[1].chunk.offset, 10);
    }

    #[tokio::test]
    async fn replace_supersedes_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();

        store
            .replace("c", vec![record("old", 0, vec![1.0])])
            .await
            .unwrap();
        store
            .replace("c", vec![record("new", 0, vec![0.5])])
            .await
            .unwrap();

        let records = store.load("c").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].chunk.text, "new");
    }

    #[tokio::test]
    async fn append_rejects_a_dimension_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();

        store
            .append("c", vec![record("one", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        let err = store
            .append("c", vec![record("bad", 0, vec![1.0])])
            .await
            .unwrap_err();

        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, got: 1 }));
        assert_eq!(store.count("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn top_k_orders_by_cosine_and_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();

        store
            .replace(
                "c",
                vec![
                    record("orthogonal", 0, vec![0.0, 1.0]),
                    record("aligned", 0, vec![1.0, 0.0]),
                    record("close", 0, vec![0.9, 0.1]),
                ],
            )
            .await
            .unwrap();

        let results = store.top_k("c", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "aligned");
        assert_eq!(results[1].chunk.text, "close");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();

        store
            .replace("genius_web", vec![record("web chunk", 0, vec![1.0])])
            .await
            .unwrap();
        store
            .replace("genius_csv", vec![record("csv chunk", 0, vec![0.0])])
            .await
            .unwrap();

        assert_eq!(store.count("genius_web").await.unwrap(), 1);
        assert_eq!(store.count("genius_csv").await.unwrap(), 1);

        let web = store.load("genius_web").await.unwrap();
        assert_eq!(web[0].chunk.text, "web chunk");
    }
}
